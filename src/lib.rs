/// Sibyl Oracle - Prediction Market Resolution
/// Exports all modules for use as a library crate

pub mod chain;
pub mod config;
pub mod judge;
pub mod models;
pub mod pipeline;
pub mod submitter;

#[path = "../research/mod.rs"]
pub mod research;

#[path = "../rpc/mod.rs"]
pub mod rpc;

pub use chain::{
    decode_market, derive, encode_resolve, market_address, protocol_address, AddressDerivationError,
    MalformedAccountError, ProgramAddress, Pubkey,
};
pub use config::{ConfigError, MarketOverrides, MarketSources, OracleConfig};
pub use judge::{ConsensusEngine, JudgeProvider, JudgmentOrchestrator, ProviderError, QUORUM};
pub use models::{ConsensusResult, JudgmentResult, MarketAccount, MarketStatus, Outcome, ResolveReport};
pub use pipeline::{PipelineContext, PipelineError, ResolutionPipeline, SignerSource, SubmitError};
pub use research::{EvidenceSource, ResearchContext, SearchResult, SourceSummary, WebResearcher};
pub use rpc::{Keypair, KeypairError, LedgerRpc, RpcConfig, RpcError, SolanaRpcClient};
pub use submitter::{SubmissionError, TransactionSubmitter, MAX_SUBMIT_ATTEMPTS};
