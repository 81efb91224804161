// ============================================================================
// Resolution Pipeline - fetch → research → judge → consensus → submit
// ============================================================================
//
// Stages run strictly in sequence; only the judge dispatches inside
// JudgmentOrchestrator::run overlap. Hard failures (market missing or
// undecodable) are returned as `PipelineError`. Everything after the market
// is known ends up in the `ResolveReport`, including submission failures.
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, info_span, warn, Instrument, Span};

use crate::chain::{check_market_discriminator, decode_market, market_address, AddressDerivationError, MalformedAccountError, Pubkey};
use crate::config::MarketOverrides;
use crate::judge::{ConsensusEngine, JudgmentOrchestrator};
use crate::models::{ConsensusResult, MarketAccount, ResolveReport};
use crate::research::EvidenceSource;
use crate::rpc::{Keypair, KeypairError, LedgerRpc, RpcError};
use crate::submitter::{SubmissionError, TransactionSubmitter};

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// No account at the derived market address
    MarketNotFound { market_id: u64, address: Pubkey },
    /// Account exists but does not decode as a market
    MalformedAccount(MalformedAccountError),
    Address(AddressDerivationError),
    Rpc(RpcError),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::MarketNotFound { market_id, address } => {
                write!(f, "Market account not found: {} (market {})", address, market_id)
            }
            PipelineError::MalformedAccount(e) => write!(f, "{}", e),
            PipelineError::Address(e) => write!(f, "{}", e),
            PipelineError::Rpc(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<MalformedAccountError> for PipelineError {
    fn from(e: MalformedAccountError) -> Self {
        PipelineError::MalformedAccount(e)
    }
}

impl From<AddressDerivationError> for PipelineError {
    fn from(e: AddressDerivationError) -> Self {
        PipelineError::Address(e)
    }
}

impl From<RpcError> for PipelineError {
    fn from(e: RpcError) -> Self {
        PipelineError::Rpc(e)
    }
}

/// Why the submission stage produced no signature. Recorded in the report,
/// never returned from `resolve`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// Oracle key missing or unreadable; nothing was sent
    Signer(KeypairError),
    Submission(SubmissionError),
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmitError::Signer(e) => write!(f, "{}", e),
            SubmitError::Submission(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SubmitError {}

impl From<KeypairError> for SubmitError {
    fn from(e: KeypairError) -> Self {
        SubmitError::Signer(e)
    }
}

impl From<SubmissionError> for SubmitError {
    fn from(e: SubmissionError) -> Self {
        SubmitError::Submission(e)
    }
}

// ============================================================================
// CONTEXT
// ============================================================================

/// Per-run context; the market id doubles as the correlation id in logs
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub market_id: u64,
    pub dry_run: bool,
    span: Span,
}

impl PipelineContext {
    pub fn new(market_id: u64, dry_run: bool) -> Self {
        Self {
            market_id,
            dry_run,
            span: info_span!("resolve", market_id),
        }
    }

    pub fn span(&self) -> &Span {
        &self.span
    }
}

// ============================================================================
// SIGNER SOURCE
// ============================================================================

/// Where the oracle key comes from. Loaded only for the submission stage.
#[derive(Debug, Clone)]
pub enum SignerSource {
    File(PathBuf),
    Inline(Keypair),
    Missing,
}

impl SignerSource {
    pub fn from_path(path: Option<PathBuf>) -> Self {
        path.map(SignerSource::File).unwrap_or(SignerSource::Missing)
    }

    pub fn load(&self) -> Result<Keypair, KeypairError> {
        match self {
            SignerSource::File(path) => Keypair::read_from_file(path),
            SignerSource::Inline(keypair) => Ok(keypair.clone()),
            SignerSource::Missing => Err(KeypairError::Missing),
        }
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct ResolutionPipeline<R: LedgerRpc, E: EvidenceSource> {
    rpc: R,
    evidence: E,
    orchestrator: JudgmentOrchestrator,
    consensus: ConsensusEngine,
    program_id: Pubkey,
    signer: SignerSource,
    overrides: MarketOverrides,
    retry_delay: Duration,
}

impl<R: LedgerRpc, E: EvidenceSource> ResolutionPipeline<R, E> {
    pub fn new(
        rpc: R,
        evidence: E,
        orchestrator: JudgmentOrchestrator,
        program_id: Pubkey,
        signer: SignerSource,
    ) -> Self {
        let consensus = ConsensusEngine::new(orchestrator.provider_count());
        Self {
            rpc,
            evidence,
            orchestrator,
            consensus,
            program_id,
            signer,
            overrides: MarketOverrides::default(),
            retry_delay: Duration::ZERO,
        }
    }

    pub fn with_overrides(mut self, overrides: MarketOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn rpc(&self) -> &R {
        &self.rpc
    }

    /// Fetch and decode the market account for `market_id`
    pub async fn fetch_market(&self, market_id: u64) -> Result<MarketAccount, PipelineError> {
        let address = market_address(market_id, &self.program_id)?.address;
        let data = self
            .rpc
            .get_account_data(&address)
            .await?
            .ok_or(PipelineError::MarketNotFound { market_id, address })?;

        check_market_discriminator(&data)?;
        Ok(decode_market(&data)?)
    }

    /// Run the whole pipeline for the market in `ctx`
    pub async fn resolve(&self, ctx: &PipelineContext) -> Result<ResolveReport, PipelineError> {
        self.run_stages(ctx).instrument(ctx.span().clone()).await
    }

    async fn run_stages(&self, ctx: &PipelineContext) -> Result<ResolveReport, PipelineError> {
        // 1. FETCH
        info!("Fetching market {} from chain...", ctx.market_id);
        let market = self.fetch_market(ctx.market_id).await?;
        info!("Market: {}", market.title);
        info!("Status: {} | Deadline: {}", market.status, market.resolution_deadline);
        info!("Pools: YES={} / NO={}", market.yes_pool, market.no_pool);

        let mut report = ResolveReport::new(ctx.market_id, market.title.clone(), ctx.dry_run);

        if !market.status.is_resolvable() {
            let msg = format!("Market is already {}, cannot resolve.", market.status);
            warn!("{}", msg);
            report.error = Some(msg);
            return Ok(report);
        }

        // 2. RESEARCH
        let inputs = self.overrides.for_market(ctx.market_id, &market.title);
        let research = self.evidence.gather(&inputs.sources, &inputs.search_queries).await;
        let evidence = research.to_prompt_section();

        // 3. JUDGE
        info!(
            "Running AI judgment with {} providers...",
            self.orchestrator.provider_count()
        );
        let judgments = self
            .orchestrator
            .run(&market.title, &market.description, &evidence)
            .await;

        // 4. CONSENSUS
        let consensus = self.consensus.reduce(judgments);
        info!("🗳️  {}", consensus.summary);

        // 5. SUBMIT
        if ctx.dry_run {
            info!("Dry run, skipping on-chain submission.");
        } else {
            match self.submit(ctx.market_id, &consensus).await {
                Ok(signature) => report.tx_signature = Some(signature),
                Err(e) => {
                    match &e {
                        SubmitError::Signer(cause) => error!("🔑 Cannot load oracle keypair: {}", cause),
                        SubmitError::Submission(SubmissionError::Rpc(cause)) => {
                            error!("❌ Resolve transaction rejected by ledger: {}", cause)
                        }
                        SubmitError::Submission(cause) => error!("❌ Failed to build resolve transaction: {}", cause),
                    }
                    report.error = Some(e.to_string());
                }
            }
        }

        report.consensus = Some(consensus);
        Ok(report)
    }

    /// The keypair lives only for the duration of this call
    async fn submit(&self, market_id: u64, consensus: &ConsensusResult) -> Result<String, SubmitError> {
        let signer = self.signer.load()?;
        info!(
            "Submitting resolve tx: outcome={}, confidence={}",
            consensus.final_outcome, consensus.final_confidence
        );

        TransactionSubmitter::new(&self.rpc, &signer, self.program_id)
            .with_retry_delay(self.retry_delay)
            .submit(market_id, consensus.final_outcome, consensus.final_confidence)
            .await
            .map_err(SubmitError::from)
    }
}

// ============================================================================
// TESTS
// ============================================================================
