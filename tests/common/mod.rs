// Shared fakes for pipeline integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sibyl_oracle::chain::{account_discriminator, default_program_id};
use sibyl_oracle::judge::{JudgeProvider, JudgmentOrchestrator, ProviderError};
use sibyl_oracle::research::{EvidenceSource, ResearchContext, SearchResult, SourceSummary};
use sibyl_oracle::{
    market_address, JudgmentResult, Keypair, LedgerRpc, Outcome, Pubkey, ResolutionPipeline,
    RpcError, SignerSource,
};

// ============================================================================
// MARKET FIXTURES
// ============================================================================

pub const TITLE: &str = "Will BTC trade above $100k on Dec 31?";
pub const DESCRIPTION: &str = "Resolves Yes if the Coinbase BTC-USD close exceeds $100,000.";

/// Market account bytes in the on-chain layout
pub fn market_bytes(id: u64, status: u8) -> Vec<u8> {
    let mut data = account_discriminator("Market").to_vec();
    data.extend_from_slice(&id.to_le_bytes());
    data.extend_from_slice(&[3u8; 32]);
    for text in [TITLE, DESCRIPTION] {
        data.extend_from_slice(&(text.len() as u32).to_le_bytes());
        data.extend_from_slice(text.as_bytes());
    }
    data.extend_from_slice(&1_767_225_600i64.to_le_bytes());
    data.extend_from_slice(&1_000u64.to_le_bytes());
    data.extend_from_slice(&2_000u64.to_le_bytes());
    data.push(status);
    data.push(0);
    data.push(0);
    // accounts are allocated at max size
    data.extend_from_slice(&[0u8; 64]);
    data
}

// ============================================================================
// FAKE LEDGER
// ============================================================================

#[derive(Default)]
pub struct FakeLedger {
    accounts: HashMap<Pubkey, Vec<u8>>,
    send_results: Mutex<VecDeque<Result<String, RpcError>>>,
    pub sends: AtomicUsize,
    pub sent: Mutex<Vec<Vec<u8>>>,
}

impl FakeLedger {
    pub fn with_market(id: u64, status: u8) -> Self {
        let mut ledger = Self::default();
        let address = market_address(id, &default_program_id()).unwrap().address;
        ledger.accounts.insert(address, market_bytes(id, status));
        ledger
    }

    pub fn failing_sends(self, results: Vec<Result<String, RpcError>>) -> Self {
        *self.send_results.lock().unwrap() = results.into();
        self
    }

    pub fn send_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    /// Trailing `resolve` payload of the last sent transaction
    pub fn last_resolve_payload(&self) -> Option<Vec<u8>> {
        let sent = self.sent.lock().unwrap();
        sent.last().map(|wire| wire[wire.len() - 10..].to_vec())
    }
}

#[async_trait]
impl LedgerRpc for FakeLedger {
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, RpcError> {
        Ok(self.accounts.get(address).cloned())
    }

    async fn get_latest_blockhash(&self) -> Result<[u8; 32], RpcError> {
        Ok([self.send_count() as u8 + 1; 32])
    }

    async fn send_transaction(&self, wire_tx: &[u8]) -> Result<String, RpcError> {
        let n = self.sends.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent.lock().unwrap().push(wire_tx.to_vec());
        self.send_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("sig-{}", n)))
    }

    async fn confirm_transaction(&self, _signature: &str) -> Result<(), RpcError> {
        Ok(())
    }
}

// ============================================================================
// FAKE EVIDENCE
// ============================================================================

/// Records the research inputs and returns one source and one snippet
#[derive(Clone, Default)]
pub struct RecordingEvidence {
    pub requests: Arc<Mutex<Vec<(Vec<String>, Vec<String>)>>>,
}

#[async_trait]
impl EvidenceSource for RecordingEvidence {
    async fn gather(&self, sources: &[String], search_queries: &[String]) -> ResearchContext {
        self.requests
            .lock()
            .unwrap()
            .push((sources.to_vec(), search_queries.to_vec()));
        ResearchContext {
            source_summaries: vec![SourceSummary::fetched("https://news.example", "BTC closed at $104,200")],
            search_results: vec![SearchResult {
                title: "BTC price".to_string(),
                url: "https://search.example".to_string(),
                snippet: "Bitcoin ends year above six figures".to_string(),
            }],
        }
    }
}

// ============================================================================
// STUB JUDGES
// ============================================================================

pub enum Verdict {
    Answer(Outcome, u8),
    Fail,
    Hang,
}

pub struct StubJudge {
    pub name: &'static str,
    verdict: Verdict,
    pub calls: AtomicUsize,
    pub evidence_seen: Mutex<Vec<String>>,
}

impl StubJudge {
    pub fn new(name: &'static str, verdict: Verdict) -> Arc<Self> {
        Arc::new(Self {
            name,
            verdict,
            calls: AtomicUsize::new(0),
            evidence_seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl JudgeProvider for StubJudge {
    fn name(&self) -> &str {
        self.name
    }

    async fn judge(&self, _title: &str, _description: &str, evidence: &str) -> Result<JudgmentResult, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.evidence_seen.lock().unwrap().push(evidence.to_string());
        match self.verdict {
            Verdict::Answer(outcome, confidence) => Ok(JudgmentResult {
                provider: self.name.to_string(),
                outcome,
                confidence,
                reasoning: format!("{} says {}", self.name, outcome),
            }),
            Verdict::Fail => Err(ProviderError::Malformed("garbled".to_string())),
            Verdict::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(ProviderError::RequestFailed("late".to_string()))
            }
        }
    }
}

pub fn orchestrator(judges: &[Arc<StubJudge>]) -> JudgmentOrchestrator {
    let providers: Vec<Arc<dyn JudgeProvider>> = judges
        .iter()
        .map(|j| Arc::clone(j) as Arc<dyn JudgeProvider>)
        .collect();
    JudgmentOrchestrator::new(providers).with_timeout(Duration::from_millis(100))
}

// ============================================================================
// PIPELINE BUILDER
// ============================================================================

pub fn oracle_keypair() -> Keypair {
    Keypair::from_seed(&[11u8; 32])
}

pub fn pipeline(
    ledger: FakeLedger,
    evidence: RecordingEvidence,
    judges: &[Arc<StubJudge>],
    signer: SignerSource,
) -> ResolutionPipeline<FakeLedger, RecordingEvidence> {
    ResolutionPipeline::new(ledger, evidence, orchestrator(judges), default_program_id(), signer)
}
