// ============================================================================
// Judge System - Multi-Provider Judgment & Quorum Consensus
// ============================================================================
//
// This module turns market text plus evidence into a resolution decision:
//   - Independent AI judge providers (Claude, GPT, Gemini)
//   - Concurrent fan-out with a per-provider timeout
//   - Quorum consensus (2 agreeing judgments required)
//
// Architecture:
//   JudgeProvider trait → provider implementations → JudgmentOrchestrator
//   → ConsensusEngine → final outcome + confidence
// ============================================================================

pub mod consensus;
pub mod providers;

pub use consensus::{round_half_even_mean, ConsensusEngine, QUORUM};
pub use providers::{build_prompt, parse_judgment, parse_llm_json, ClaudeJudge, GeminiJudge, OpenAiJudge};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, info_span, warn, Instrument};

use crate::models::JudgmentResult;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Ceiling for a single provider call
pub const JUDGE_TIMEOUT_SECS: u64 = 120;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Credential for the provider is not configured
    MissingApiKey(&'static str),
    /// Transport-level failure
    RequestFailed(String),
    /// Provider answered with a non-success HTTP status
    HttpStatus(u16, String),
    /// Response text is not a valid structured judgment
    Malformed(String),
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderError::MissingApiKey(var) => write!(f, "{} environment variable is required", var),
            ProviderError::RequestFailed(msg) => write!(f, "Provider request failed: {}", msg),
            ProviderError::HttpStatus(code, body) => write!(f, "Provider returned status {}: {}", code, body),
            ProviderError::Malformed(msg) => write!(f, "Malformed provider response: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

// ============================================================================
// JUDGE PROVIDER TRAIT
// ============================================================================

/// Capability every judge exposes: read a market and the evidence, return a verdict
#[async_trait]
pub trait JudgeProvider: Send + Sync {
    /// Identifier recorded on every judgment
    fn name(&self) -> &str;

    async fn judge(
        &self,
        title: &str,
        description: &str,
        evidence: &str,
    ) -> Result<JudgmentResult, ProviderError>;
}

// ============================================================================
// JUDGMENT ORCHESTRATOR
// ============================================================================

/// Fans a judgment request out to every provider at once
pub struct JudgmentOrchestrator {
    providers: Vec<Arc<dyn JudgeProvider>>,
    timeout: Duration,
}

impl JudgmentOrchestrator {
    pub fn new(providers: Vec<Arc<dyn JudgeProvider>>) -> Self {
        Self {
            providers,
            timeout: Duration::from_secs(JUDGE_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// Query all providers concurrently and wait for every one to settle.
    ///
    /// Failures and timeouts are logged and dropped. The returned judgments
    /// follow provider registration order.
    pub async fn run(&self, title: &str, description: &str, evidence: &str) -> Vec<JudgmentResult> {
        let title: Arc<str> = Arc::from(title);
        let description: Arc<str> = Arc::from(description);
        let evidence: Arc<str> = Arc::from(evidence);

        let handles: Vec<_> = self
            .providers
            .iter()
            .map(|provider| {
                let provider = Arc::clone(provider);
                let span = info_span!("judge", provider = %provider.name());
                let (title, description, evidence) =
                    (Arc::clone(&title), Arc::clone(&description), Arc::clone(&evidence));
                let timeout = self.timeout;

                let task = async move {
                    safe_judge(provider.as_ref(), &title, &description, &evidence, timeout).await
                };
                tokio::spawn(task.instrument(span))
            })
            .collect();

        let mut judgments = Vec::with_capacity(handles.len());
        for (provider, handle) in self.providers.iter().zip(handles) {
            match handle.await {
                Ok(Some(judgment)) => judgments.push(judgment),
                Ok(None) => {}
                Err(e) => error!("[{}] Judge task aborted: {}", provider.name(), e),
            }
        }

        info!(
            "⚖️  {}/{} providers returned a judgment",
            judgments.len(),
            self.providers.len()
        );
        judgments
    }
}

/// One provider call behind a timeout + failure boundary; failures become `None`
async fn safe_judge(
    provider: &dyn JudgeProvider,
    title: &str,
    description: &str,
    evidence: &str,
    timeout: Duration,
) -> Option<JudgmentResult> {
    let name = provider.name();
    match tokio::time::timeout(timeout, provider.judge(title, description, evidence)).await {
        Ok(Ok(result)) if result.confidence > 100 => {
            warn!("[{}] Dropped judgment with confidence {}", name, result.confidence);
            None
        }
        Ok(Ok(result)) => {
            info!("[{}] outcome={} confidence={}", name, result.outcome, result.confidence);
            Some(result)
        }
        Ok(Err(e)) => {
            error!("[{}] Failed: {}", name, e);
            None
        }
        Err(_) => {
            error!("[{}] Timed out after {}s", name, timeout.as_secs_f64());
            None
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
