// Oracle configuration: environment variables and per-market research overrides

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::chain::{default_program_id, Pubkey};
use crate::judge::{ClaudeJudge, GeminiJudge, JudgeProvider, OpenAiJudge};
use crate::research::WebResearcher;
use crate::rpc::{RpcConfig, DEFAULT_RPC_URL};

pub const DEFAULT_MARKETS_CONFIG: &str = "markets.json";

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidProgramId(String),
    InvalidRetryDelay(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidProgramId(v) => write!(f, "SIBYL_PROGRAM_ID is not a valid address: {}", v),
            ConfigError::InvalidRetryDelay(v) => write!(f, "SIBYL_RETRY_DELAY_MS is not a number: {}", v),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// ORACLE CONFIG
// ============================================================================

#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub rpc_url: String,
    /// Oracle keypair file; only needed when submitting
    pub keypair_path: Option<PathBuf>,
    pub program_id: Pubkey,
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub openai_model: Option<String>,
    pub gemini_api_key: Option<String>,
    pub brave_api_key: Option<String>,
    pub markets_config: PathBuf,
    pub retry_delay: Duration,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            keypair_path: None,
            program_id: default_program_id(),
            anthropic_api_key: None,
            openai_api_key: None,
            openai_base_url: None,
            openai_model: None,
            gemini_api_key: None,
            brave_api_key: None,
            markets_config: PathBuf::from(DEFAULT_MARKETS_CONFIG),
            retry_delay: Duration::ZERO,
        }
    }
}

impl OracleConfig {
    /// Load from the process environment (after `.env`, if present)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let program_id = match get("SIBYL_PROGRAM_ID") {
            Some(v) => Pubkey::from_str(v.trim()).map_err(|_| ConfigError::InvalidProgramId(v))?,
            None => defaults.program_id,
        };
        let retry_delay = match get("SIBYL_RETRY_DELAY_MS") {
            Some(v) => Duration::from_millis(
                v.trim().parse::<u64>().map_err(|_| ConfigError::InvalidRetryDelay(v))?,
            ),
            None => defaults.retry_delay,
        };

        Ok(Self {
            rpc_url: get("SOLANA_RPC_URL").unwrap_or(defaults.rpc_url),
            keypair_path: get("ORACLE_KEYPAIR_PATH").map(PathBuf::from),
            program_id,
            anthropic_api_key: get("ANTHROPIC_API_KEY"),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL"),
            openai_model: get("OPENAI_MODEL"),
            gemini_api_key: get("GEMINI_API_KEY"),
            brave_api_key: get("BRAVE_API_KEY"),
            markets_config: get("SIBYL_MARKETS_CONFIG").map(PathBuf::from).unwrap_or(defaults.markets_config),
            retry_delay,
        })
    }

    pub fn rpc_config(&self) -> RpcConfig {
        RpcConfig::new(self.rpc_url.clone())
    }

    /// The three judges, in dispatch order
    pub fn judges(&self) -> Vec<Arc<dyn JudgeProvider>> {
        vec![
            Arc::new(GeminiJudge::new(self.gemini_api_key.clone())),
            Arc::new(ClaudeJudge::new(self.anthropic_api_key.clone())),
            Arc::new(OpenAiJudge::new(
                self.openai_api_key.clone(),
                self.openai_base_url.clone(),
                self.openai_model.clone(),
            )),
        ]
    }

    pub fn researcher(&self) -> WebResearcher {
        WebResearcher::new(self.brave_api_key.clone())
    }
}

// ============================================================================
// PER-MARKET OVERRIDES
// ============================================================================

/// Research inputs for one market
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSources {
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub search_queries: Vec<String>,
}

/// Market id (decimal string) → research inputs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketOverrides {
    markets: HashMap<String, MarketSources>,
}

impl MarketOverrides {
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Missing file → no overrides. Unreadable or invalid file → warning, no overrides.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        let parsed = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|text| Self::parse(&text).map_err(|e| e.to_string()));

        parsed.unwrap_or_else(|e| {
            warn!("Failed to load {}: {}, using defaults", path.display(), e);
            Self::default()
        })
    }

    pub fn insert(&mut self, market_id: u64, sources: MarketSources) {
        self.markets.insert(market_id.to_string(), sources);
    }

    /// Research inputs for `market_id`; the title is the fallback search query
    pub fn for_market(&self, market_id: u64, title: &str) -> MarketSources {
        let mut selected = self.markets.get(&market_id.to_string()).cloned().unwrap_or_default();
        if selected.search_queries.is_empty() {
            selected.search_queries = vec![title.to_string()];
        }
        selected
    }
}

// ============================================================================
// TESTS
// ============================================================================
