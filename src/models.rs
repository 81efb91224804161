// Data models for the Sibyl resolution oracle

use serde::{Deserialize, Serialize};

// ============================================================================
// ON-CHAIN ENUMS
// ============================================================================

/// Market outcome, mirroring the on-chain `Outcome` enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Yes,
    No,
    Invalid,
}

impl Outcome {
    /// Wire code used in account data and instruction payloads
    pub fn as_u8(&self) -> u8 {
        match self {
            Outcome::Yes => 0,
            Outcome::No => 1,
            Outcome::Invalid => 2,
        }
    }

    /// Map an on-chain ordinal back to an outcome. Unknown ordinals are `None`.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Outcome::Yes),
            1 => Some(Outcome::No),
            2 => Some(Outcome::Invalid),
            _ => None,
        }
    }

    /// Parse the exact label a judge returns ("Yes", "No", "Invalid")
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Yes" => Some(Outcome::Yes),
            "No" => Some(Outcome::No),
            "Invalid" => Some(Outcome::Invalid),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Outcome::Yes => "Yes",
            Outcome::No => "No",
            Outcome::Invalid => "Invalid",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle status of a market account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketStatus {
    Open,
    Locked,
    Resolved,
    Settled,
}

impl MarketStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(MarketStatus::Open),
            1 => Some(MarketStatus::Locked),
            2 => Some(MarketStatus::Resolved),
            3 => Some(MarketStatus::Settled),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            MarketStatus::Open => 0,
            MarketStatus::Locked => 1,
            MarketStatus::Resolved => 2,
            MarketStatus::Settled => 3,
        }
    }

    /// Only open or locked markets accept a resolve instruction
    pub fn is_resolvable(&self) -> bool {
        matches!(self, MarketStatus::Open | MarketStatus::Locked)
    }

    pub fn name(&self) -> &'static str {
        match self {
            MarketStatus::Open => "Open",
            MarketStatus::Locked => "Locked",
            MarketStatus::Resolved => "Resolved",
            MarketStatus::Settled => "Settled",
        }
    }
}

impl std::fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// MARKET SNAPSHOT
// ============================================================================

/// Point-in-time snapshot of an on-chain market account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketAccount {
    pub id: u64,
    pub title: String,
    pub description: String,
    /// Unix seconds
    pub resolution_deadline: i64,
    pub yes_pool: u64,
    pub no_pool: u64,
    pub status: MarketStatus,
    pub outcome: Option<Outcome>,
    /// 0-100 by convention; the program enforces the range, not the codec
    pub oracle_confidence: u8,
}

// ============================================================================
// JUDGMENT & CONSENSUS
// ============================================================================

/// Result from a single judge provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgmentResult {
    pub provider: String,
    pub outcome: Outcome,
    /// 0-100 inclusive
    pub confidence: u8,
    pub reasoning: String,
}

/// Aggregated decision over every judgment that came back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub judgments: Vec<JudgmentResult>,
    pub final_outcome: Outcome,
    pub final_confidence: u8,
    pub consensus_reached: bool,
    pub agreeing_providers: Vec<String>,
    pub summary: String,
}

// ============================================================================
// RESOLVE REPORT
// ============================================================================

/// Full record of one resolution run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveReport {
    pub market_id: u64,
    pub market_title: String,
    /// Absent when the market could not be resolved at all (status precondition)
    pub consensus: Option<ConsensusResult>,
    pub tx_signature: Option<String>,
    pub error: Option<String>,
    pub dry_run: bool,
    pub resolved_at: chrono::DateTime<chrono::Utc>,
}

impl ResolveReport {
    pub fn new(market_id: u64, market_title: String, dry_run: bool) -> Self {
        Self {
            market_id,
            market_title,
            consensus: None,
            tx_signature: None,
            error: None,
            dry_run,
            resolved_at: chrono::Utc::now(),
        }
    }

    /// True when the run should end with a non-zero exit code
    pub fn is_failure(&self) -> bool {
        self.error.as_deref().map_or(false, |e| !e.is_empty())
    }

    /// Human-readable judgment report
    pub fn render(&self) -> String {
        let rule = "=".repeat(60);
        let mut out = String::new();
        out.push_str(&format!("\n{}\n", rule));
        out.push_str("SIBYL ORACLE - JUDGMENT REPORT\n");
        out.push_str(&format!("{}\n", rule));
        out.push_str(&format!("Market #{}: {}\n\n", self.market_id, self.market_title));

        if let Some(consensus) = &self.consensus {
            for j in &consensus.judgments {
                out.push_str(&format!("  [{}]\n", j.provider));
                out.push_str(&format!("    Outcome:    {}\n", j.outcome));
                out.push_str(&format!("    Confidence: {}%\n", j.confidence));
                out.push_str(&format!("    Reasoning:  {}\n\n", j.reasoning));
            }
            out.push_str(&format!("  CONSENSUS: {}\n", consensus.summary));
            out.push_str(&format!(
                "  Final:     {} ({}%)\n",
                consensus.final_outcome, consensus.final_confidence
            ));
        }

        if let Some(sig) = &self.tx_signature {
            out.push_str(&format!("  Transaction: {}\n", sig));
        } else if self.dry_run {
            out.push_str("  Transaction: skipped (dry run)\n");
        }
        if let Some(err) = &self.error {
            out.push_str(&format!("  Error: {}\n", err));
        }
        out.push_str(&rule);
        out.push('\n');
        out
    }
}

// ============================================================================
// TESTS
// ============================================================================
