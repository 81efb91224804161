//! Quorum consensus over provider judgments
//!
//! Rules, in order:
//!   - fewer than QUORUM judgments      → Invalid, confidence 0, no consensus
//!   - one outcome held by ≥ QUORUM     → that outcome, mean confidence of its holders
//!   - otherwise (all distinct / tied)  → Invalid, confidence 0, no consensus
//!
//! The mean is rounded half-to-even (82.5 → 82, 87.5 → 88).

use crate::models::{ConsensusResult, JudgmentResult, Outcome};

/// Minimum number of agreeing judgments
pub const QUORUM: usize = 2;

/// Integer mean rounded half-to-even; 0 for an empty slice
pub fn round_half_even_mean(values: &[u8]) -> u8 {
    if values.is_empty() {
        return 0;
    }
    let n = values.len() as u64;
    let sum: u64 = values.iter().map(|&v| v as u64).sum();
    let (quotient, remainder) = (sum / n, sum % n);

    let rounded = match (2 * remainder).cmp(&n) {
        std::cmp::Ordering::Greater => quotient + 1,
        std::cmp::Ordering::Equal if quotient % 2 == 1 => quotient + 1,
        _ => quotient,
    };
    // mean of u8 values never exceeds u8::MAX
    rounded.min(u8::MAX as u64) as u8
}

/// Reduces judgments to a single decision
#[derive(Debug, Clone)]
pub struct ConsensusEngine {
    expected_providers: usize,
}

impl ConsensusEngine {
    /// `expected_providers` is only used in the human-readable summary
    pub fn new(expected_providers: usize) -> Self {
        Self { expected_providers }
    }

    pub fn reduce(&self, judgments: Vec<JudgmentResult>) -> ConsensusResult {
        if judgments.len() < QUORUM {
            let agreeing_providers = judgments.iter().map(|j| j.provider.clone()).collect();
            let summary = format!(
                "Insufficient responses ({}/{}). Cannot reach consensus.",
                judgments.len(),
                self.expected_providers
            );
            return ConsensusResult {
                judgments,
                final_outcome: Outcome::Invalid,
                final_confidence: 0,
                consensus_reached: false,
                agreeing_providers,
                summary,
            };
        }

        // tally in first-seen order
        let mut tally: Vec<(Outcome, usize)> = Vec::new();
        for j in &judgments {
            match tally.iter_mut().find(|(o, _)| *o == j.outcome) {
                Some((_, count)) => *count += 1,
                None => tally.push((j.outcome, 1)),
            }
        }

        let top = tally.iter().map(|(_, c)| *c).max().unwrap_or(0);
        let leaders: Vec<Outcome> = tally.iter().filter(|(_, c)| *c == top).map(|(o, _)| *o).collect();

        if top >= QUORUM && leaders.len() == 1 {
            let winner = leaders[0];
            let agreeing: Vec<&JudgmentResult> = judgments.iter().filter(|j| j.outcome == winner).collect();
            let confidences: Vec<u8> = agreeing.iter().map(|j| j.confidence).collect();
            let final_confidence = round_half_even_mean(&confidences);
            let agreeing_providers = agreeing.iter().map(|j| j.provider.clone()).collect();
            let summary = format!(
                "Consensus: {} ({}/{} agree, confidence {}%)",
                winner,
                agreeing.len(),
                judgments.len(),
                final_confidence
            );
            return ConsensusResult {
                judgments,
                final_outcome: winner,
                final_confidence,
                consensus_reached: true,
                agreeing_providers,
                summary,
            };
        }

        let summary = if top == 1 {
            "No consensus - all providers returned different outcomes.".to_string()
        } else {
            "No consensus - leading outcomes are tied.".to_string()
        };
        ConsensusResult {
            judgments,
            final_outcome: Outcome::Invalid,
            final_confidence: 0,
            consensus_reached: false,
            agreeing_providers: Vec::new(),
            summary,
        }
    }
}

impl Default for ConsensusEngine {
    fn default() -> Self {
        Self::new(3)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn j(provider: &str, outcome: Outcome, confidence: u8) -> JudgmentResult {
        JudgmentResult {
            provider: provider.to_string(),
            outcome,
            confidence,
            reasoning: String::new(),
        }
    }

    #[test]
    fn test_unanimous() {
        let result = ConsensusEngine::default().reduce(vec![
            j("gemini", Outcome::Yes, 90),
            j("claude", Outcome::Yes, 80),
            j("gpt", Outcome::Yes, 85),
        ]);
        assert_eq!(result.final_outcome, Outcome::Yes);
        assert!(result.consensus_reached);
        assert_eq!(result.final_confidence, 85);
        assert_eq!(result.agreeing_providers.len(), 3);
        assert_eq!(result.summary, "Consensus: Yes (3/3 agree, confidence 85%)");
    }

    #[test]
    fn test_two_of_three_uses_only_agreeing_confidence() {
        let result = ConsensusEngine::default().reduce(vec![
            j("gemini", Outcome::Yes, 90),
            j("claude", Outcome::Yes, 80),
            j("gpt", Outcome::No, 60),
        ]);
        assert_eq!(result.final_outcome, Outcome::Yes);
        assert!(result.consensus_reached);
        assert_eq!(result.final_confidence, 85);
        assert_eq!(result.agreeing_providers, vec!["gemini", "claude"]);
        assert_eq!(result.judgments.len(), 3);
    }

    #[test]
    fn test_all_different_is_invalid() {
        let result = ConsensusEngine::default().reduce(vec![
            j("gemini", Outcome::Yes, 80),
            j("claude", Outcome::No, 70),
            j("gpt", Outcome::Invalid, 50),
        ]);
        assert_eq!(result.final_outcome, Outcome::Invalid);
        assert!(!result.consensus_reached);
        assert_eq!(result.final_confidence, 0);
        assert!(result.agreeing_providers.is_empty());
        assert!(result.summary.contains("different outcomes"));
    }

    #[test]
    fn test_single_response_is_insufficient() {
        let result = ConsensusEngine::default().reduce(vec![j("claude", Outcome::Yes, 95)]);
        assert_eq!(result.final_outcome, Outcome::Invalid);
        assert!(!result.consensus_reached);
        assert_eq!(result.final_confidence, 0);
        assert_eq!(result.agreeing_providers, vec!["claude"]);
        assert_eq!(result.summary, "Insufficient responses (1/3). Cannot reach consensus.");
    }

    #[test]
    fn test_no_responses() {
        let result = ConsensusEngine::default().reduce(Vec::new());
        assert_eq!(result.final_outcome, Outcome::Invalid);
        assert!(!result.consensus_reached);
        assert!(result.judgments.is_empty());
        assert!(result.agreeing_providers.is_empty());
        assert!(result.summary.contains("Insufficient responses (0/3)"));
    }

    #[test]
    fn test_two_agreeing_with_third_missing() {
        let result = ConsensusEngine::default().reduce(vec![
            j("gemini", Outcome::Yes, 100),
            j("gpt", Outcome::Yes, 60),
        ]);
        assert_eq!(result.final_outcome, Outcome::Yes);
        assert_eq!(result.final_confidence, 80);
        assert_eq!(result.judgments.len(), 2);
        assert!(result.consensus_reached);
    }

    #[test]
    fn test_two_disagreeing_is_invalid() {
        let result = ConsensusEngine::default().reduce(vec![
            j("gemini", Outcome::Yes, 100),
            j("gpt", Outcome::No, 100),
        ]);
        assert_eq!(result.final_outcome, Outcome::Invalid);
        assert!(!result.consensus_reached);
    }

    #[test]
    fn test_invalid_can_win_by_majority() {
        let result = ConsensusEngine::default().reduce(vec![
            j("gemini", Outcome::Invalid, 70),
            j("claude", Outcome::Invalid, 75),
            j("gpt", Outcome::No, 90),
        ]);
        assert_eq!(result.final_outcome, Outcome::Invalid);
        assert!(result.consensus_reached);
        // 72.5 rounds to even
        assert_eq!(result.final_confidence, 72);
    }

    #[test]
    fn test_tie_among_four_is_no_consensus() {
        let result = ConsensusEngine::new(4).reduce(vec![
            j("a", Outcome::Yes, 90),
            j("b", Outcome::No, 90),
            j("c", Outcome::Yes, 90),
            j("d", Outcome::No, 90),
        ]);
        assert!(!result.consensus_reached);
        assert_eq!(result.final_outcome, Outcome::Invalid);
        assert!(result.summary.contains("tied"));
    }

    #[test]
    fn test_half_even_rounding() {
        assert_eq!(round_half_even_mean(&[85, 80]), 82);
        assert_eq!(round_half_even_mean(&[90, 85]), 88);
        assert_eq!(round_half_even_mean(&[0, 1]), 0);
        assert_eq!(round_half_even_mean(&[1, 2]), 2);
        assert_eq!(round_half_even_mean(&[90, 80, 81]), 84);
        assert_eq!(round_half_even_mean(&[100, 100, 100]), 100);
        assert_eq!(round_half_even_mean(&[]), 0);
    }
}
