//! Sibyl Oracle - Resolve Transaction Submitter
//!
//! BUILD -> SIGN -> SEND -> CONFIRM, wrapped in a bounded retry loop.
//! Every attempt fetches a fresh blockhash. When the last attempt fails the
//! ledger error from that attempt is returned as-is inside
//! `SubmissionError::Rpc`.

use std::time::Duration;
use tracing::{info, warn};

use crate::chain::{encode_resolve, market_address, protocol_address, AddressDerivationError, Pubkey};
use crate::models::Outcome;
use crate::rpc::{AccountMeta, Instruction, Keypair, LedgerRpc, Message, RpcError, Transaction, TransactionError};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Total attempts (first try included)
pub const MAX_SUBMIT_ATTEMPTS: u32 = 3;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    /// Confidence outside 0..=100; the program would reject it
    InvalidConfidence(u8),
    /// Protocol or market address could not be derived
    Address(AddressDerivationError),
    /// Message could not be compiled
    Transaction(TransactionError),
    /// Ledger error from the final attempt, untouched
    Rpc(RpcError),
}

impl std::fmt::Display for SubmissionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubmissionError::InvalidConfidence(c) => write!(f, "Confidence {} out of range 0-100", c),
            SubmissionError::Address(e) => write!(f, "{}", e),
            SubmissionError::Transaction(e) => write!(f, "{}", e),
            SubmissionError::Rpc(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SubmissionError {}

impl From<AddressDerivationError> for SubmissionError {
    fn from(e: AddressDerivationError) -> Self {
        SubmissionError::Address(e)
    }
}

impl From<TransactionError> for SubmissionError {
    fn from(e: TransactionError) -> Self {
        SubmissionError::Transaction(e)
    }
}

impl From<RpcError> for SubmissionError {
    fn from(e: RpcError) -> Self {
        SubmissionError::Rpc(e)
    }
}

// ============================================================================
// SUBMITTER
// ============================================================================

/// Builds and lands `resolve` transactions signed by the oracle key
pub struct TransactionSubmitter<'a, R: LedgerRpc + ?Sized> {
    rpc: &'a R,
    signer: &'a Keypair,
    program_id: Pubkey,
    max_attempts: u32,
    retry_delay: Duration,
}

impl<'a, R: LedgerRpc + ?Sized> TransactionSubmitter<'a, R> {
    pub fn new(rpc: &'a R, signer: &'a Keypair, program_id: Pubkey) -> Self {
        Self {
            rpc,
            signer,
            program_id,
            max_attempts: MAX_SUBMIT_ATTEMPTS,
            retry_delay: Duration::ZERO,
        }
    }

    /// Pause between failed attempts (zero by default)
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Instruction with accounts [protocol (ro), market (w), oracle (ro, signer)]
    pub fn build_instruction(
        &self,
        market_id: u64,
        outcome: Outcome,
        confidence: u8,
    ) -> Result<Instruction, SubmissionError> {
        let protocol = protocol_address(&self.program_id)?;
        let market = market_address(market_id, &self.program_id)?;

        Ok(Instruction {
            program_id: self.program_id,
            accounts: vec![
                AccountMeta::readonly(protocol.address, false),
                AccountMeta::writable(market.address, false),
                AccountMeta::readonly(self.signer.pubkey(), true),
            ],
            data: encode_resolve(outcome, confidence),
        })
    }

    /// Submit `resolve(outcome, confidence)` for `market_id`; returns the signature
    pub async fn submit(
        &self,
        market_id: u64,
        outcome: Outcome,
        confidence: u8,
    ) -> Result<String, SubmissionError> {
        if confidence > 100 {
            return Err(SubmissionError::InvalidConfidence(confidence));
        }
        let instruction = self.build_instruction(market_id, outcome, confidence)?;

        let mut attempt = 1;
        loop {
            match self.attempt(&instruction, attempt).await {
                Ok(signature) => return Ok(signature),
                Err(SubmissionError::Rpc(err)) => {
                    warn!(
                        "❌ Resolve tx attempt {}/{} failed: {}",
                        attempt, self.max_attempts, err
                    );
                    if attempt >= self.max_attempts {
                        return Err(SubmissionError::Rpc(err));
                    }
                }
                Err(other) => return Err(other),
            }
            attempt += 1;
            if !self.retry_delay.is_zero() {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
    }

    async fn attempt(&self, instruction: &Instruction, attempt: u32) -> Result<String, SubmissionError> {
        // BUILD
        let blockhash = self.rpc.get_latest_blockhash().await?;
        let message = Message::compile(std::slice::from_ref(instruction), &self.signer.pubkey(), blockhash)?;

        // SIGN
        let transaction = Transaction::sign(message, self.signer)?;
        let wire = transaction.serialize()?;

        // SEND
        let signature = self.rpc.send_transaction(&wire).await?;
        info!("📤 Resolve tx sent (attempt {}): {}", attempt, signature);

        // CONFIRM
        self.rpc.confirm_transaction(&signature).await?;
        info!("✅ Resolve tx confirmed: {}", signature);
        Ok(signature)
    }
}

// ============================================================================
// TESTS
// ============================================================================
