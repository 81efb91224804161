/// Sibyl Oracle - Program Address Derivation
///
/// Computes deterministic program-owned addresses the same way the ledger
/// runtime does: SHA256(seeds || bump || program_id || marker), walking the
/// bump down from 255 until the digest is NOT a valid Ed25519 point.

use curve25519_dalek::edwards::CompressedEdwardsY;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::str::FromStr;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Deployed Sibyl program (devnet), the one the oracle and frontend talk to
pub const SIBYL_PROGRAM_ID: &str = "CzTVSkqAttKbsG17JqgzhsSyXiVVTf7Q5eNCd6X9bB3W";

/// Seed of the protocol singleton account
pub const PROTOCOL_SEED: &[u8] = b"protocol";

/// Prefix seed of per-market accounts
pub const MARKET_SEED: &[u8] = b"market";

/// Domain separator appended to every derivation hash
const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

pub const MAX_SEEDS: usize = 16;
pub const MAX_SEED_LEN: usize = 32;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressDerivationError {
    /// More seeds than the runtime accepts (bump included)
    TooManySeeds(usize),
    /// A single seed is longer than 32 bytes
    SeedTooLong { index: usize, len: usize },
    /// Every bump from 255 down to 0 landed on the curve
    NoViableBump,
    /// Base58 text did not decode to 32 bytes
    InvalidPubkey(String),
}

impl std::fmt::Display for AddressDerivationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressDerivationError::TooManySeeds(n) => {
                write!(f, "Too many seeds: {} (max {})", n, MAX_SEEDS - 1)
            }
            AddressDerivationError::SeedTooLong { index, len } => {
                write!(f, "Seed {} is {} bytes (max {})", index, len, MAX_SEED_LEN)
            }
            AddressDerivationError::NoViableBump => {
                write!(f, "No off-curve bump found in 0..=255")
            }
            AddressDerivationError::InvalidPubkey(msg) => write!(f, "Invalid pubkey: {}", msg),
        }
    }
}

impl std::error::Error for AddressDerivationError {}

// ============================================================================
// PUBKEY
// ============================================================================

/// 32-byte ledger address, rendered as base58
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Pubkey([u8; 32]);

impl Pubkey {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Pubkey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }

    /// True when the bytes decompress to an Ed25519 point, i.e. a private key
    /// could exist for this address
    pub fn is_on_curve(&self) -> bool {
        CompressedEdwardsY(self.0).decompress().is_some()
    }
}

impl AsRef<[u8]> for Pubkey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Display for Pubkey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl std::fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Pubkey({})", self)
    }
}

impl FromStr for Pubkey {
    type Err = AddressDerivationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| AddressDerivationError::InvalidPubkey(format!("{}: {}", s, e)))?;
        let array: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            AddressDerivationError::InvalidPubkey(format!(
                "{}: expected 32 bytes, got {}",
                s,
                v.len()
            ))
        })?;
        Ok(Pubkey(array))
    }
}

impl Serialize for Pubkey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Pubkey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Pubkey::from_str(&s).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// PROGRAM ADDRESS
// ============================================================================

/// A derived, non-signable address and the bump that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramAddress {
    pub address: Pubkey,
    pub bump: u8,
}

/// Hash one candidate; `None` when it lands on the curve
fn create_program_address(seeds: &[&[u8]], bump: u8, program_id: &Pubkey) -> Option<Pubkey> {
    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update([bump]);
    hasher.update(program_id.as_bytes());
    hasher.update(PDA_MARKER);
    let candidate = Pubkey(hasher.finalize().into());

    if candidate.is_on_curve() {
        None
    } else {
        Some(candidate)
    }
}

/// Find the canonical (highest) bump for `seeds` under `program_id`
pub fn derive(seeds: &[&[u8]], program_id: &Pubkey) -> Result<ProgramAddress, AddressDerivationError> {
    // the bump occupies one seed slot
    if seeds.len() >= MAX_SEEDS {
        return Err(AddressDerivationError::TooManySeeds(seeds.len()));
    }
    if let Some((index, seed)) = seeds.iter().enumerate().find(|(_, s)| s.len() > MAX_SEED_LEN) {
        return Err(AddressDerivationError::SeedTooLong { index, len: seed.len() });
    }

    for bump in (0..=u8::MAX).rev() {
        if let Some(address) = create_program_address(seeds, bump, program_id) {
            return Ok(ProgramAddress { address, bump });
        }
    }

    Err(AddressDerivationError::NoViableBump)
}

/// Address of the protocol singleton
pub fn protocol_address(program_id: &Pubkey) -> Result<ProgramAddress, AddressDerivationError> {
    derive(&[PROTOCOL_SEED], program_id)
}

/// Address of the market with `market_id` (id encoded u64 little-endian)
pub fn market_address(market_id: u64, program_id: &Pubkey) -> Result<ProgramAddress, AddressDerivationError> {
    let id_bytes = market_id.to_le_bytes();
    derive(&[MARKET_SEED, &id_bytes], program_id)
}

/// Parsed default program id
pub fn default_program_id() -> Pubkey {
    // SIBYL_PROGRAM_ID is a fixed valid literal
    Pubkey::from_str(SIBYL_PROGRAM_ID).unwrap_or_default()
}

// ============================================================================
// TESTS
// ============================================================================
