/// Sibyl Oracle - Account & Instruction Codec
///
/// Strict little-endian decoder for the `Market` account and encoder for the
/// `resolve` instruction payload. Layout of a market account:
///
/// ```text
/// [0..8)    account discriminator (skipped)
/// [8..16)   id                 u64
/// [16..48)  authority          pubkey (skipped)
///           title              u32 len + utf8
///           description        u32 len + utf8
///           resolution_deadline i64
///           yes_pool           u64
///           no_pool            u64
///           status             u8
///           outcome            u8 tag (+ u8 when tag == 1)
///           oracle_confidence  u8
/// ```
///
/// Bytes after `oracle_confidence` (bump, allocation padding) are ignored.

use sha2::{Digest, Sha256};

use crate::models::{MarketAccount, MarketStatus, Outcome};

// ============================================================================
// CONSTANTS
// ============================================================================

pub const DISCRIMINATOR_LEN: usize = 8;

/// Name of the instruction the oracle submits
pub const RESOLVE_INSTRUCTION: &str = "resolve";

/// Account type name of market accounts
pub const MARKET_ACCOUNT: &str = "Market";

/// Length of the encoded resolve payload
pub const RESOLVE_PAYLOAD_LEN: usize = DISCRIMINATOR_LEN + 2;

const AUTHORITY_LEN: usize = 32;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedAccountError {
    /// Not enough bytes left to read `field`
    Truncated {
        field: &'static str,
        offset: usize,
        needed: usize,
        len: usize,
    },
    /// String field is not valid UTF-8
    InvalidUtf8 { field: &'static str },
    /// Status ordinal outside 0..=3
    InvalidStatus(u8),
    /// Outcome ordinal outside 0..=2
    InvalidOutcome(u8),
    /// Option tag other than 0 or 1
    InvalidOptionTag(u8),
    /// Leading 8 bytes are not the expected account type
    Discriminator { expected: String, found: String },
}

impl std::fmt::Display for MalformedAccountError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedAccountError::Truncated { field, offset, needed, len } => write!(
                f,
                "Account data truncated reading {}: need {} bytes at offset {}, have {}",
                field, needed, offset, len
            ),
            MalformedAccountError::InvalidUtf8 { field } => {
                write!(f, "Account field {} is not valid UTF-8", field)
            }
            MalformedAccountError::InvalidStatus(v) => write!(f, "Unknown market status ordinal {}", v),
            MalformedAccountError::InvalidOutcome(v) => write!(f, "Unknown outcome ordinal {}", v),
            MalformedAccountError::InvalidOptionTag(v) => write!(f, "Invalid option tag {}", v),
            MalformedAccountError::Discriminator { expected, found } => write!(
                f,
                "Account discriminator mismatch: expected {}, found {}",
                expected, found
            ),
        }
    }
}

impl std::error::Error for MalformedAccountError {}

// ============================================================================
// DISCRIMINATORS
// ============================================================================

fn namespaced_hash(namespace: &str, name: &str) -> [u8; DISCRIMINATOR_LEN] {
    let digest = Sha256::digest(format!("{}:{}", namespace, name).as_bytes());
    let mut out = [0u8; DISCRIMINATOR_LEN];
    out.copy_from_slice(&digest[..DISCRIMINATOR_LEN]);
    out
}

/// First 8 bytes of SHA256("global:<snake_case_name>")
pub fn instruction_discriminator(name: &str) -> [u8; DISCRIMINATOR_LEN] {
    namespaced_hash("global", name)
}

/// First 8 bytes of SHA256("account:<TypeName>")
pub fn account_discriminator(type_name: &str) -> [u8; DISCRIMINATOR_LEN] {
    namespaced_hash("account", type_name)
}

/// Reject data whose leading bytes are not the `Market` account discriminator
pub fn check_market_discriminator(data: &[u8]) -> Result<(), MalformedAccountError> {
    let expected = account_discriminator(MARKET_ACCOUNT);
    let found = data.get(..DISCRIMINATOR_LEN).ok_or(MalformedAccountError::Truncated {
        field: "discriminator",
        offset: 0,
        needed: DISCRIMINATOR_LEN,
        len: data.len(),
    })?;

    if found != expected {
        return Err(MalformedAccountError::Discriminator {
            expected: hex::encode(expected),
            found: hex::encode(found),
        });
    }
    Ok(())
}

// ============================================================================
// DECODER
// ============================================================================

/// Bounds-checked cursor over account bytes
struct AccountReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> AccountReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn take(&mut self, field: &'static str, n: usize) -> Result<&'a [u8], MalformedAccountError> {
        let end = self.offset.checked_add(n);
        let slice = end.and_then(|end| self.data.get(self.offset..end)).ok_or(
            MalformedAccountError::Truncated {
                field,
                offset: self.offset,
                needed: n,
                len: self.data.len(),
            },
        )?;
        self.offset += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], MalformedAccountError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(field, N)?);
        Ok(out)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, MalformedAccountError> {
        Ok(self.take(field, 1)?[0])
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, MalformedAccountError> {
        Ok(u32::from_le_bytes(self.array(field)?))
    }

    fn u64(&mut self, field: &'static str) -> Result<u64, MalformedAccountError> {
        Ok(u64::from_le_bytes(self.array(field)?))
    }

    fn i64(&mut self, field: &'static str) -> Result<i64, MalformedAccountError> {
        Ok(i64::from_le_bytes(self.array(field)?))
    }

    fn string(&mut self, field: &'static str) -> Result<String, MalformedAccountError> {
        let len = self.u32(field)? as usize;
        let bytes = self.take(field, len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| MalformedAccountError::InvalidUtf8 { field })
    }
}

/// Decode a raw `Market` account blob
pub fn decode_market(raw: &[u8]) -> Result<MarketAccount, MalformedAccountError> {
    let mut reader = AccountReader::new(raw);

    reader.take("discriminator", DISCRIMINATOR_LEN)?;
    let id = reader.u64("id")?;
    reader.take("authority", AUTHORITY_LEN)?;
    let title = reader.string("title")?;
    let description = reader.string("description")?;
    let resolution_deadline = reader.i64("resolution_deadline")?;
    let yes_pool = reader.u64("yes_pool")?;
    let no_pool = reader.u64("no_pool")?;

    let status_ordinal = reader.u8("status")?;
    let status = MarketStatus::from_u8(status_ordinal)
        .ok_or(MalformedAccountError::InvalidStatus(status_ordinal))?;

    let outcome = match reader.u8("outcome_tag")? {
        0 => None,
        1 => {
            let ordinal = reader.u8("outcome")?;
            Some(Outcome::from_u8(ordinal).ok_or(MalformedAccountError::InvalidOutcome(ordinal))?)
        }
        tag => return Err(MalformedAccountError::InvalidOptionTag(tag)),
    };

    let oracle_confidence = reader.u8("oracle_confidence")?;

    Ok(MarketAccount {
        id,
        title,
        description,
        resolution_deadline,
        yes_pool,
        no_pool,
        status,
        outcome,
        oracle_confidence,
    })
}

// ============================================================================
// ENCODER
// ============================================================================

/// Instruction data for `resolve(outcome, confidence)`
pub fn encode_resolve(outcome: Outcome, confidence: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(RESOLVE_PAYLOAD_LEN);
    data.extend_from_slice(&instruction_discriminator(RESOLVE_INSTRUCTION));
    data.push(outcome.as_u8());
    data.push(confidence);
    data
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-built account bytes in the on-chain layout
    fn market_fixture(status: u8, outcome: Option<u8>, confidence: u8) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&account_discriminator(MARKET_ACCOUNT));
        data.extend_from_slice(&42u64.to_le_bytes());
        data.extend_from_slice(&[9u8; 32]);
        let title = "Will SOL close above $200?";
        data.extend_from_slice(&(title.len() as u32).to_le_bytes());
        data.extend_from_slice(title.as_bytes());
        let description = "Resolves Yes if the daily close is above $200.";
        data.extend_from_slice(&(description.len() as u32).to_le_bytes());
        data.extend_from_slice(description.as_bytes());
        data.extend_from_slice(&(-1_700_000_000i64).to_le_bytes());
        data.extend_from_slice(&5_000u64.to_le_bytes());
        data.extend_from_slice(&7_500u64.to_le_bytes());
        data.push(status);
        match outcome {
            Some(o) => {
                data.push(1);
                data.push(o);
            }
            None => data.push(0),
        }
        data.push(confidence);
        data
    }

    #[test]
    fn test_decode_open_market_without_outcome() {
        let market = decode_market(&market_fixture(0, None, 0)).unwrap();
        assert_eq!(market.id, 42);
        assert_eq!(market.title, "Will SOL close above $200?");
        assert_eq!(market.description, "Resolves Yes if the daily close is above $200.");
        assert_eq!(market.resolution_deadline, -1_700_000_000);
        assert_eq!(market.yes_pool, 5_000);
        assert_eq!(market.no_pool, 7_500);
        assert_eq!(market.status, MarketStatus::Open);
        assert_eq!(market.outcome, None);
        assert_eq!(market.oracle_confidence, 0);
    }

    #[test]
    fn test_decode_every_status_and_outcome() {
        let statuses = [
            (0u8, MarketStatus::Open),
            (1, MarketStatus::Locked),
            (2, MarketStatus::Resolved),
            (3, MarketStatus::Settled),
        ];
        let outcomes = [
            (None, None),
            (Some(0u8), Some(Outcome::Yes)),
            (Some(1), Some(Outcome::No)),
            (Some(2), Some(Outcome::Invalid)),
        ];

        for (status_byte, status) in statuses {
            for (outcome_byte, outcome) in outcomes {
                let market = decode_market(&market_fixture(status_byte, outcome_byte, 87)).unwrap();
                assert_eq!(market.status, status);
                assert_eq!(market.outcome, outcome);
                assert_eq!(market.oracle_confidence, 87);
            }
        }
    }

    #[test]
    fn test_confidence_not_range_checked() {
        let market = decode_market(&market_fixture(2, Some(0), 255)).unwrap();
        assert_eq!(market.oracle_confidence, 255);
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut data = market_fixture(1, None, 0);
        data.push(254); // bump
        data.extend_from_slice(&[0u8; 64]);
        assert_eq!(decode_market(&data).unwrap().status, MarketStatus::Locked);
    }

    #[test]
    fn test_every_truncation_is_an_error() {
        let data = market_fixture(2, Some(1), 90);
        for len in 0..data.len() {
            let err = decode_market(&data[..len]).unwrap_err();
            assert!(
                matches!(err, MalformedAccountError::Truncated { .. }),
                "len {} gave {:?}",
                len,
                err
            );
        }
    }

    #[test]
    fn test_oversized_string_length_is_error() {
        let mut data = market_fixture(0, None, 0);
        // title length field sits right after the authority
        data[48..52].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            decode_market(&data),
            Err(MalformedAccountError::Truncated { field: "title", .. })
        ));
    }

    #[test]
    fn test_invalid_utf8_title() {
        let mut data = market_fixture(0, None, 0);
        data[52] = 0xff;
        assert_eq!(
            decode_market(&data),
            Err(MalformedAccountError::InvalidUtf8 { field: "title" })
        );
    }

    #[test]
    fn test_bad_ordinals_rejected() {
        assert_eq!(
            decode_market(&market_fixture(4, None, 0)),
            Err(MalformedAccountError::InvalidStatus(4))
        );
        assert_eq!(
            decode_market(&market_fixture(2, Some(3), 0)),
            Err(MalformedAccountError::InvalidOutcome(3))
        );

        let mut data = market_fixture(0, None, 0);
        let tag_at = data.len() - 2;
        data[tag_at] = 2;
        assert_eq!(decode_market(&data), Err(MalformedAccountError::InvalidOptionTag(2)));
    }

    #[test]
    fn test_discriminator_properties() {
        assert_eq!(instruction_discriminator("resolve"), instruction_discriminator("resolve"));
        assert_ne!(instruction_discriminator("resolve"), instruction_discriminator("initialize"));
        assert_eq!(instruction_discriminator("resolve").len(), 8);

        let digest = Sha256::digest(b"global:resolve");
        assert_eq!(&instruction_discriminator("resolve")[..], &digest[..8]);
        assert_ne!(account_discriminator("Market"), instruction_discriminator("Market"));
    }

    #[test]
    fn test_encode_resolve_layout() {
        let data = encode_resolve(Outcome::No, 85);
        assert_eq!(data.len(), RESOLVE_PAYLOAD_LEN);
        assert_eq!(&data[..8], &instruction_discriminator("resolve"));
        assert_eq!(data[8], 1);
        assert_eq!(data[9], 85);

        assert_eq!(encode_resolve(Outcome::Yes, 0)[8], 0);
        assert_eq!(encode_resolve(Outcome::Invalid, 100)[8..], [2u8, 100u8]);
    }

    #[test]
    fn test_market_discriminator_check() {
        let data = market_fixture(0, None, 0);
        assert!(check_market_discriminator(&data).is_ok());

        let mut wrong = data.clone();
        wrong[0] ^= 0xff;
        assert!(matches!(
            check_market_discriminator(&wrong),
            Err(MalformedAccountError::Discriminator { .. })
        ));
        assert!(check_market_discriminator(&data[..4]).is_err());
    }
}
