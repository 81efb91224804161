//! Signed Ledger Transactions
//!
//! Legacy (non-versioned) message compilation, Ed25519 signing and the binary
//! wire format accepted by `sendTransaction`. Also loads the oracle keypair
//! from a Solana CLI keypair file.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use std::path::Path;

use crate::chain::Pubkey;

// ============================================================================
// KEYPAIR
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeypairError {
    /// No keypair path was configured
    Missing,
    /// Keypair file could not be read
    Io(String),
    /// File is not a JSON array of 64 bytes
    Format(String),
    /// Public half does not match the secret
    Mismatch,
}

impl std::fmt::Display for KeypairError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeypairError::Missing => write!(f, "ORACLE_KEYPAIR_PATH environment variable is required"),
            KeypairError::Io(msg) => write!(f, "Failed to read keypair: {}", msg),
            KeypairError::Format(msg) => write!(f, "Invalid keypair file: {}", msg),
            KeypairError::Mismatch => write!(f, "Keypair public key does not match secret key"),
        }
    }
}

impl std::error::Error for KeypairError {}

/// Oracle signing keypair
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    /// Deterministic keypair from a 32-byte secret seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(seed))
    }

    /// 64 bytes: secret seed followed by public key
    pub fn from_keypair_bytes(bytes: &[u8]) -> Result<Self, KeypairError> {
        let array: &[u8; 64] = bytes
            .try_into()
            .map_err(|_| KeypairError::Format(format!("expected 64 bytes, got {}", bytes.len())))?;
        let signing_key = SigningKey::from_keypair_bytes(array).map_err(|_| KeypairError::Mismatch)?;
        Ok(Self { signing_key })
    }

    /// Parse the Solana CLI JSON format (`[12, 250, ...]`)
    pub fn from_json(json: &str) -> Result<Self, KeypairError> {
        let bytes: Vec<u8> =
            serde_json::from_str(json).map_err(|e| KeypairError::Format(e.to_string()))?;
        Self::from_keypair_bytes(&bytes)
    }

    pub fn read_from_file(path: &Path) -> Result<Self, KeypairError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| KeypairError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn pubkey(&self) -> Pubkey {
        Pubkey::new(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair").field("pubkey", &self.pubkey()).finish()
    }
}

// ============================================================================
// COMPACT-U16
// ============================================================================

/// Variable-length u16 used for every length prefix in the wire format
pub fn encode_compact_u16(value: u16, out: &mut Vec<u8>) {
    let mut rem = value;
    loop {
        let mut byte = (rem & 0x7f) as u8;
        rem >>= 7;
        if rem == 0 {
            out.push(byte);
            break;
        }
        byte |= 0x80;
        out.push(byte);
    }
}

fn encode_len(len: usize, out: &mut Vec<u8>) -> Result<(), TransactionError> {
    let len = u16::try_from(len).map_err(|_| TransactionError::TooLarge(len))?;
    encode_compact_u16(len, out);
    Ok(())
}

// ============================================================================
// INSTRUCTIONS & MESSAGES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    /// An instruction references an account missing from the key list
    UnknownAccount(Pubkey),
    /// More than 256 accounts or a length past u16
    TooLarge(usize),
}

impl std::fmt::Display for TransactionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionError::UnknownAccount(key) => write!(f, "Account {} not in message", key),
            TransactionError::TooLarge(n) => write!(f, "Transaction section too large: {}", n),
        }
    }
}

impl std::error::Error for TransactionError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn readonly(pubkey: Pubkey, is_signer: bool) -> Self {
        Self { pubkey, is_signer, is_writable: false }
    }

    pub fn writable(pubkey: Pubkey, is_signer: bool) -> Self {
        Self { pubkey, is_signer, is_writable: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageHeader {
    pub num_required_signatures: u8,
    pub num_readonly_signed_accounts: u8,
    pub num_readonly_unsigned_accounts: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    pub program_id_index: u8,
    pub accounts: Vec<u8>,
    pub data: Vec<u8>,
}

/// Compiled legacy message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: MessageHeader,
    pub account_keys: Vec<Pubkey>,
    pub recent_blockhash: [u8; 32],
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// Compile `instructions` with `payer` as the fee payer.
    ///
    /// Keys are deduplicated (flags OR-ed) and ordered writable signers,
    /// read-only signers, writable non-signers, read-only non-signers,
    /// each group keeping first-seen order. The payer always comes first.
    pub fn compile(
        instructions: &[Instruction],
        payer: &Pubkey,
        recent_blockhash: [u8; 32],
    ) -> Result<Self, TransactionError> {
        let mut metas: Vec<AccountMeta> = vec![AccountMeta::writable(*payer, true)];
        let mut merge = |meta: AccountMeta| {
            if let Some(existing) = metas.iter_mut().find(|m| m.pubkey == meta.pubkey) {
                existing.is_signer |= meta.is_signer;
                existing.is_writable |= meta.is_writable;
            } else {
                metas.push(meta);
            }
        };
        for ix in instructions {
            for meta in &ix.accounts {
                merge(*meta);
            }
            merge(AccountMeta::readonly(ix.program_id, false));
        }

        let group = |signer: bool, writable: bool| {
            metas
                .iter()
                .filter(move |m| m.is_signer == signer && m.is_writable == writable)
                .map(|m| m.pubkey)
        };
        let writable_signed: Vec<Pubkey> = group(true, true).collect();
        let readonly_signed: Vec<Pubkey> = group(true, false).collect();
        let writable_unsigned: Vec<Pubkey> = group(false, true).collect();
        let readonly_unsigned: Vec<Pubkey> = group(false, false).collect();

        let count = |n: usize| u8::try_from(n).map_err(|_| TransactionError::TooLarge(n));
        let header = MessageHeader {
            num_required_signatures: count(writable_signed.len() + readonly_signed.len())?,
            num_readonly_signed_accounts: count(readonly_signed.len())?,
            num_readonly_unsigned_accounts: count(readonly_unsigned.len())?,
        };

        let account_keys: Vec<Pubkey> = writable_signed
            .into_iter()
            .chain(readonly_signed)
            .chain(writable_unsigned)
            .chain(readonly_unsigned)
            .collect();
        if account_keys.len() > 256 {
            return Err(TransactionError::TooLarge(account_keys.len()));
        }

        let index_of = |key: &Pubkey| {
            account_keys
                .iter()
                .position(|k| k == key)
                .map(|i| i as u8)
                .ok_or(TransactionError::UnknownAccount(*key))
        };

        let compiled = instructions
            .iter()
            .map(|ix| -> Result<CompiledInstruction, TransactionError> {
                Ok(CompiledInstruction {
                    program_id_index: index_of(&ix.program_id)?,
                    accounts: ix
                        .accounts
                        .iter()
                        .map(|m| index_of(&m.pubkey))
                        .collect::<Result<Vec<u8>, _>>()?,
                    data: ix.data.clone(),
                })
            })
            .collect::<Result<Vec<_>, TransactionError>>()?;

        Ok(Message {
            header,
            account_keys,
            recent_blockhash,
            instructions: compiled,
        })
    }

    /// Bytes covered by the signatures
    pub fn serialize(&self) -> Result<Vec<u8>, TransactionError> {
        let mut out = vec![
            self.header.num_required_signatures,
            self.header.num_readonly_signed_accounts,
            self.header.num_readonly_unsigned_accounts,
        ];

        encode_len(self.account_keys.len(), &mut out)?;
        for key in &self.account_keys {
            out.extend_from_slice(key.as_bytes());
        }
        out.extend_from_slice(&self.recent_blockhash);

        encode_len(self.instructions.len(), &mut out)?;
        for ix in &self.instructions {
            out.push(ix.program_id_index);
            encode_len(ix.accounts.len(), &mut out)?;
            out.extend_from_slice(&ix.accounts);
            encode_len(ix.data.len(), &mut out)?;
            out.extend_from_slice(&ix.data);
        }
        Ok(out)
    }
}

// ============================================================================
// TRANSACTION
// ============================================================================

/// Single-message transaction with its signatures
#[derive(Debug, Clone)]
pub struct Transaction {
    pub signatures: Vec<Signature>,
    pub message: Message,
    message_bytes: Vec<u8>,
}

impl Transaction {
    /// Sign `message` with the only required signer
    pub fn sign(message: Message, signer: &Keypair) -> Result<Self, TransactionError> {
        let message_bytes = message.serialize()?;
        let signature = signer.sign(&message_bytes);
        Ok(Self {
            signatures: vec![signature],
            message,
            message_bytes,
        })
    }

    pub fn message_bytes(&self) -> &[u8] {
        &self.message_bytes
    }

    /// Base58 text of the first signature, which is the transaction id
    pub fn id(&self) -> String {
        self.signatures
            .first()
            .map(|s| bs58::encode(s.to_bytes()).into_string())
            .unwrap_or_default()
    }

    /// Check every signature against the matching signer key
    pub fn verify(&self) -> bool {
        let required = self.message.header.num_required_signatures as usize;
        if self.signatures.len() != required {
            return false;
        }
        self.signatures
            .iter()
            .zip(self.message.account_keys.iter())
            .all(|(sig, key)| {
                VerifyingKey::from_bytes(key.as_bytes())
                    .map(|vk| vk.verify(&self.message_bytes, sig).is_ok())
                    .unwrap_or(false)
            })
    }

    /// Wire bytes: compact signature count, signatures, message
    pub fn serialize(&self) -> Result<Vec<u8>, TransactionError> {
        let mut out = Vec::with_capacity(1 + 64 * self.signatures.len() + self.message_bytes.len());
        encode_len(self.signatures.len(), &mut out)?;
        for sig in &self.signatures {
            out.extend_from_slice(&sig.to_bytes());
        }
        out.extend_from_slice(&self.message_bytes);
        Ok(out)
    }
}

// ============================================================================
// TESTS
// ============================================================================
