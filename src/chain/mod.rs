// ============================================================================
// Chain Module - Sibyl Program Protocol
// ============================================================================
//
// Speaks the Sibyl program's on-chain protocol without a native client:
//   - address: program address derivation (protocol + market accounts)
//   - codec: market account decoding, resolve instruction encoding
//
// ============================================================================

pub mod address;
pub mod codec;

pub use address::{
    default_program_id, derive, market_address, protocol_address, AddressDerivationError,
    ProgramAddress, Pubkey, MARKET_SEED, PROTOCOL_SEED, SIBYL_PROGRAM_ID,
};
pub use codec::{
    account_discriminator, check_market_discriminator, decode_market, encode_resolve,
    instruction_discriminator, MalformedAccountError, RESOLVE_INSTRUCTION,
};
