// ============================================================================
// RPC Module - Ledger Communication & Signed Transactions
// ============================================================================
//
// This module handles all communication with the ledger cluster,
// including transaction compilation, signing and JSON-RPC transport.
//
// Components:
//   - transaction: legacy message compilation, Ed25519 signing, keypair files
//   - ledger_rpc: JSON-RPC client behind the LedgerRpc trait
//
// ============================================================================

pub mod ledger_rpc;
pub mod transaction;

pub use ledger_rpc::*;
pub use transaction::*;
