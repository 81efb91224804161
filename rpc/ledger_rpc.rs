// ============================================================================
// Ledger RPC - JSON-RPC client for the Solana cluster
// ============================================================================
//
// Only the four calls the resolve path needs:
//   getAccountInfo        - read raw account bytes (base64)
//   getLatestBlockhash    - freshness token for each transaction
//   sendTransaction       - submit signed wire bytes (base64)
//   getSignatureStatuses  - poll until the transaction is committed
//
// ============================================================================

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::chain::Pubkey;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Default cluster endpoint
pub const DEFAULT_RPC_URL: &str = "https://api.devnet.solana.com";

/// Default timeout for a single RPC request
pub const RPC_TIMEOUT_SECS: u64 = 30;

/// How long to wait for a sent transaction to be committed
pub const CONFIRM_TIMEOUT_SECS: u64 = 30;

/// Delay between signature status polls
pub const CONFIRM_POLL_MS: u64 = 500;

/// Commitment level used for reads, preflight and confirmation
pub const DEFAULT_COMMITMENT: &str = "confirmed";

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcError {
    /// HTTP request failed before a response arrived
    RequestFailed(String),
    /// Node answered with a non-success HTTP status
    HttpStatus(u16),
    /// JSON-RPC error object
    Rpc { code: i64, message: String },
    /// Response did not have the expected shape
    InvalidResponse(String),
    /// Transaction landed but the program rejected it
    TransactionFailed(String),
    /// Transaction not committed within the confirmation window
    ConfirmationTimeout(String),
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcError::RequestFailed(msg) => write!(f, "RPC request failed: {}", msg),
            RpcError::HttpStatus(code) => write!(f, "RPC returned HTTP status {}", code),
            RpcError::Rpc { code, message } => write!(f, "RPC error {}: {}", code, message),
            RpcError::InvalidResponse(msg) => write!(f, "Invalid RPC response: {}", msg),
            RpcError::TransactionFailed(msg) => write!(f, "Transaction failed: {}", msg),
            RpcError::ConfirmationTimeout(sig) => {
                write!(f, "Transaction {} not confirmed in time", sig)
            }
        }
    }
}

impl std::error::Error for RpcError {}

// ============================================================================
// LEDGER RPC TRAIT
// ============================================================================

/// Network operations the resolve path performs against the ledger
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Raw account data, or `None` when no account lives at `address`
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, RpcError>;

    /// Current blockhash (32 bytes)
    async fn get_latest_blockhash(&self) -> Result<[u8; 32], RpcError>;

    /// Submit wire bytes; returns the transaction signature (base58)
    async fn send_transaction(&self, wire_tx: &[u8]) -> Result<String, RpcError>;

    /// Wait until `signature` is committed at the configured commitment
    async fn confirm_transaction(&self, signature: &str) -> Result<(), RpcError>;
}

// ============================================================================
// CONFIG
// ============================================================================

/// Configuration for the cluster connection
#[derive(Debug, Clone)]
pub struct RpcConfig {
    pub endpoint: String,
    pub timeout: Duration,
    pub commitment: String,
    pub confirm_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_RPC_URL.to_string(),
            timeout: Duration::from_secs(RPC_TIMEOUT_SECS),
            commitment: DEFAULT_COMMITMENT.to_string(),
            confirm_timeout: Duration::from_secs(CONFIRM_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(CONFIRM_POLL_MS),
        }
    }
}

impl RpcConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }
}

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct AccountInfo {
    /// `[payload, encoding]`
    data: (String, String),
}

#[derive(Debug, Deserialize)]
struct BlockhashInfo {
    blockhash: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    err: Option<Value>,
    confirmation_status: Option<String>,
}

// ============================================================================
// SOLANA RPC CLIENT
// ============================================================================

/// JSON-RPC 2.0 client over HTTP
pub struct SolanaRpcClient {
    config: RpcConfig,
    client: Client,
}

impl SolanaRpcClient {
    pub fn new(config: RpcConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { config, client }
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };
        debug!(method, endpoint = %self.config.endpoint, "rpc call");

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError::RequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RpcError::HttpStatus(response.status().as_u16()));
        }

        let body: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| RpcError::InvalidResponse(format!("{}: {}", method, e)))?;

        if let Some(err) = body.error {
            return Err(RpcError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        body.result
            .ok_or_else(|| RpcError::InvalidResponse(format!("{}: missing result", method)))
    }

    fn is_committed(&self, status: &str) -> bool {
        match self.config.commitment.as_str() {
            "finalized" => status == "finalized",
            "processed" => true,
            _ => status == "confirmed" || status == "finalized",
        }
    }
}

#[async_trait]
impl LedgerRpc for SolanaRpcClient {
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, RpcError> {
        let params = json!([
            address.to_string(),
            { "encoding": "base64", "commitment": self.config.commitment }
        ]);
        let result: WithContext<Option<AccountInfo>> = self.call("getAccountInfo", params).await?;

        match result.value {
            None => Ok(None),
            Some(info) => {
                let (payload, encoding) = info.data;
                if encoding != "base64" {
                    return Err(RpcError::InvalidResponse(format!(
                        "unexpected account encoding {}",
                        encoding
                    )));
                }
                BASE64
                    .decode(payload)
                    .map(Some)
                    .map_err(|e| RpcError::InvalidResponse(format!("account data: {}", e)))
            }
        }
    }

    async fn get_latest_blockhash(&self) -> Result<[u8; 32], RpcError> {
        let params = json!([{ "commitment": self.config.commitment }]);
        let result: WithContext<BlockhashInfo> = self.call("getLatestBlockhash", params).await?;

        let bytes = bs58::decode(&result.value.blockhash)
            .into_vec()
            .map_err(|e| RpcError::InvalidResponse(format!("blockhash: {}", e)))?;
        bytes
            .try_into()
            .map_err(|_| RpcError::InvalidResponse("blockhash is not 32 bytes".to_string()))
    }

    async fn send_transaction(&self, wire_tx: &[u8]) -> Result<String, RpcError> {
        let params = json!([
            BASE64.encode(wire_tx),
            {
                "encoding": "base64",
                "skipPreflight": false,
                "preflightCommitment": self.config.commitment,
            }
        ]);
        self.call("sendTransaction", params).await
    }

    async fn confirm_transaction(&self, signature: &str) -> Result<(), RpcError> {
        let deadline = Instant::now() + self.config.confirm_timeout;

        loop {
            let params = json!([[signature], { "searchTransactionHistory": false }]);
            let result: WithContext<Vec<Option<SignatureStatus>>> =
                self.call("getSignatureStatuses", params).await?;

            if let Some(Some(status)) = result.value.into_iter().next() {
                if let Some(err) = status.err {
                    return Err(RpcError::TransactionFailed(err.to_string()));
                }
                if status
                    .confirmation_status
                    .as_deref()
                    .map_or(false, |s| self.is_committed(s))
                {
                    return Ok(());
                }
            }

            if Instant::now() >= deadline {
                return Err(RpcError::ConfirmationTimeout(signature.to_string()));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
