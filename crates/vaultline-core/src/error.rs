//! Error types for Vaultline SDK operations

use thiserror::Error;

/// Result type alias for Vaultline operations
pub type Result<T> = std::result::Result<T, VaultlineError>;

/// Errors surfaced by the SDK
#[derive(Error, Debug)]
pub enum VaultlineError {
    // === JSON-RPC ===
    /// The node answered with a JSON-RPC error object
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The request never produced a JSON-RPC answer
    #[error("Transport error: {0}")]
    Transport(String),

    /// Unexpected or malformed response payload
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Operation did not complete in time
    #[error("Timed out: {0}")]
    Timeout(String),

    // === Contracts ===
    /// The contract reverted the call
    #[error("Contract reverted: {reason}")]
    ContractReverted { reason: String },

    /// Transaction was mined but its receipt reports failure
    #[error("Transaction failed: {tx_hash}")]
    TransactionFailed { tx_hash: String },

    /// ABI encoding or decoding failed
    #[error("ABI error: {0}")]
    Abi(String),

    /// A write was attempted on a client without a wallet
    #[error("A signing wallet is required for this operation")]
    SignerRequired,

    /// The contract address was left unset in the configuration
    #[error("Contract address not configured: {0}")]
    ContractNotConfigured(&'static str),

    /// Requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller passed an argument the SDK refuses to send
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // === Utilities ===
    /// Encryption or key handling failed
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Decentralized storage request failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// WebSocket subscription failed
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VaultlineError {
    /// Whether the error came from the remote side rather than the caller
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            VaultlineError::Rpc { .. }
                | VaultlineError::Transport(_)
                | VaultlineError::ContractReverted { .. }
                | VaultlineError::TransactionFailed { .. }
                | VaultlineError::Timeout(_)
        )
    }
}

impl From<config::ConfigError> for VaultlineError {
    fn from(e: config::ConfigError) -> Self {
        VaultlineError::Config(e.to_string())
    }
}

impl From<toml::de::Error> for VaultlineError {
    fn from(e: toml::de::Error) -> Self {
        VaultlineError::Config(e.to_string())
    }
}
