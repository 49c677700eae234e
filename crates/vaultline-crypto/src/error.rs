//! Cryptographic error types

use thiserror::Error;
use vaultline_core::VaultlineError;

/// Result type for cryptographic operations
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors in encryption and key handling
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key material has the wrong length or encoding
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Serialized payload is malformed
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Encryption failed
    #[error("Encryption failed")]
    EncryptionFailed,

    /// Wrong key, tampered ciphertext or mismatched associated data
    #[error("Decryption failed")]
    DecryptionFailed,
}

impl From<CryptoError> for VaultlineError {
    fn from(e: CryptoError) -> Self {
        VaultlineError::Crypto(e.to_string())
    }
}
