//! Storage error types

use thiserror::Error;
use vaultline_core::VaultlineError;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Refusing to store an empty payload")]
    EmptyPayload,

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Content not found: {0}")]
    NotFound(String),

    #[error("Invalid endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::Request(err.to_string())
    }
}

impl From<StorageError> for VaultlineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(cid) => VaultlineError::NotFound(format!("content {}", cid)),
            other => VaultlineError::Storage(other.to_string()),
        }
    }
}
