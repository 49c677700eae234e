//! # Vaultline Core
//!
//! Shared building blocks for the Vaultline SDK:
//! - Domain types mirrored from the vault, time-lock, attestation and
//!   AI-vault contracts
//! - The SDK-wide error taxonomy
//! - Conversions between contract units (seconds) and `chrono` values
//! - Layered configuration (defaults, TOML file, environment)

pub mod config;
pub mod error;
pub mod types;
pub mod units;

pub use config::{ContractAddresses, LoggingConfig, NetworkConfig, SdkConfig, StorageBackend, StorageConfig};
pub use error::{Result, VaultlineError};
pub use types::*;

/// Re-exported so downstream crates agree on primitive versions
pub use alloy_primitives::{Address, B256, U256};
