//! SDK configuration types

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, VaultlineError};

/// Environment variable prefix for overrides. One `_` follows the prefix and
/// `__` separates nested keys: `VAULTLINE_NETWORK__RPC_URL`.
pub const ENV_PREFIX: &str = "VAULTLINE";

/// Complete SDK configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SdkConfig {
    /// Node endpoints
    #[serde(default)]
    pub network: NetworkConfig,

    /// Deployed contract addresses
    #[serde(default)]
    pub contracts: ContractAddresses,

    /// Decentralized storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Node connection settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC HTTP endpoint
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// JSON-RPC WebSocket endpoint (event subscriptions)
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Chain id; queried from the node when absent
    #[serde(default)]
    pub chain_id: Option<u64>,

    /// How long to wait for a transaction receipt
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,

    /// Receipt polling interval
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_rpc_url() -> String {
    "http://localhost:8545".to_string()
}

fn default_ws_url() -> String {
    "ws://localhost:8546".to_string()
}

fn default_confirmation_timeout() -> u64 {
    120
}

fn default_poll_interval() -> u64 {
    1_000
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            ws_url: default_ws_url(),
            chain_id: None,
            confirmation_timeout_secs: default_confirmation_timeout(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

/// Addresses of the deployed contracts. The zero address means "not deployed here".
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ContractAddresses {
    #[serde(default)]
    pub vault_factory: Address,

    #[serde(default)]
    pub time_lock_manager: Address,

    #[serde(default)]
    pub attestation_hub: Address,

    #[serde(default)]
    pub ai_vault_manager: Address,
}

impl ContractAddresses {
    /// Every non-zero address, for log subscriptions
    pub fn configured(&self) -> Vec<Address> {
        [
            self.vault_factory,
            self.time_lock_manager,
            self.attestation_hub,
            self.ai_vault_manager,
        ]
        .into_iter()
        .filter(|a| !a.is_zero())
        .collect()
    }
}

/// Storage backend selection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Ipfs,
    Arweave,
    Ceramic,
    Mock,
}

/// Decentralized storage settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub provider: StorageBackend,

    #[serde(default = "default_ipfs_api")]
    pub ipfs_api_url: String,

    #[serde(default = "default_ipfs_gateway")]
    pub ipfs_gateway_url: String,

    #[serde(default = "default_arweave_url")]
    pub arweave_url: String,

    #[serde(default = "default_ceramic_url")]
    pub ceramic_url: String,

    /// Fall back to in-memory storage when the provider is unreachable
    #[serde(default = "default_true")]
    pub mock_fallback: bool,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_ipfs_api() -> String {
    "http://127.0.0.1:5001".to_string()
}

fn default_ipfs_gateway() -> String {
    "https://ipfs.io".to_string()
}

fn default_arweave_url() -> String {
    "https://arweave.net".to_string()
}

fn default_ceramic_url() -> String {
    "http://localhost:7007".to_string()
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageBackend::default(),
            ipfs_api_url: default_ipfs_api(),
            ipfs_gateway_url: default_ipfs_gateway(),
            arweave_url: default_arweave_url(),
            ceramic_url: default_ceramic_url(),
            mock_fallback: true,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl SdkConfig {
    /// Load configuration: defaults, then the optional TOML file, then
    /// `VAULTLINE_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(VaultlineError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path).format(config::FileFormat::Toml));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: SdkConfig = settings.try_deserialize()?;
        tracing::debug!(rpc = %config.network.rpc_url, "configuration loaded");
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| VaultlineError::Config(e.to_string()))
    }

    /// Configuration for a local development node with mock storage
    pub fn development() -> Self {
        Self {
            network: NetworkConfig {
                chain_id: Some(31_337),
                confirmation_timeout_secs: 30,
                poll_interval_ms: 250,
                ..Default::default()
            },
            storage: StorageConfig {
                provider: StorageBackend::Mock,
                ..Default::default()
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                json: false,
            },
            ..Default::default()
        }
    }
}
