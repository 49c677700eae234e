//! # Vaultline Storage
//!
//! Off-chain homes for encrypted vault payloads. Every backend implements
//! [`StorageProvider`]; the CID it returns is what the vault factory records
//! on chain.
//!
//! - [`IpfsProvider`]: Kubo HTTP API plus a read gateway
//! - [`ArweaveProvider`]: permanent storage through a gateway
//! - [`CeramicProvider`]: tile streams holding base64 content
//! - [`MockStorage`]: in-memory, content-addressed
//! - [`FallbackStorage`]: any of the above, backed by the mock

pub mod arweave;
pub mod ceramic;
pub mod error;
pub mod fallback;
pub mod ipfs;
pub mod mock;
pub mod provider;

#[cfg(test)]
mod testing;

pub use arweave::ArweaveProvider;
pub use ceramic::CeramicProvider;
pub use error::{Result, StorageError};
pub use fallback::FallbackStorage;
pub use ipfs::IpfsProvider;
pub use mock::{MockStorage, MOCK_CID_PREFIX};
pub use provider::StorageProvider;

use std::sync::Arc;
use std::time::Duration;
use vaultline_core::{StorageBackend, StorageConfig};

/// Build the provider selected in configuration, wrapped in
/// [`FallbackStorage`] when `mock_fallback` is set
pub fn storage_from_config(config: &StorageConfig) -> Result<Arc<dyn StorageProvider>> {
    let timeout = Duration::from_secs(config.request_timeout_secs);

    let primary: Arc<dyn StorageProvider> = match config.provider {
        StorageBackend::Mock => return Ok(Arc::new(MockStorage::new())),
        StorageBackend::Ipfs => Arc::new(IpfsProvider::new(
            &config.ipfs_api_url,
            &config.ipfs_gateway_url,
            timeout,
        )?),
        StorageBackend::Arweave => Arc::new(ArweaveProvider::new(&config.arweave_url, timeout)?),
        StorageBackend::Ceramic => Arc::new(CeramicProvider::new(&config.ceramic_url, timeout)?),
    };

    tracing::debug!(
        provider = primary.name(),
        mock_fallback = config.mock_fallback,
        "storage provider configured"
    );

    if config.mock_fallback {
        Ok(Arc::new(FallbackStorage::new(primary)))
    } else {
        Ok(primary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_from_config() {
        let mut config = StorageConfig::default();
        assert_eq!(storage_from_config(&config).unwrap().name(), "ipfs+mock");

        config.mock_fallback = false;
        config.provider = StorageBackend::Arweave;
        assert_eq!(storage_from_config(&config).unwrap().name(), "arweave");

        config.provider = StorageBackend::Ceramic;
        config.ceramic_url = "localhost:7007".to_string();
        assert!(matches!(
            storage_from_config(&config),
            Err(StorageError::InvalidEndpoint { .. })
        ));

        config.provider = StorageBackend::Mock;
        config.mock_fallback = true;
        assert_eq!(storage_from_config(&config).unwrap().name(), "mock");
    }

    #[tokio::test]
    async fn test_configured_mock_roundtrip() {
        let config = StorageConfig {
            provider: StorageBackend::Mock,
            ..StorageConfig::default()
        };
        let storage = storage_from_config(&config).unwrap();

        let cid = storage.upload(b"ciphertext").await.unwrap();
        assert_eq!(storage.fetch(&cid).await.unwrap(), b"ciphertext");
    }
}
