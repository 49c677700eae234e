//! Primary provider with an in-memory safety net

use async_trait::async_trait;
use std::sync::Arc;
use vaultline_core::Cid;

use crate::error::{Result, StorageError};
use crate::mock::MockStorage;
use crate::provider::StorageProvider;

/// Routes to the primary provider and falls back to `MockStorage` when it
/// fails. Identifiers issued by the mock are always served by the mock.
pub struct FallbackStorage {
    primary: Arc<dyn StorageProvider>,
    mock: Arc<MockStorage>,
    name: String,
}

impl FallbackStorage {
    pub fn new(primary: Arc<dyn StorageProvider>) -> Self {
        Self::with_mock(primary, Arc::new(MockStorage::new()))
    }

    pub fn with_mock(primary: Arc<dyn StorageProvider>, mock: Arc<MockStorage>) -> Self {
        let name = format!("{}+mock", primary.name());
        Self {
            primary,
            mock,
            name,
        }
    }

    pub fn primary(&self) -> &Arc<dyn StorageProvider> {
        &self.primary
    }

    pub fn mock(&self) -> &Arc<MockStorage> {
        &self.mock
    }
}

#[async_trait]
impl StorageProvider for FallbackStorage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(&self, data: &[u8]) -> Result<Cid> {
        match self.primary.upload(data).await {
            Ok(cid) => Ok(cid),
            Err(StorageError::EmptyPayload) => Err(StorageError::EmptyPayload),
            Err(e) => {
                tracing::warn!(
                    provider = self.primary.name(),
                    error = %e,
                    "upload failed, storing in mock fallback"
                );
                self.mock.upload(data).await
            }
        }
    }

    async fn fetch(&self, cid: &Cid) -> Result<Vec<u8>> {
        if MockStorage::is_mock_cid(cid) {
            return self.mock.fetch(cid).await;
        }

        match self.primary.fetch(cid).await {
            Ok(data) => Ok(data),
            Err(primary_err) => {
                tracing::warn!(
                    provider = self.primary.name(),
                    cid = %cid,
                    error = %primary_err,
                    "fetch failed, trying mock fallback"
                );
                self.mock.fetch(cid).await.map_err(|_| primary_err)
            }
        }
    }

    async fn pin(&self, cid: &Cid) -> Result<()> {
        if MockStorage::is_mock_cid(cid) {
            return self.mock.pin(cid).await;
        }
        self.primary.pin(cid).await
    }

    async fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Provider whose every call fails like an unreachable gateway
    struct Offline;

    #[async_trait]
    impl StorageProvider for Offline {
        fn name(&self) -> &str {
            "offline"
        }

        async fn upload(&self, data: &[u8]) -> Result<Cid> {
            crate::provider::ensure_not_empty(data)?;
            Err(StorageError::Http {
                status: 503,
                body: "unavailable".to_string(),
            })
        }

        async fn fetch(&self, _cid: &Cid) -> Result<Vec<u8>> {
            Err(StorageError::Request("connection refused".to_string()))
        }

        async fn pin(&self, _cid: &Cid) -> Result<()> {
            Err(StorageError::Request("connection refused".to_string()))
        }

        async fn is_available(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_upload_falls_back_to_mock() {
        let storage = FallbackStorage::new(Arc::new(Offline));
        assert_eq!(storage.name(), "offline+mock");

        let cid = storage.upload(b"encrypted blob").await.unwrap();
        assert!(MockStorage::is_mock_cid(&cid));
        assert_eq!(storage.fetch(&cid).await.unwrap(), b"encrypted blob");

        storage.pin(&cid).await.unwrap();
        assert!(storage.mock().is_pinned(&cid));
    }

    #[tokio::test]
    async fn test_primary_error_kept_on_miss() {
        let storage = FallbackStorage::new(Arc::new(Offline));
        let cid = Cid::new("QmNotThere").unwrap();

        let err = storage.fetch(&cid).await.unwrap_err();
        assert!(matches!(err, StorageError::Request(_)));
        assert!(storage.pin(&cid).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_upload_not_masked() {
        let storage = FallbackStorage::new(Arc::new(Offline));
        assert!(matches!(
            storage.upload(&[]).await,
            Err(StorageError::EmptyPayload)
        ));
        assert!(storage.mock().is_empty());
    }

    #[tokio::test]
    async fn test_healthy_primary_is_used() {
        let primary = Arc::new(MockStorage::new());
        let storage = FallbackStorage::new(primary.clone());

        let cid = storage.upload(b"data").await.unwrap();
        assert_eq!(primary.len(), 1);
        assert!(storage.mock().is_empty());
        assert_eq!(primary.fetch(&cid).await.unwrap(), b"data");
    }
}
