//! In-memory provider for development and as a fallback

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use vaultline_core::Cid;

use crate::error::{Result, StorageError};
use crate::provider::{ensure_not_empty, StorageProvider};

/// Prefix of every identifier the mock issues
pub const MOCK_CID_PREFIX: &str = "mock-";

/// Content-addressed map; identical payloads share one id
#[derive(Default)]
pub struct MockStorage {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    pinned: RwLock<HashSet<String>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifier the mock assigns to `data`
    pub fn cid_for(data: &[u8]) -> String {
        format!("{}{}", MOCK_CID_PREFIX, hex::encode(blake3::hash(data).as_bytes()))
    }

    pub fn is_mock_cid(cid: &Cid) -> bool {
        cid.as_str().starts_with(MOCK_CID_PREFIX)
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    pub fn is_pinned(&self, cid: &Cid) -> bool {
        self.pinned.read().contains(cid.as_str())
    }
}

#[async_trait]
impl StorageProvider for MockStorage {
    fn name(&self) -> &str {
        "mock"
    }

    async fn upload(&self, data: &[u8]) -> Result<Cid> {
        ensure_not_empty(data)?;
        let id = Self::cid_for(data);
        self.blobs.write().insert(id.clone(), data.to_vec());
        Cid::new(id).map_err(|e| StorageError::InvalidResponse(e.to_string()))
    }

    async fn fetch(&self, cid: &Cid) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .get(cid.as_str())
            .cloned()
            .ok_or_else(|| StorageError::NotFound(cid.to_string()))
    }

    async fn pin(&self, cid: &Cid) -> Result<()> {
        if !self.blobs.read().contains_key(cid.as_str()) {
            return Err(StorageError::NotFound(cid.to_string()));
        }
        self.pinned.write().insert(cid.to_string());
        Ok(())
    }

    async fn is_available(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_fetch() {
        let storage = MockStorage::new();
        let cid = storage.upload(b"sealed vault").await.unwrap();

        assert!(MockStorage::is_mock_cid(&cid));
        assert_eq!(cid.as_str().len(), MOCK_CID_PREFIX.len() + 64);
        assert_eq!(storage.fetch(&cid).await.unwrap(), b"sealed vault");
    }

    #[tokio::test]
    async fn test_deterministic_ids() {
        let storage = MockStorage::new();
        let a = storage.upload(b"same").await.unwrap();
        let b = storage.upload(b"same").await.unwrap();
        let c = storage.upload(b"other").await.unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(storage.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_and_empty() {
        let storage = MockStorage::new();
        let unknown = Cid::new("mock-deadbeef").unwrap();

        assert!(matches!(storage.fetch(&unknown).await, Err(StorageError::NotFound(_))));
        assert!(storage.pin(&unknown).await.is_err());
        assert!(matches!(storage.upload(&[]).await, Err(StorageError::EmptyPayload)));
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_pin() {
        let storage = MockStorage::new();
        let cid = storage.upload(b"keep me").await.unwrap();
        assert!(!storage.is_pinned(&cid));
        storage.pin(&cid).await.unwrap();
        assert!(storage.is_pinned(&cid));
    }
}
