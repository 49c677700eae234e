//! Arweave gateway uploads

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use vaultline_core::Cid;

use crate::error::{Result, StorageError};
use crate::provider::{check, cid_from_response, endpoint, ensure_not_empty, http_client, StorageProvider};

/// Permanent storage; pinning is a no-op
pub struct ArweaveProvider {
    url: String,
    client: reqwest::Client,
}

impl ArweaveProvider {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            url: endpoint(url)?,
            client: http_client(timeout)?,
        })
    }
}

#[derive(Deserialize)]
struct TxResponse {
    id: String,
}

#[async_trait]
impl StorageProvider for ArweaveProvider {
    fn name(&self) -> &str {
        "arweave"
    }

    async fn upload(&self, data: &[u8]) -> Result<Cid> {
        ensure_not_empty(data)?;

        let response = self
            .client
            .post(format!("{}/tx", self.url))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data.to_vec())
            .send()
            .await?;
        let tx: TxResponse = check(response, "arweave tx")
            .await?
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(format!("arweave tx: {}", e)))?;

        let cid = cid_from_response(tx.id, self.name())?;
        tracing::debug!(id = %cid, bytes = data.len(), "uploaded to arweave");
        Ok(cid)
    }

    async fn fetch(&self, cid: &Cid) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(format!("{}/{}", self.url, cid))
            .send()
            .await?;
        let bytes = check(response, cid.as_str()).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn pin(&self, cid: &Cid) -> Result<()> {
        tracing::debug!(id = %cid, "arweave data is permanent; nothing to pin");
        Ok(())
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/info", self.url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}
