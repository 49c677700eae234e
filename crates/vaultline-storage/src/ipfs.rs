//! IPFS over the Kubo HTTP API

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use vaultline_core::Cid;

use crate::error::{Result, StorageError};
use crate::provider::{check, cid_from_response, endpoint, ensure_not_empty, http_client, StorageProvider};

/// Uploads and pins through the node API, reads through a gateway
pub struct IpfsProvider {
    api_url: String,
    gateway_url: String,
    client: reqwest::Client,
}

impl IpfsProvider {
    pub fn new(api_url: &str, gateway_url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            api_url: endpoint(api_url)?,
            gateway_url: endpoint(gateway_url)?,
            client: http_client(timeout)?,
        })
    }
}

#[derive(Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

/// `/api/v0/add` may stream one JSON object per line; the last names the root
fn parse_add_response(body: &str) -> Result<String> {
    let line = body
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| StorageError::InvalidResponse("empty add response".to_string()))?;

    let parsed: AddResponse = serde_json::from_str(line)
        .map_err(|e| StorageError::InvalidResponse(format!("ipfs add: {}", e)))?;
    Ok(parsed.hash)
}

#[async_trait]
impl StorageProvider for IpfsProvider {
    fn name(&self) -> &str {
        "ipfs"
    }

    async fn upload(&self, data: &[u8]) -> Result<Cid> {
        ensure_not_empty(data)?;

        let part = reqwest::multipart::Part::bytes(data.to_vec()).file_name("vault.bin");
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/api/v0/add?pin=true", self.api_url))
            .multipart(form)
            .send()
            .await?;
        let body = check(response, "ipfs add").await?.text().await?;

        let cid = cid_from_response(parse_add_response(&body)?, self.name())?;
        tracing::debug!(cid = %cid, bytes = data.len(), "uploaded to ipfs");
        Ok(cid)
    }

    async fn fetch(&self, cid: &Cid) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(format!("{}/ipfs/{}", self.gateway_url, cid))
            .send()
            .await?;
        let bytes = check(response, cid.as_str()).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn pin(&self, cid: &Cid) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/api/v0/pin/add", self.api_url))
            .query(&[("arg", cid.as_str())])
            .send()
            .await?;
        check(response, cid.as_str()).await?;
        tracing::debug!(cid = %cid, "pinned on ipfs");
        Ok(())
    }

    async fn is_available(&self) -> bool {
        self.client
            .post(format!("{}/api/v0/version", self.api_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}
