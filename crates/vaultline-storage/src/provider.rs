//! Storage provider seam and shared HTTP plumbing

use async_trait::async_trait;
use std::time::Duration;
use vaultline_core::Cid;

use crate::error::{Result, StorageError};

/// Longest response body kept in `StorageError::Http`
const MAX_ERROR_BODY: usize = 512;

/// Content-addressed blob store
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &str;

    /// Store `data`, returning its identifier
    async fn upload(&self, data: &[u8]) -> Result<Cid>;

    async fn fetch(&self, cid: &Cid) -> Result<Vec<u8>>;

    /// Ask the provider to retain the content
    async fn pin(&self, cid: &Cid) -> Result<()>;

    async fn is_available(&self) -> bool;
}

pub(crate) fn ensure_not_empty(data: &[u8]) -> Result<()> {
    if data.is_empty() {
        return Err(StorageError::EmptyPayload);
    }
    Ok(())
}

/// Validate a base URL and strip its trailing slash
pub(crate) fn endpoint(raw: &str) -> Result<String> {
    let parsed = url::Url::parse(raw).map_err(|e| StorageError::InvalidEndpoint {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(StorageError::InvalidEndpoint {
            url: raw.to_string(),
            reason: format!("unsupported scheme {}", parsed.scheme()),
        });
    }
    Ok(raw.trim_end_matches('/').to_string())
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Map non-success statuses to `StorageError::Http`; 404 becomes `NotFound`
pub(crate) async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(StorageError::NotFound(what.to_string()));
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(StorageError::Http {
        status: status.as_u16(),
        body,
    })
}

pub(crate) fn cid_from_response(raw: String, provider: &str) -> Result<Cid> {
    Cid::new(raw).map_err(|_| {
        StorageError::InvalidResponse(format!("{} returned an empty identifier", provider))
    })
}
