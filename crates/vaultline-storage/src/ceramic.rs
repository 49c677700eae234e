//! Ceramic tile streams
//!
//! The payload is stored base64-encoded inside the genesis commit of a tile
//! document; the stream id serves as the CID.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use vaultline_core::Cid;

use crate::error::{Result, StorageError};
use crate::provider::{check, cid_from_response, endpoint, ensure_not_empty, http_client, StorageProvider};

/// Tile document stream type
const TILE_STREAM_TYPE: u8 = 0;

pub struct CeramicProvider {
    url: String,
    client: reqwest::Client,
}

impl CeramicProvider {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            url: endpoint(url)?,
            client: http_client(timeout)?,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamResponse {
    stream_id: String,
}

fn genesis(data: &[u8]) -> Value {
    json!({
        "type": TILE_STREAM_TYPE,
        "genesis": {
            "header": { "family": "vaultline", "controllers": [] },
            "data": { "encoding": "base64", "data": BASE64.encode(data) },
        },
        "opts": { "anchor": false, "publish": true },
    })
}

/// Extract and decode `state.content.data`
fn decode_stream_content(stream: &Value) -> Result<Vec<u8>> {
    let encoded = stream
        .pointer("/state/content/data")
        .and_then(Value::as_str)
        .ok_or_else(|| StorageError::InvalidResponse("stream has no content data".to_string()))?;
    BASE64
        .decode(encoded)
        .map_err(|e| StorageError::InvalidResponse(format!("stream content: {}", e)))
}

#[async_trait]
impl StorageProvider for CeramicProvider {
    fn name(&self) -> &str {
        "ceramic"
    }

    async fn upload(&self, data: &[u8]) -> Result<Cid> {
        ensure_not_empty(data)?;

        let response = self
            .client
            .post(format!("{}/api/v0/streams", self.url))
            .json(&genesis(data))
            .send()
            .await?;
        let stream: StreamResponse = check(response, "ceramic stream")
            .await?
            .json()
            .await
            .map_err(|e| StorageError::InvalidResponse(format!("ceramic stream: {}", e)))?;

        let cid = cid_from_response(stream.stream_id, self.name())?;
        tracing::debug!(stream = %cid, bytes = data.len(), "uploaded to ceramic");
        Ok(cid)
    }

    async fn fetch(&self, cid: &Cid) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(format!("{}/api/v0/streams/{}", self.url, cid))
            .send()
            .await?;
        let stream: Value = check(response, cid.as_str()).await?.json().await?;
        decode_stream_content(&stream)
    }

    async fn pin(&self, cid: &Cid) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/api/v0/pins/{}", self.url, cid))
            .send()
            .await?;
        check(response, cid.as_str()).await?;
        Ok(())
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/api/v0/node/healthcheck", self.url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Reply, ScriptedServer};

    #[test]
    fn test_genesis_carries_payload() {
        let body = genesis(b"vault secret");
        assert_eq!(body["type"], json!(0));
        assert_eq!(body["genesis"]["data"]["data"], json!(BASE64.encode(b"vault secret")));
    }

    #[test]
    fn test_decode_stream_content() {
        let stream = json!({
            "streamId": "kjzl6cwe1jw14",
            "state": { "content": { "encoding": "base64", "data": BASE64.encode([1u8, 2, 3]) } }
        });
        assert_eq!(decode_stream_content(&stream).unwrap(), vec![1, 2, 3]);

        let missing = json!({ "state": { "content": {} } });
        assert!(matches!(
            decode_stream_content(&missing),
            Err(StorageError::InvalidResponse(_))
        ));

        let garbled = json!({ "state": { "content": { "data": "***" } } });
        assert!(decode_stream_content(&garbled).is_err());
    }

    #[tokio::test]
    async fn test_stream_paths() {
        let state = json!({
            "streamId": "kjzl6cwe1jw14",
            "state": { "content": { "encoding": "base64", "data": BASE64.encode(b"ciphertext") } }
        });
        let server = ScriptedServer::start(vec![
            Reply::new(200, r#"{"streamId":"kjzl6cwe1jw14"}"#),
            Reply::new(200, r#"{"streamId":"kjzl6cwe1jw14","isPinned":true}"#),
            Reply::new(200, state.to_string()),
            Reply::new(503, "node syncing"),
        ])
        .await;
        let provider = CeramicProvider::new(&server.url, Duration::from_secs(5)).unwrap();

        let id = provider.upload(b"ciphertext").await.unwrap();
        assert_eq!(id.as_str(), "kjzl6cwe1jw14");
        provider.pin(&id).await.unwrap();
        assert_eq!(provider.fetch(&id).await.unwrap(), b"ciphertext");
        assert!(matches!(
            provider.pin(&id).await,
            Err(StorageError::Http { status: 503, .. })
        ));

        let calls = server.requests();
        assert_eq!(calls[0].line, "POST /api/v0/streams HTTP/1.1");
        let sent: Value = serde_json::from_slice(&calls[0].body).unwrap();
        assert_eq!(sent, genesis(b"ciphertext"));
        assert_eq!(calls[1].line, "POST /api/v0/pins/kjzl6cwe1jw14 HTTP/1.1");
        assert_eq!(calls[2].line, "GET /api/v0/streams/kjzl6cwe1jw14 HTTP/1.1");
    }
}
