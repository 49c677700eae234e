//! JSON-RPC 2.0 transport
//!
//! Every contract interaction ends up here as a single request/response
//! pair. There is no retry or batching: errors are mapped and returned.

use alloy_sol_types::{Panic, Revert, SolError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use vaultline_core::{Result, VaultlineError};

pub mod mock;

pub use mock::MockTransport;

/// Transport seam between the SDK and a JSON-RPC node
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one request and return its `result` member
    async fn request(&self, method: &str, params: Value) -> Result<Value>;
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

/// Error object carried by a JSON-RPC response
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Map to an SDK error, decoding revert payloads when present
    pub fn into_error(self) -> VaultlineError {
        if let Some(reason) = self.revert_reason() {
            return VaultlineError::ContractReverted { reason };
        }
        if self.message.contains("execution reverted") {
            return VaultlineError::ContractReverted {
                reason: self.message,
            };
        }
        VaultlineError::Rpc {
            code: self.code,
            message: self.message,
        }
    }

    fn revert_reason(&self) -> Option<String> {
        let data = match &self.data {
            Some(Value::String(s)) => s.as_str(),
            Some(Value::Object(map)) => map.get("data")?.as_str()?,
            _ => return None,
        };
        let bytes = hex::decode(data.strip_prefix("0x").unwrap_or(data)).ok()?;
        decode_revert(&bytes)
    }
}

/// Decode `Error(string)` and `Panic(uint256)` revert payloads
pub fn decode_revert(data: &[u8]) -> Option<String> {
    if let Ok(revert) = Revert::abi_decode(data, true) {
        return Some(revert.reason);
    }
    if let Ok(panic) = Panic::abi_decode(data, true) {
        return Some(format!("panic code 0x{:x}", panic.code));
    }
    None
}

/// JSON-RPC over HTTP(S)
pub struct HttpTransport {
    url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(url: &str) -> Result<Self> {
        Self::with_timeout(url, Duration::from_secs(30))
    }

    pub fn with_timeout(url: &str, timeout: Duration) -> Result<Self> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(VaultlineError::InvalidArgument(format!(
                "RPC url must be http(s): {}",
                url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VaultlineError::Transport(e.to_string()))?;

        Ok(Self {
            url: url.to_string(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        tracing::trace!(id, method, "rpc request");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VaultlineError::Timeout(format!("{} to {}", method, self.url))
                } else {
                    VaultlineError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body: JsonRpcResponse = response.json().await.map_err(|e| {
            VaultlineError::InvalidResponse(format!("{} (HTTP {}): {}", method, status, e))
        })?;

        if let Some(error) = body.error {
            tracing::debug!(id, method, code = error.code, "rpc error: {}", error.message);
            return Err(error.into_error());
        }

        Ok(body.result.unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    #[test]
    fn test_revert_reason_from_data() {
        let data = Revert {
            reason: "not vault owner".to_string(),
        }
        .abi_encode();

        let error = JsonRpcError {
            code: 3,
            message: "execution reverted: not vault owner".to_string(),
            data: Some(Value::String(format!("0x{}", hex::encode(data)))),
        };

        match error.into_error() {
            VaultlineError::ContractReverted { reason } => assert_eq!(reason, "not vault owner"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_panic_code() {
        let data = Panic {
            code: U256::from(0x11),
        }
        .abi_encode();
        assert_eq!(decode_revert(&data).unwrap(), "panic code 0x11");
        assert!(decode_revert(&[0xde, 0xad]).is_none());
    }

    #[test]
    fn test_plain_rpc_error() {
        let error = JsonRpcError {
            code: -32601,
            message: "Method not found".to_string(),
            data: None,
        };
        assert!(matches!(
            error.into_error(),
            VaultlineError::Rpc { code: -32601, .. }
        ));
    }

    #[test]
    fn test_rejects_non_http_url() {
        assert!(HttpTransport::new("ws://localhost:8546").is_err());
        assert!(HttpTransport::new("http://localhost:8545").is_ok());
    }
}
