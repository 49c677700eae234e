//! Scripted in-memory transport
//!
//! Answers JSON-RPC methods from registered handlers and records every
//! request. `eth_call` is additionally dispatched by function selector so a
//! test can script contract reads without a node.

use alloy_primitives::Bytes;
use alloy_sol_types::{Revert, SolError};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use vaultline_core::{Result, VaultlineError};

use super::{JsonRpcError, Transport};

type Handler = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

enum CallOutcome {
    Return(Bytes),
    Revert(String),
}

/// Transport backed by closures instead of a node
#[derive(Default)]
pub struct MockTransport {
    handlers: RwLock<HashMap<String, Handler>>,
    calls: RwLock<HashMap<[u8; 4], CallOutcome>>,
    requests: Mutex<Vec<(String, Value)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method` with the handler's result
    pub fn on<F>(&self, method: &str, handler: F) -> &Self
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .insert(method.to_string(), Arc::new(handler));
        self
    }

    /// Answer `method` with a fixed value
    pub fn respond(&self, method: &str, value: Value) -> &Self {
        self.on(method, move |_| Ok(value.clone()))
    }

    /// Answer `eth_call` for `selector` with ABI-encoded return data
    pub fn on_call(&self, selector: [u8; 4], return_data: Vec<u8>) -> &Self {
        self.calls
            .write()
            .insert(selector, CallOutcome::Return(Bytes::from(return_data)));
        self
    }

    /// Make `eth_call` and `eth_estimateGas` for `selector` revert with `reason`
    pub fn on_call_revert(&self, selector: [u8; 4], reason: &str) -> &Self {
        self.calls
            .write()
            .insert(selector, CallOutcome::Revert(reason.to_string()));
        self
    }

    /// Every request seen so far, in order
    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().clone()
    }

    /// Params of every request to `method`
    pub fn requests_for(&self, method: &str) -> Vec<Value> {
        self.requests
            .lock()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }

    fn selector_of(params: &Value) -> Option<[u8; 4]> {
        let data = params.get(0)?.get("data")?.as_str()?;
        let bytes = hex::decode(data.strip_prefix("0x").unwrap_or(data)).ok()?;
        bytes.get(..4)?.try_into().ok()
    }

    fn revert_error(reason: &str) -> VaultlineError {
        let data = Revert {
            reason: reason.to_string(),
        }
        .abi_encode();
        JsonRpcError {
            code: 3,
            message: format!("execution reverted: {}", reason),
            data: Some(Value::String(format!("0x{}", hex::encode(data)))),
        }
        .into_error()
    }

    fn dispatch_call(&self, method: &str, params: &Value) -> Option<Result<Value>> {
        let selector = Self::selector_of(params)?;
        let calls = self.calls.read();
        match calls.get(&selector)? {
            CallOutcome::Revert(reason) => Some(Err(Self::revert_error(reason))),
            CallOutcome::Return(data) if method == "eth_call" => Some(Ok(json!(data))),
            CallOutcome::Return(_) => None,
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        self.requests
            .lock()
            .push((method.to_string(), params.clone()));

        if method == "eth_call" || method == "eth_estimateGas" {
            if let Some(outcome) = self.dispatch_call(method, &params) {
                return outcome;
            }
        }

        let handler = self.handlers.read().get(method).cloned();
        match handler {
            Some(handler) => handler(&params),
            None => Err(VaultlineError::Rpc {
                code: -32601,
                message: format!("Method not found: {}", method),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_and_answers() {
        let mock = MockTransport::new();
        mock.respond("eth_chainId", json!("0x7a69"));

        let result = mock.request("eth_chainId", json!([])).await.unwrap();
        assert_eq!(result, json!("0x7a69"));
        assert_eq!(mock.requests().len(), 1);
        assert!(mock.request("eth_unknown", json!([])).await.is_err());
        assert_eq!(mock.requests_for("eth_unknown").len(), 1);
    }

    #[tokio::test]
    async fn test_call_dispatch_by_selector() {
        let mock = MockTransport::new();
        mock.on_call([1, 2, 3, 4], vec![0xaa; 32]);
        mock.on_call_revert([9, 9, 9, 9], "paused");

        let ok = mock
            .request("eth_call", json!([{ "data": "0x01020304" }, "latest"]))
            .await
            .unwrap();
        assert_eq!(ok, json!(format!("0x{}", "aa".repeat(32))));

        let err = mock
            .request("eth_estimateGas", json!([{ "data": "0x09090909" }]))
            .await
            .unwrap_err();
        assert!(matches!(err, VaultlineError::ContractReverted { reason } if reason == "paused"));
    }
}
