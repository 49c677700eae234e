//! Typed wrappers over the `eth_*` methods the SDK relies on

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use vaultline_core::{Result, VaultlineError};

use crate::rpc::Transport;

/// Read-only call or gas estimation request
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    pub to: Address,
    pub data: Bytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
}

/// Event log entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_index: Option<U256>,
}

/// Subset of a transaction receipt
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default)]
    pub block_number: Option<U256>,
    #[serde(default)]
    pub gas_used: Option<U256>,
    /// `0x1` success, `0x0` failure; absent on pre-Byzantium chains
    #[serde(default)]
    pub status: Option<U256>,
    #[serde(default)]
    pub logs: Vec<Log>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        self.status.map_or(true, |s| s == U256::from(1))
    }
}

/// Parse a hex quantity (`"0x1a"`) as u64
pub fn quantity_u64(value: &Value) -> Result<u64> {
    let s = quantity_str(value)?;
    if s.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(s, 16)
        .map_err(|e| VaultlineError::InvalidResponse(format!("bad quantity {:?}: {}", value, e)))
}

/// Parse a hex quantity as u128
pub fn quantity_u128(value: &Value) -> Result<u128> {
    let s = quantity_str(value)?;
    if s.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(s, 16)
        .map_err(|e| VaultlineError::InvalidResponse(format!("bad quantity {:?}: {}", value, e)))
}

fn quantity_str(value: &Value) -> Result<&str> {
    let s = value
        .as_str()
        .ok_or_else(|| VaultlineError::InvalidResponse(format!("expected hex string, got {}", value)))?;
    Ok(s.strip_prefix("0x").unwrap_or(s))
}

fn quantity(n: u64) -> String {
    format!("{:#x}", n)
}

/// JSON-RPC provider
#[derive(Clone)]
pub struct Provider {
    transport: Arc<dyn Transport>,
}

impl Provider {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub async fn chain_id(&self) -> Result<u64> {
        let value = self.transport.request("eth_chainId", json!([])).await?;
        quantity_u64(&value)
    }

    pub async fn block_number(&self) -> Result<u64> {
        let value = self.transport.request("eth_blockNumber", json!([])).await?;
        quantity_u64(&value)
    }

    pub async fn balance(&self, address: Address) -> Result<U256> {
        let value = self
            .transport
            .request("eth_getBalance", json!([address, "latest"]))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Next nonce, counting pending transactions
    pub async fn transaction_count(&self, address: Address) -> Result<u64> {
        let value = self
            .transport
            .request("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        quantity_u64(&value)
    }

    pub async fn gas_price(&self) -> Result<u128> {
        let value = self.transport.request("eth_gasPrice", json!([])).await?;
        quantity_u128(&value)
    }

    pub async fn estimate_gas(&self, request: &CallRequest) -> Result<u64> {
        let value = self
            .transport
            .request("eth_estimateGas", json!([request]))
            .await?;
        quantity_u64(&value)
    }

    pub async fn call(&self, request: &CallRequest) -> Result<Bytes> {
        let value = self
            .transport
            .request("eth_call", json!([request, "latest"]))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256> {
        let value = self
            .transport
            .request(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(raw))]),
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// `None` while the transaction is pending
    pub async fn transaction_receipt(&self, hash: B256) -> Result<Option<TransactionReceipt>> {
        let value = self
            .transport
            .request("eth_getTransactionReceipt", json!([hash]))
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(value)?))
    }

    /// Poll for a receipt until it appears or `timeout` elapses
    pub async fn wait_for_receipt(
        &self,
        hash: B256,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<TransactionReceipt> {
        let poll = async {
            loop {
                if let Some(receipt) = self.transaction_receipt(hash).await? {
                    return Ok::<_, VaultlineError>(receipt);
                }
                tokio::time::sleep(poll_interval).await;
            }
        };

        tokio::time::timeout(timeout, poll).await.map_err(|_| {
            VaultlineError::Timeout(format!("no receipt for {} after {:?}", hash, timeout))
        })?
    }

    /// Logs emitted by `addresses` in the block range
    pub async fn logs(&self, addresses: &[Address], from_block: u64, to_block: Option<u64>) -> Result<Vec<Log>> {
        let to_block = to_block.map_or_else(|| "latest".to_string(), quantity);
        let value = self
            .transport
            .request(
                "eth_getLogs",
                json!([{
                    "address": addresses,
                    "fromBlock": quantity(from_block),
                    "toBlock": to_block,
                }]),
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }
}
