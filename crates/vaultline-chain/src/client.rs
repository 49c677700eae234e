//! Connection and account factory
//!
//! `VaultlineClient` owns the provider, the optional signing wallet and the
//! contract address book. Reads work without a wallet; writes are refused
//! up front when none is attached.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};
use vaultline_core::{ContractAddresses, Result, SdkConfig, VaultlineError};

use crate::contracts::ContractKind;
use crate::provider::{CallRequest, Log, Provider, TransactionReceipt};
use crate::rpc::{HttpTransport, Transport};
use crate::services::{AiVaultService, AttestationService, TimeLockService, VaultService};
use crate::wallet::{TransactionRequest, Wallet};

/// Gas limit = estimate * 12 / 10
const GAS_MARGIN_NUMERATOR: u64 = 12;
const GAS_MARGIN_DENOMINATOR: u64 = 10;

/// Result of a mined write
#[derive(Clone, Debug)]
pub struct TxOutcome {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    pub logs: Vec<Log>,
}

impl TxOutcome {
    fn from_receipt(receipt: TransactionReceipt) -> Self {
        let to_u64 = |v: Option<U256>| v.and_then(|v| u64::try_from(v).ok());
        Self {
            tx_hash: receipt.transaction_hash,
            block_number: to_u64(receipt.block_number),
            gas_used: to_u64(receipt.gas_used),
            logs: receipt.logs,
        }
    }

    /// First event of type `E` emitted by `address`
    pub fn find_event<E: SolEvent>(&self, address: Address) -> Option<E> {
        self.logs
            .iter()
            .filter(|log| log.address == address)
            .filter(|log| log.topics.first() == Some(&E::SIGNATURE_HASH))
            .find_map(|log| E::decode_raw_log(log.topics.iter().copied(), &log.data, true).ok())
    }
}

/// Entry point of the SDK
pub struct VaultlineClient {
    provider: Provider,
    wallet: Option<Arc<Wallet>>,
    contracts: ContractAddresses,
    chain_id: OnceCell<u64>,
    poll_interval: Duration,
    confirmation_timeout: Duration,
    /// Serializes nonce assignment and submission
    send_lock: Mutex<()>,
}

impl VaultlineClient {
    /// Connect over HTTP JSON-RPC using `config.network.rpc_url`
    pub fn connect(config: &SdkConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config.network.rpc_url)?;
        tracing::info!(rpc = %config.network.rpc_url, "connecting vaultline client");
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    /// Build a client on any transport
    pub fn with_transport(transport: Arc<dyn Transport>, config: &SdkConfig) -> Self {
        Self {
            provider: Provider::new(transport),
            wallet: None,
            contracts: config.contracts.clone(),
            chain_id: OnceCell::new_with(config.network.chain_id),
            poll_interval: Duration::from_millis(config.network.poll_interval_ms),
            confirmation_timeout: Duration::from_secs(config.network.confirmation_timeout_secs),
            send_lock: Mutex::new(()),
        }
    }

    /// Attach a signing wallet
    pub fn with_wallet(mut self, wallet: Wallet) -> Self {
        tracing::debug!(address = %wallet.address(), "wallet attached");
        self.wallet = Some(Arc::new(wallet));
        self
    }

    pub fn has_signer(&self) -> bool {
        self.wallet.is_some()
    }

    /// Address of the attached wallet
    pub fn address(&self) -> Option<Address> {
        self.wallet.as_ref().map(|w| w.address())
    }

    pub fn wallet(&self) -> Option<&Wallet> {
        self.wallet.as_deref()
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn contracts(&self) -> &ContractAddresses {
        &self.contracts
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn contract_address(&self, kind: ContractKind) -> Result<Address> {
        kind.address_in(&self.contracts)
    }

    /// Chain id from configuration, or queried once from the node
    pub async fn chain_id(&self) -> Result<u64> {
        self.chain_id
            .get_or_try_init(|| self.provider.chain_id())
            .await
            .copied()
    }

    pub fn vaults(&self) -> VaultService<'_> {
        VaultService::new(self)
    }

    pub fn time_locks(&self) -> TimeLockService<'_> {
        TimeLockService::new(self)
    }

    pub fn attestations(&self) -> AttestationService<'_> {
        AttestationService::new(self)
    }

    pub fn ai_vaults(&self) -> AiVaultService<'_> {
        AiVaultService::new(self)
    }

    /// Execute a view function and decode its return tuple
    pub async fn call<C: SolCall>(&self, to: Address, call: &C) -> Result<C::Return> {
        let request = CallRequest {
            from: self.address(),
            to,
            data: Bytes::from(call.abi_encode()),
            value: None,
        };

        let data = self.provider.call(&request).await?;
        if data.is_empty() {
            return Err(VaultlineError::InvalidResponse(format!(
                "empty return data from {}; is the contract deployed?",
                to
            )));
        }

        C::abi_decode_returns(&data, true).map_err(|e| VaultlineError::Abi(e.to_string()))
    }

    /// Sign, submit and wait for a state-changing call
    pub async fn send<C: SolCall>(&self, to: Address, call: &C) -> Result<TxOutcome> {
        let wallet = self.wallet.as_ref().ok_or(VaultlineError::SignerRequired)?;
        let data = Bytes::from(call.abi_encode());

        let hash = {
            let _guard = self.send_lock.lock().await;

            let chain_id = self.chain_id().await?;
            let from = wallet.address();

            let estimate = self
                .provider
                .estimate_gas(&CallRequest {
                    from: Some(from),
                    to,
                    data: data.clone(),
                    value: None,
                })
                .await?;

            let tx = TransactionRequest {
                to,
                data,
                value: U256::ZERO,
                nonce: self.provider.transaction_count(from).await?,
                gas_price: self.provider.gas_price().await?,
                gas_limit: estimate.saturating_mul(GAS_MARGIN_NUMERATOR) / GAS_MARGIN_DENOMINATOR,
            };

            let signed = wallet.sign_transaction(&tx, chain_id)?;
            let hash = self.provider.send_raw_transaction(&signed.raw).await?;

            tracing::info!(
                tx = %hash,
                to = %to,
                nonce = tx.nonce,
                gas_limit = tx.gas_limit,
                "transaction submitted"
            );
            hash
        };

        let receipt = self
            .provider
            .wait_for_receipt(hash, self.poll_interval, self.confirmation_timeout)
            .await?;

        if !receipt.succeeded() {
            tracing::warn!(tx = %hash, "transaction reverted on chain");
            return Err(VaultlineError::TransactionFailed {
                tx_hash: hash.to_string(),
            });
        }

        Ok(TxOutcome::from_receipt(receipt))
    }
}
