//! # Vaultline Chain
//!
//! Client side of the Vaultline contracts over Ethereum JSON-RPC.
//!
//! - `rpc`: transport seam (`HttpTransport`, `MockTransport`)
//! - `provider`: typed `eth_*` calls
//! - `wallet`: local secp256k1 signing
//! - `client`: `VaultlineClient`, the connection and account factory
//! - `services`: vault, time-lock, attestation and AI-vault operations
//! - `events`: WebSocket log subscription with broadcast fan-out
//! - `cross_chain`: in-memory cross-chain message placeholder
//!
//! ```ignore
//! let config = SdkConfig::load(Some(Path::new("vaultline.toml")))?;
//! let client = VaultlineClient::connect(&config)?
//!     .with_wallet(Wallet::from_private_key(&key)?);
//!
//! let (vault_id, _) = client.vaults().create_vault(&cid).await?;
//! client.time_locks().configure_release(vault_id, &policy).await?;
//! ```

pub mod client;
pub mod contracts;
pub mod cross_chain;
pub mod events;
pub mod provider;
pub mod rpc;
pub mod services;
pub mod wallet;

pub use client::{TxOutcome, VaultlineClient};
pub use contracts::ContractKind;
pub use cross_chain::{CrossChainMessage, CrossChainRelay, MessageId, MessageStatus, RelayStats};
pub use events::{decode_log, EventFilter, EventStream, VaultEvent};
pub use provider::{CallRequest, Log, Provider, TransactionReceipt};
pub use rpc::{HttpTransport, MockTransport, Transport};
pub use services::{AiVaultService, AttestationService, TimeLockService, VaultService};
pub use wallet::{hash_message, recover_address, SignedTransaction, TransactionRequest, Wallet};
