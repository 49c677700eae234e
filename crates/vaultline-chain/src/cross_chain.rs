//! # Cross-chain messaging placeholder
//!
//! Tracks vault messages destined for other chains entirely in memory.
//! Nothing is relayed anywhere: callers drive the lifecycle by hand
//! (`mark_relayed`, `confirm_delivery`, `mark_failed`). Useful for local
//! development and for exercising code paths that will later sit on a real
//! bridge.

use alloy_primitives::{keccak256, B256};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use vaultline_core::{Result, VaultId, VaultlineError};

/// Keccak-256 message identifier
pub type MessageId = B256;

/// Lifecycle of a cross-chain message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Relayed,
    Delivered,
    Failed(String),
}

impl MessageStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageStatus::Delivered | MessageStatus::Failed(_))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrossChainMessage {
    pub id: MessageId,
    pub nonce: u64,
    pub source_chain: u64,
    pub dest_chain: u64,
    pub vault_id: VaultId,
    pub payload: Vec<u8>,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Counters over the relay's lifetime
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub sent: u64,
    pub delivered: u64,
    pub failed: u64,
}

/// In-memory stand-in for a cross-chain bridge
pub struct CrossChainRelay {
    source_chain: u64,
    messages: RwLock<HashMap<MessageId, CrossChainMessage>>,
    nonce: AtomicU64,
    stats: RwLock<RelayStats>,
}

impl CrossChainRelay {
    pub fn new(source_chain: u64) -> Self {
        tracing::warn!(
            source_chain,
            "CrossChainRelay is an in-memory placeholder; messages are not relayed"
        );
        Self {
            source_chain,
            messages: RwLock::new(HashMap::new()),
            nonce: AtomicU64::new(0),
            stats: RwLock::new(RelayStats::default()),
        }
    }

    pub fn source_chain(&self) -> u64 {
        self.source_chain
    }

    fn message_id(&self, dest_chain: u64, vault_id: VaultId, payload: &[u8], nonce: u64) -> MessageId {
        let mut preimage = Vec::with_capacity(8 + 8 + 32 + payload.len() + 8);
        preimage.extend_from_slice(&self.source_chain.to_be_bytes());
        preimage.extend_from_slice(&dest_chain.to_be_bytes());
        preimage.extend_from_slice(&vault_id.to_be_bytes::<32>());
        preimage.extend_from_slice(payload);
        preimage.extend_from_slice(&nonce.to_be_bytes());
        keccak256(preimage)
    }

    /// Queue a message for `dest_chain`
    pub fn send_message(&self, dest_chain: u64, vault_id: VaultId, payload: Vec<u8>) -> Result<MessageId> {
        if dest_chain == self.source_chain {
            return Err(VaultlineError::InvalidArgument(format!(
                "destination chain {} is the source chain",
                dest_chain
            )));
        }
        if payload.is_empty() {
            return Err(VaultlineError::InvalidArgument(
                "cross-chain payload is empty".to_string(),
            ));
        }

        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let id = self.message_id(dest_chain, vault_id, &payload, nonce);
        let now = Utc::now();

        self.messages.write().insert(
            id,
            CrossChainMessage {
                id,
                nonce,
                source_chain: self.source_chain,
                dest_chain,
                vault_id,
                payload,
                status: MessageStatus::Pending,
                created_at: now,
                updated_at: now,
            },
        );
        self.stats.write().sent += 1;

        tracing::debug!(message = %id, dest_chain, vault_id = %vault_id, "cross-chain message queued");
        Ok(id)
    }

    pub fn get_message(&self, id: &MessageId) -> Option<CrossChainMessage> {
        self.messages.read().get(id).cloned()
    }

    /// Messages not yet delivered or failed, oldest first
    pub fn pending_messages(&self) -> Vec<CrossChainMessage> {
        let mut pending: Vec<_> = self
            .messages
            .read()
            .values()
            .filter(|m| !m.status.is_terminal())
            .cloned()
            .collect();
        pending.sort_by_key(|m| m.nonce);
        pending
    }

    fn transition(
        &self,
        id: &MessageId,
        allowed: impl Fn(&MessageStatus) -> bool,
        next: MessageStatus,
    ) -> Result<()> {
        let mut messages = self.messages.write();
        let message = messages
            .get_mut(id)
            .ok_or_else(|| VaultlineError::NotFound(format!("cross-chain message {}", id)))?;

        if !allowed(&message.status) {
            return Err(VaultlineError::InvalidArgument(format!(
                "message {} cannot move from {:?} to {:?}",
                id, message.status, next
            )));
        }

        tracing::debug!(message = %id, from = ?message.status, to = ?next, "message status changed");
        message.status = next;
        message.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_relayed(&self, id: &MessageId) -> Result<()> {
        self.transition(id, |s| *s == MessageStatus::Pending, MessageStatus::Relayed)
    }

    pub fn confirm_delivery(&self, id: &MessageId) -> Result<()> {
        self.transition(
            id,
            |s| matches!(s, MessageStatus::Pending | MessageStatus::Relayed),
            MessageStatus::Delivered,
        )?;
        self.stats.write().delivered += 1;
        Ok(())
    }

    pub fn mark_failed(&self, id: &MessageId, reason: impl Into<String>) -> Result<()> {
        self.transition(
            id,
            |s| !s.is_terminal(),
            MessageStatus::Failed(reason.into()),
        )?;
        self.stats.write().failed += 1;
        Ok(())
    }

    /// Drop delivered messages, returning how many were removed
    pub fn prune_delivered(&self) -> usize {
        let mut messages = self.messages.write();
        let before = messages.len();
        messages.retain(|_, m| m.status != MessageStatus::Delivered);
        before - messages.len()
    }

    /// Drop delivered and failed messages, returning how many were removed
    pub fn prune_terminal(&self) -> usize {
        let mut messages = self.messages.write();
        let before = messages.len();
        messages.retain(|_, m| !m.status.is_terminal());
        let removed = before - messages.len();
        if removed > 0 {
            tracing::debug!(removed, "pruned finished cross-chain messages");
        }
        removed
    }

    pub fn stats(&self) -> RelayStats {
        self.stats.read().clone()
    }
}
