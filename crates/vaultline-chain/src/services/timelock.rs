use alloy_primitives::Address;
use chrono::{Duration, Utc};
use vaultline_core::{units, ReleasePolicy, ReleaseType, Result, TimeLock, VaultId, VaultlineError};

use crate::client::{TxOutcome, VaultlineClient};
use crate::contracts::{ContractKind, ITimeLockManager};

/// Time-lock manager operations
pub struct TimeLockService<'a> {
    client: &'a VaultlineClient,
}

impl<'a> TimeLockService<'a> {
    pub(crate) fn new(client: &'a VaultlineClient) -> Self {
        Self { client }
    }

    fn address(&self) -> Result<Address> {
        self.client.contract_address(ContractKind::TimeLockManager)
    }

    /// Set the release policy. The policy is validated locally first, so a
    /// past release time never reaches the network.
    pub async fn configure_release(&self, vault_id: VaultId, policy: &ReleasePolicy) -> Result<TxOutcome> {
        let args = policy.to_chain_args(Utc::now())?;
        let call = ITimeLockManager::configureReleaseCall {
            vaultId: vault_id,
            releaseType: args.release_type.as_u8(),
            releaseTime: args.release_time,
            checkInInterval: args.check_in_interval,
        };

        let outcome = self.client.send(self.address()?, &call).await?;
        tracing::info!(
            vault_id = %vault_id,
            release_type = %args.release_type,
            release_time = args.release_time,
            check_in_interval = args.check_in_interval,
            tx = %outcome.tx_hash,
            "release configured"
        );
        Ok(outcome)
    }

    /// Owner liveness proof; pushes the deadman deadline forward
    pub async fn check_in(&self, vault_id: VaultId) -> Result<TxOutcome> {
        let call = ITimeLockManager::checkInCall { vaultId: vault_id };
        let outcome = self.client.send(self.address()?, &call).await?;
        tracing::info!(vault_id = %vault_id, tx = %outcome.tx_hash, "checked in");
        Ok(outcome)
    }

    pub async fn get_time_lock(&self, vault_id: VaultId) -> Result<TimeLock> {
        tracing::debug!(vault_id = %vault_id, "fetching time lock");
        let ret = self
            .client
            .call(self.address()?, &ITimeLockManager::getTimeLockCall { vaultId: vault_id })
            .await?;

        if ret.releaseTime == 0 && ret.checkInInterval == 0 && !ret.released {
            return Err(VaultlineError::NotFound(format!(
                "no release configured for vault {}",
                vault_id
            )));
        }

        Ok(TimeLock {
            vault_id,
            release_type: ReleaseType::try_from(ret.releaseType)?,
            release_at: units::from_chain_timestamp(ret.releaseTime),
            check_in_interval: units::chain_secs_to_duration(ret.checkInInterval)?,
            last_check_in: units::from_chain_timestamp(ret.lastCheckIn),
            released: ret.released,
        })
    }

    /// Whether the contract would accept `trigger_release` now
    pub async fn is_releasable(&self, vault_id: VaultId) -> Result<bool> {
        let ret = self
            .client
            .call(self.address()?, &ITimeLockManager::isReleasableCall { vaultId: vault_id })
            .await?;
        Ok(ret.releasable)
    }

    pub async fn trigger_release(&self, vault_id: VaultId) -> Result<TxOutcome> {
        let call = ITimeLockManager::triggerReleaseCall { vaultId: vault_id };
        let outcome = self.client.send(self.address()?, &call).await?;
        tracing::info!(vault_id = %vault_id, tx = %outcome.tx_hash, "release triggered");
        Ok(outcome)
    }

    /// Client-side estimate of the time left before release. Zero once
    /// released or past the deadline; `None` when no deadline can be derived
    /// (a deadman lock that has never been checked in).
    pub async fn time_until_release(&self, vault_id: VaultId) -> Result<Option<Duration>> {
        let lock = self.get_time_lock(vault_id).await?;
        if lock.released {
            return Ok(Some(Duration::zero()));
        }
        Ok(lock.time_remaining(Utc::now()))
    }
}
