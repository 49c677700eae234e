use alloy_primitives::Address;
use vaultline_core::{units, Cid, Result, Vault, VaultId, VaultlineError};

use super::cid_from_chain;
use crate::client::{TxOutcome, VaultlineClient};
use crate::contracts::{ContractKind, IVaultFactory};

/// Vault factory operations
pub struct VaultService<'a> {
    client: &'a VaultlineClient,
}

impl<'a> VaultService<'a> {
    pub(crate) fn new(client: &'a VaultlineClient) -> Self {
        Self { client }
    }

    fn address(&self) -> Result<Address> {
        self.client.contract_address(ContractKind::VaultFactory)
    }

    /// Record a new vault pointing at `cid`. The id comes from the
    /// `VaultCreated` event in the receipt.
    pub async fn create_vault(&self, cid: &Cid) -> Result<(VaultId, TxOutcome)> {
        let address = self.address()?;
        let call = IVaultFactory::createVaultCall {
            cid: cid.as_str().to_string(),
        };

        let outcome = self.client.send(address, &call).await?;
        let event = outcome
            .find_event::<IVaultFactory::VaultCreated>(address)
            .ok_or_else(|| {
                VaultlineError::InvalidResponse(format!(
                    "transaction {} emitted no VaultCreated event",
                    outcome.tx_hash
                ))
            })?;

        tracing::info!(vault_id = %event.vaultId, cid = %cid, tx = %outcome.tx_hash, "vault created");
        Ok((event.vaultId, outcome))
    }

    pub async fn get_vault(&self, id: VaultId) -> Result<Vault> {
        tracing::debug!(vault_id = %id, "fetching vault");
        let ret = self
            .client
            .call(self.address()?, &IVaultFactory::getVaultCall { vaultId: id })
            .await?;

        if ret.owner.is_zero() {
            return Err(VaultlineError::NotFound(format!("vault {}", id)));
        }

        let cid = cid_from_chain(ret.cid)?
            .ok_or_else(|| VaultlineError::InvalidResponse(format!("vault {} has no CID", id)))?;

        Ok(Vault {
            id,
            owner: ret.owner,
            cid,
            active: ret.active,
            created_at: units::from_chain_timestamp(ret.createdAt),
        })
    }

    /// Point the vault at new content. Only the owner may do this.
    pub async fn update_vault(&self, id: VaultId, cid: &Cid) -> Result<TxOutcome> {
        let call = IVaultFactory::updateVaultCall {
            vaultId: id,
            cid: cid.as_str().to_string(),
        };
        let outcome = self.client.send(self.address()?, &call).await?;
        tracing::info!(vault_id = %id, cid = %cid, tx = %outcome.tx_hash, "vault updated");
        Ok(outcome)
    }

    pub async fn deactivate_vault(&self, id: VaultId) -> Result<TxOutcome> {
        let call = IVaultFactory::deactivateVaultCall { vaultId: id };
        let outcome = self.client.send(self.address()?, &call).await?;
        tracing::info!(vault_id = %id, tx = %outcome.tx_hash, "vault deactivated");
        Ok(outcome)
    }

    /// Ids of every vault owned by `owner`
    pub async fn vaults_of(&self, owner: Address) -> Result<Vec<VaultId>> {
        tracing::debug!(owner = %owner, "listing vaults");
        let ret = self
            .client
            .call(self.address()?, &IVaultFactory::getVaultsByOwnerCall { owner })
            .await?;
        Ok(ret.vaultIds)
    }

    pub async fn vault_count(&self) -> Result<u64> {
        let ret = self
            .client
            .call(self.address()?, &IVaultFactory::vaultCountCall {})
            .await?;
        u64::try_from(ret.count)
            .map_err(|_| VaultlineError::InvalidResponse(format!("vault count {} overflows", ret.count)))
    }
}
