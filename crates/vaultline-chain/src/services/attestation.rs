use alloy_primitives::{Address, B256, U256};
use std::time::Duration;
use vaultline_core::{
    units, Attestation, AttestationStatus, Cid, RequestId, Result, VaultId, VaultlineError,
};

use crate::client::{TxOutcome, VaultlineClient};
use crate::contracts::{ContractKind, IAttestationHub};

/// Attestation hub operations
pub struct AttestationService<'a> {
    client: &'a VaultlineClient,
}

impl<'a> AttestationService<'a> {
    pub(crate) fn new(client: &'a VaultlineClient) -> Self {
        Self { client }
    }

    fn address(&self) -> Result<Address> {
        self.client.contract_address(ContractKind::AttestationHub)
    }

    /// Ask the oracle network to attest `condition` for a vault.
    /// Only the Keccak-256 of the condition text goes on chain.
    pub async fn request_attestation(
        &self,
        vault_id: VaultId,
        condition: &str,
        evidence_cid: &Cid,
    ) -> Result<(RequestId, TxOutcome)> {
        if condition.trim().is_empty() {
            return Err(VaultlineError::InvalidArgument(
                "attestation condition is empty".to_string(),
            ));
        }

        let address = self.address()?;
        let call = IAttestationHub::requestAttestationCall {
            vaultId: vault_id,
            conditionHash: B256::from(vaultline_crypto::keccak_digest(condition.as_bytes())),
            evidenceCid: evidence_cid.as_str().to_string(),
        };

        let outcome = self.client.send(address, &call).await?;
        let event = outcome
            .find_event::<IAttestationHub::AttestationRequested>(address)
            .ok_or_else(|| {
                VaultlineError::InvalidResponse(format!(
                    "transaction {} emitted no AttestationRequested event",
                    outcome.tx_hash
                ))
            })?;

        tracing::info!(
            vault_id = %vault_id,
            request_id = %event.requestId,
            tx = %outcome.tx_hash,
            "attestation requested"
        );
        Ok((event.requestId, outcome))
    }

    pub async fn get_attestation(&self, request_id: RequestId) -> Result<Attestation> {
        tracing::debug!(request_id = %request_id, "fetching attestation");
        let ret = self
            .client
            .call(
                self.address()?,
                &IAttestationHub::getAttestationCall { requestId: request_id },
            )
            .await?;

        // Vault ids start at 1; an all-zero record is an unknown request
        if ret.vaultId == U256::ZERO {
            return Err(VaultlineError::NotFound(format!("attestation {}", request_id)));
        }

        Ok(Attestation {
            request_id,
            vault_id: ret.vaultId,
            status: AttestationStatus::try_from(ret.status)?,
            approvals: ret.approvals,
            rejections: ret.rejections,
            threshold: ret.threshold,
            finalized_at: units::from_chain_timestamp(ret.finalizedAt),
        })
    }

    /// Most recent request for a vault, if any
    pub async fn latest_for_vault(&self, vault_id: VaultId) -> Result<Option<RequestId>> {
        let ret = self
            .client
            .call(
                self.address()?,
                &IAttestationHub::latestAttestationCall { vaultId: vault_id },
            )
            .await?;
        Ok((ret.requestId != U256::ZERO).then_some(ret.requestId))
    }

    /// Poll until the attestation leaves `Pending` or `timeout` elapses
    pub async fn wait_for_final(
        &self,
        request_id: RequestId,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<Attestation> {
        let poll = async {
            loop {
                let attestation = self.get_attestation(request_id).await?;
                if attestation.status.is_final() {
                    tracing::info!(
                        request_id = %request_id,
                        status = ?attestation.status,
                        "attestation finalized"
                    );
                    return Ok::<_, VaultlineError>(attestation);
                }
                tokio::time::sleep(poll_interval).await;
            }
        };

        tokio::time::timeout(timeout, poll).await.map_err(|_| {
            VaultlineError::Timeout(format!(
                "attestation {} still pending after {:?}",
                request_id, timeout
            ))
        })?
    }
}
