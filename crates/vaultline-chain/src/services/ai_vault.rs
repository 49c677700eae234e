use alloy_primitives::Address;
use vaultline_core::{
    units, AiRecommendation, AiVaultState, Cid, Result, VaultId, VaultlineError, MAX_RISK_BPS,
};

use super::cid_from_chain;
use crate::client::{TxOutcome, VaultlineClient};
use crate::contracts::{ContractKind, IAIVaultManager};

/// AI-vault manager operations
pub struct AiVaultService<'a> {
    client: &'a VaultlineClient,
}

impl<'a> AiVaultService<'a> {
    pub(crate) fn new(client: &'a VaultlineClient) -> Self {
        Self { client }
    }

    fn address(&self) -> Result<Address> {
        self.client.contract_address(ContractKind::AiVaultManager)
    }

    /// Attach an AI guardian. `risk_threshold` is in basis points.
    pub async fn enable_guardian(
        &self,
        vault_id: VaultId,
        model_cid: &Cid,
        risk_threshold: u16,
    ) -> Result<TxOutcome> {
        if risk_threshold > MAX_RISK_BPS {
            return Err(VaultlineError::InvalidArgument(format!(
                "risk threshold {} exceeds {} basis points",
                risk_threshold, MAX_RISK_BPS
            )));
        }

        let call = IAIVaultManager::enableAIGuardianCall {
            vaultId: vault_id,
            modelCid: model_cid.as_str().to_string(),
            riskThreshold: risk_threshold,
        };
        let outcome = self.client.send(self.address()?, &call).await?;
        tracing::info!(
            vault_id = %vault_id,
            model = %model_cid,
            risk_threshold,
            tx = %outcome.tx_hash,
            "AI guardian enabled"
        );
        Ok(outcome)
    }

    /// Ask the guardian to re-score the vault. The result lands
    /// asynchronously as an `AIStateUpdated` event.
    pub async fn request_evaluation(&self, vault_id: VaultId) -> Result<TxOutcome> {
        let call = IAIVaultManager::requestEvaluationCall { vaultId: vault_id };
        let outcome = self.client.send(self.address()?, &call).await?;
        tracing::info!(vault_id = %vault_id, tx = %outcome.tx_hash, "AI evaluation requested");
        Ok(outcome)
    }

    pub async fn get_state(&self, vault_id: VaultId) -> Result<AiVaultState> {
        tracing::debug!(vault_id = %vault_id, "fetching AI state");
        let ret = self
            .client
            .call(self.address()?, &IAIVaultManager::getAIStateCall { vaultId: vault_id })
            .await?;

        if ret.riskScore > MAX_RISK_BPS || ret.riskThreshold > MAX_RISK_BPS {
            return Err(VaultlineError::InvalidResponse(format!(
                "risk values out of range: score {}, threshold {}",
                ret.riskScore, ret.riskThreshold
            )));
        }

        Ok(AiVaultState {
            vault_id,
            enabled: ret.enabled,
            risk_score: ret.riskScore,
            risk_threshold: ret.riskThreshold,
            recommendation: AiRecommendation::try_from(ret.recommendation)?,
            last_evaluated: units::from_chain_timestamp(ret.lastEvaluated),
            model_cid: cid_from_chain(ret.modelCid)?,
            encrypted_state_handle: ret.encryptedStateHandle,
        })
    }
}
