//! # Contract Definitions
//!
//! ABIs of the deployed vault contracts, declared with alloy's `sol!` macro.
//! These are external, immutable collaborators: the SDK only encodes calls
//! and decodes their results and events.

use alloy_primitives::Address;
use alloy_sol_types::sol;
use vaultline_core::{ContractAddresses, Result, VaultlineError};

sol! {
    /// Creates and tracks vault records.
    #[derive(Debug)]
    interface IVaultFactory {
        event VaultCreated(uint256 indexed vaultId, address indexed owner, string cid);
        event VaultUpdated(uint256 indexed vaultId, string cid);
        event VaultDeactivated(uint256 indexed vaultId);

        function createVault(string cid) external returns (uint256 vaultId);
        function updateVault(uint256 vaultId, string cid) external;
        function deactivateVault(uint256 vaultId) external;

        function getVault(uint256 vaultId) external view returns (
            address owner,
            string cid,
            bool active,
            uint64 createdAt
        );
        function getVaultsByOwner(address owner) external view returns (uint256[] vaultIds);
        function vaultCount() external view returns (uint256 count);
    }
}

sol! {
    /// Scheduled, deadman and hybrid release policies.
    #[derive(Debug)]
    interface ITimeLockManager {
        event ReleaseConfigured(
            uint256 indexed vaultId,
            uint8 releaseType,
            uint64 releaseTime,
            uint64 checkInInterval
        );
        event CheckedIn(uint256 indexed vaultId, uint64 timestamp);
        event VaultReleased(uint256 indexed vaultId, uint64 timestamp);

        function configureRelease(
            uint256 vaultId,
            uint8 releaseType,
            uint64 releaseTime,
            uint64 checkInInterval
        ) external;
        function checkIn(uint256 vaultId) external;
        function triggerRelease(uint256 vaultId) external;

        function getTimeLock(uint256 vaultId) external view returns (
            uint8 releaseType,
            uint64 releaseTime,
            uint64 checkInInterval,
            uint64 lastCheckIn,
            bool released
        );
        function isReleasable(uint256 vaultId) external view returns (bool releasable);
    }
}

sol! {
    /// Oracle-network consensus on release conditions.
    #[derive(Debug)]
    interface IAttestationHub {
        event AttestationRequested(
            uint256 indexed requestId,
            uint256 indexed vaultId,
            bytes32 conditionHash
        );
        event AttestationFinalized(
            uint256 indexed requestId,
            bool approved,
            uint32 approvals,
            uint32 rejections
        );

        function requestAttestation(
            uint256 vaultId,
            bytes32 conditionHash,
            string evidenceCid
        ) external returns (uint256 requestId);

        function getAttestation(uint256 requestId) external view returns (
            uint256 vaultId,
            uint8 status,
            uint32 approvals,
            uint32 rejections,
            uint32 threshold,
            uint64 finalizedAt
        );
        function latestAttestation(uint256 vaultId) external view returns (uint256 requestId);
    }
}

sol! {
    /// AI guardian scoring over FHE-encrypted state.
    #[derive(Debug)]
    interface IAIVaultManager {
        event AIStateUpdated(uint256 indexed vaultId, uint16 riskScore, uint8 recommendation);

        function enableAIGuardian(uint256 vaultId, string modelCid, uint16 riskThreshold) external;
        function requestEvaluation(uint256 vaultId) external;

        function getAIState(uint256 vaultId) external view returns (
            bool enabled,
            uint16 riskScore,
            uint16 riskThreshold,
            uint8 recommendation,
            uint64 lastEvaluated,
            string modelCid,
            bytes32 encryptedStateHandle
        );
    }
}

/// The four contracts the SDK talks to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContractKind {
    VaultFactory,
    TimeLockManager,
    AttestationHub,
    AiVaultManager,
}

impl ContractKind {
    pub fn name(self) -> &'static str {
        match self {
            ContractKind::VaultFactory => "vault_factory",
            ContractKind::TimeLockManager => "time_lock_manager",
            ContractKind::AttestationHub => "attestation_hub",
            ContractKind::AiVaultManager => "ai_vault_manager",
        }
    }

    /// Configured address, rejecting the zero placeholder
    pub fn address_in(self, contracts: &ContractAddresses) -> Result<Address> {
        let address = match self {
            ContractKind::VaultFactory => contracts.vault_factory,
            ContractKind::TimeLockManager => contracts.time_lock_manager,
            ContractKind::AttestationHub => contracts.attestation_hub,
            ContractKind::AiVaultManager => contracts.ai_vault_manager,
        };
        if address.is_zero() {
            return Err(VaultlineError::ContractNotConfigured(self.name()));
        }
        Ok(address)
    }
}
