//! Per-contract service handles
//!
//! Each service borrows the client and exposes the contract's operations
//! in domain types. Obtain them through `VaultlineClient::vaults()` and
//! friends.

mod ai_vault;
mod attestation;
mod timelock;
mod vault;

pub use ai_vault::AiVaultService;
pub use attestation::AttestationService;
pub use timelock::TimeLockService;
pub use vault::VaultService;

use vaultline_core::{Cid, Result, VaultlineError};

/// CID as stored on chain. Contracts use the empty string for "unset".
pub(crate) fn cid_from_chain(raw: String) -> Result<Option<Cid>> {
    if raw.is_empty() {
        return Ok(None);
    }
    Cid::new(raw)
        .map(Some)
        .map_err(|e| VaultlineError::InvalidResponse(e.to_string()))
}
