//! Domain types mirrored from the vault contracts

use alloy_primitives::{Address, B256, U256};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, VaultlineError};
use crate::units;

/// Vault identifier assigned by the factory contract
pub type VaultId = U256;

/// Attestation request identifier assigned by the hub contract
pub type RequestId = U256;

/// Content identifier returned by a storage provider. Opaque to the SDK.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cid(String);

impl Cid {
    /// Wrap a provider-issued identifier. Empty identifiers are rejected.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(VaultlineError::InvalidArgument("empty CID".to_string()));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Cid {
    type Error = VaultlineError;

    fn try_from(value: String) -> Result<Self> {
        Cid::new(value)
    }
}

impl From<Cid> for String {
    fn from(cid: Cid) -> Self {
        cid.0
    }
}

impl std::str::FromStr for Cid {
    type Err = VaultlineError;

    fn from_str(s: &str) -> Result<Self> {
        Cid::new(s)
    }
}

// ============================================================================
// Vaults
// ============================================================================

/// On-chain vault record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub id: VaultId,
    pub owner: Address,
    pub cid: Cid,
    pub active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Time locks
// ============================================================================

/// Unlock policy evaluated by the time-lock contract
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ReleaseType {
    /// Unlocks at a fixed time
    Scheduled = 0,
    /// Unlocks when the owner stops checking in
    Deadman = 1,
    /// Unlocks at whichever of the two fires first
    Hybrid = 2,
}

impl ReleaseType {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ReleaseType {
    type Error = VaultlineError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ReleaseType::Scheduled),
            1 => Ok(ReleaseType::Deadman),
            2 => Ok(ReleaseType::Hybrid),
            other => Err(VaultlineError::InvalidResponse(format!(
                "unknown release type {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReleaseType::Scheduled => write!(f, "scheduled"),
            ReleaseType::Deadman => write!(f, "deadman"),
            ReleaseType::Hybrid => write!(f, "hybrid"),
        }
    }
}

/// Release configuration as the caller expresses it
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReleasePolicy {
    Scheduled {
        release_at: DateTime<Utc>,
    },
    Deadman {
        check_in_interval: Duration,
    },
    Hybrid {
        release_at: DateTime<Utc>,
        check_in_interval: Duration,
    },
}

/// Arguments for `configureRelease`, in contract units
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReleaseArgs {
    pub release_type: ReleaseType,
    pub release_time: u64,
    pub check_in_interval: u64,
}

impl ReleasePolicy {
    pub fn release_type(&self) -> ReleaseType {
        match self {
            ReleasePolicy::Scheduled { .. } => ReleaseType::Scheduled,
            ReleasePolicy::Deadman { .. } => ReleaseType::Deadman,
            ReleasePolicy::Hybrid { .. } => ReleaseType::Hybrid,
        }
    }

    /// Validate against `now` and convert to contract arguments.
    /// Fields unused by the release type are sent as zero.
    pub fn to_chain_args(&self, now: DateTime<Utc>) -> Result<ReleaseArgs> {
        // The contract sees whole seconds, so compare at that precision
        let scheduled = |release_at: &DateTime<Utc>| -> Result<u64> {
            if release_at.timestamp() <= now.timestamp() {
                return Err(VaultlineError::InvalidArgument(format!(
                    "release time {} is not in the future",
                    release_at
                )));
            }
            units::to_chain_timestamp(*release_at)
        };

        let (release_time, check_in_interval) = match self {
            ReleasePolicy::Scheduled { release_at } => (scheduled(release_at)?, 0),
            ReleasePolicy::Deadman { check_in_interval } => {
                (0, units::duration_to_chain_secs(*check_in_interval)?)
            }
            ReleasePolicy::Hybrid {
                release_at,
                check_in_interval,
            } => (
                scheduled(release_at)?,
                units::duration_to_chain_secs(*check_in_interval)?,
            ),
        };

        Ok(ReleaseArgs {
            release_type: self.release_type(),
            release_time,
            check_in_interval,
        })
    }
}

/// Time-lock state read back from the contract
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeLock {
    pub vault_id: VaultId,
    pub release_type: ReleaseType,
    pub release_at: Option<DateTime<Utc>>,
    pub check_in_interval: Option<Duration>,
    pub last_check_in: Option<DateTime<Utc>>,
    pub released: bool,
}

impl TimeLock {
    /// Client-side estimate of when the contract will allow release.
    /// The contract remains the authority.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        let deadman = match (self.last_check_in, self.check_in_interval) {
            (Some(last), Some(interval)) => last.checked_add_signed(interval),
            _ => None,
        };

        match self.release_type {
            ReleaseType::Scheduled => self.release_at,
            ReleaseType::Deadman => deadman,
            ReleaseType::Hybrid => match (self.release_at, deadman) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            },
        }
    }

    /// Time left until `next_deadline`, zero once it has passed
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.next_deadline()
            .map(|deadline| (deadline - now).max(Duration::zero()))
    }
}

// ============================================================================
// Attestations
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AttestationStatus {
    Pending = 0,
    Approved = 1,
    Rejected = 2,
    Expired = 3,
}

impl AttestationStatus {
    pub fn is_final(self) -> bool {
        !matches!(self, AttestationStatus::Pending)
    }
}

impl TryFrom<u8> for AttestationStatus {
    type Error = VaultlineError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(AttestationStatus::Pending),
            1 => Ok(AttestationStatus::Approved),
            2 => Ok(AttestationStatus::Rejected),
            3 => Ok(AttestationStatus::Expired),
            other => Err(VaultlineError::InvalidResponse(format!(
                "unknown attestation status {}",
                other
            ))),
        }
    }
}

/// Oracle consensus result as recorded by the attestation hub
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attestation {
    pub request_id: RequestId,
    pub vault_id: VaultId,
    pub status: AttestationStatus,
    pub approvals: u32,
    pub rejections: u32,
    pub threshold: u32,
    pub finalized_at: Option<DateTime<Utc>>,
}

// ============================================================================
// AI vaults
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AiRecommendation {
    None = 0,
    Hold = 1,
    Release = 2,
    Escalate = 3,
}

impl TryFrom<u8> for AiRecommendation {
    type Error = VaultlineError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(AiRecommendation::None),
            1 => Ok(AiRecommendation::Hold),
            2 => Ok(AiRecommendation::Release),
            3 => Ok(AiRecommendation::Escalate),
            other => Err(VaultlineError::InvalidResponse(format!(
                "unknown AI recommendation {}",
                other
            ))),
        }
    }
}

/// Upper bound for risk scores and thresholds (basis points)
pub const MAX_RISK_BPS: u16 = 10_000;

/// AI guardian state held by the AI-vault manager
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AiVaultState {
    pub vault_id: VaultId,
    pub enabled: bool,
    /// Basis points, 0..=10_000
    pub risk_score: u16,
    pub risk_threshold: u16,
    pub recommendation: AiRecommendation,
    pub last_evaluated: Option<DateTime<Utc>>,
    pub model_cid: Option<Cid>,
    /// Opaque handle to the FHE-encrypted model state
    pub encrypted_state_handle: B256,
}

impl AiVaultState {
    pub fn exceeds_threshold(&self) -> bool {
        self.enabled && self.risk_score >= self.risk_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_cid_rejects_empty() {
        assert!(Cid::new("").is_err());
        assert!(Cid::new("   ").is_err());
        assert_eq!(Cid::new("bafy123").unwrap().as_str(), "bafy123");
    }

    #[test]
    fn test_cid_deserialize_validates() {
        let cid: Cid = serde_json::from_str("\"bafy123\"").unwrap();
        assert_eq!(cid.as_str(), "bafy123");
        assert_eq!(serde_json::to_string(&cid).unwrap(), "\"bafy123\"");

        assert!(serde_json::from_str::<Cid>("\"\"").is_err());
        assert!(serde_json::from_str::<Cid>("\"  \"").is_err());
    }

    #[test]
    fn test_release_type_from_u8() {
        assert_eq!(ReleaseType::try_from(2).unwrap(), ReleaseType::Hybrid);
        assert!(ReleaseType::try_from(7).is_err());
        assert_eq!(ReleaseType::Deadman.as_u8(), 1);
    }

    #[test]
    fn test_policy_chain_args() {
        let now = at(1_000);

        let args = ReleasePolicy::Scheduled { release_at: at(5_000) }
            .to_chain_args(now)
            .unwrap();
        assert_eq!(args.release_type, ReleaseType::Scheduled);
        assert_eq!(args.release_time, 5_000);
        assert_eq!(args.check_in_interval, 0);

        let args = ReleasePolicy::Deadman {
            check_in_interval: Duration::days(30),
        }
        .to_chain_args(now)
        .unwrap();
        assert_eq!(args.release_time, 0);
        assert_eq!(args.check_in_interval, 30 * 86_400);

        let args = ReleasePolicy::Hybrid {
            release_at: at(9_000),
            check_in_interval: Duration::hours(1),
        }
        .to_chain_args(now)
        .unwrap();
        assert_eq!(args.release_type, ReleaseType::Hybrid);
        assert_eq!((args.release_time, args.check_in_interval), (9_000, 3_600));
    }

    #[test]
    fn test_policy_rejects_past_and_zero() {
        let now = at(1_000);
        assert!(ReleasePolicy::Scheduled { release_at: at(1_000) }
            .to_chain_args(now)
            .is_err());
        assert!(ReleasePolicy::Deadman {
            check_in_interval: Duration::zero()
        }
        .to_chain_args(now)
        .is_err());
        assert!(ReleasePolicy::Deadman {
            check_in_interval: Duration::milliseconds(2_500)
        }
        .to_chain_args(now)
        .is_err());
    }

    #[test]
    fn test_release_within_the_current_second_rejected() {
        let now = at(1_000) + Duration::milliseconds(200);
        let same_second = at(1_000) + Duration::milliseconds(900);
        assert!(ReleasePolicy::Scheduled { release_at: same_second }
            .to_chain_args(now)
            .is_err());

        let args = ReleasePolicy::Scheduled { release_at: at(1_001) }
            .to_chain_args(now)
            .unwrap();
        assert_eq!(args.release_time, 1_001);
    }

    #[test]
    fn test_next_deadline() {
        let mut lock = TimeLock {
            vault_id: U256::from(1),
            release_type: ReleaseType::Deadman,
            release_at: Some(at(10_000)),
            check_in_interval: Some(Duration::seconds(500)),
            last_check_in: Some(at(2_000)),
            released: false,
        };
        assert_eq!(lock.next_deadline(), Some(at(2_500)));

        lock.release_type = ReleaseType::Scheduled;
        assert_eq!(lock.next_deadline(), Some(at(10_000)));

        lock.release_type = ReleaseType::Hybrid;
        assert_eq!(lock.next_deadline(), Some(at(2_500)));

        lock.last_check_in = None;
        assert_eq!(lock.next_deadline(), Some(at(10_000)));
    }

    #[test]
    fn test_time_remaining_saturates() {
        let lock = TimeLock {
            vault_id: U256::from(1),
            release_type: ReleaseType::Scheduled,
            release_at: Some(at(100)),
            check_in_interval: None,
            last_check_in: None,
            released: false,
        };
        assert_eq!(lock.time_remaining(at(40)), Some(Duration::seconds(60)));
        assert_eq!(lock.time_remaining(at(400)), Some(Duration::zero()));
    }

    #[test]
    fn test_attestation_status_final() {
        assert!(!AttestationStatus::Pending.is_final());
        assert!(AttestationStatus::Expired.is_final());
        assert!(AttestationStatus::try_from(9).is_err());
    }

    #[test]
    fn test_ai_threshold() {
        let mut state = AiVaultState {
            vault_id: U256::from(3),
            enabled: true,
            risk_score: 7_500,
            risk_threshold: 7_000,
            recommendation: AiRecommendation::Escalate,
            last_evaluated: None,
            model_cid: None,
            encrypted_state_handle: B256::ZERO,
        };
        assert!(state.exceeds_threshold());
        state.enabled = false;
        assert!(!state.exceeds_threshold());
    }
}
