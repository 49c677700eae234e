//! Time unit conversions between the SDK surface and contract storage.
//!
//! Contracts store timestamps and intervals as whole seconds (`uint64`).
//! The SDK exposes `chrono` values and millisecond helpers.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::error::{Result, VaultlineError};

/// Seconds to milliseconds, saturating on overflow
pub fn secs_to_millis(secs: u64) -> u64 {
    secs.saturating_mul(1_000)
}

/// Milliseconds to whole seconds (truncating)
pub fn millis_to_secs(millis: u64) -> u64 {
    millis / 1_000
}

/// Convert a point in time to the on-chain seconds representation
pub fn to_chain_timestamp(at: DateTime<Utc>) -> Result<u64> {
    u64::try_from(at.timestamp()).map_err(|_| {
        VaultlineError::InvalidArgument(format!("timestamp before unix epoch: {}", at))
    })
}

/// Convert on-chain seconds back to a point in time. Zero means "unset".
pub fn from_chain_timestamp(secs: u64) -> Option<DateTime<Utc>> {
    if secs == 0 {
        return None;
    }
    let secs = i64::try_from(secs).ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

/// Convert an interval to on-chain seconds. It must be a whole number of
/// seconds and at least one.
pub fn duration_to_chain_secs(interval: Duration) -> Result<u64> {
    let secs = interval.num_seconds();
    if secs <= 0 {
        return Err(VaultlineError::InvalidArgument(format!(
            "interval must be at least one second, got {}ms",
            interval.num_milliseconds()
        )));
    }
    if Duration::seconds(secs) != interval {
        return Err(VaultlineError::InvalidArgument(format!(
            "interval must be a whole number of seconds, got {}ms",
            interval.num_milliseconds()
        )));
    }
    Ok(secs as u64)
}

/// Convert on-chain seconds to an interval. Zero means "unset"; values
/// beyond what `chrono` can represent are an invalid response.
pub fn chain_secs_to_duration(secs: u64) -> Result<Option<Duration>> {
    if secs == 0 {
        return Ok(None);
    }
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .map(Some)
        .ok_or_else(|| {
            VaultlineError::InvalidResponse(format!("interval of {} seconds is out of range", secs))
        })
}
