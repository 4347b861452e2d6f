//! Tick-precision timestamp type
//!
//! ## Precision
//!
//! Timestamps are stored as ticks: 100-nanosecond intervals since
//! 0001-01-01 00:00:00 UTC. This is the representation written to disk by
//! every record kind, so it must round-trip exactly.
//!
//! ## Usage
//!
//! ```
//! use tflog_core::Timestamp;
//!
//! let now = Timestamp::now();
//! let from_ticks = Timestamp::from_ticks(638_000_000_000_000_000);
//! assert!(from_ticks.to_datetime().is_some());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ticks per second
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Ticks between 0001-01-01 and the Unix epoch
pub const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// Tick-precision timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// 0001-01-01 00:00:00 UTC
    pub const MIN: Timestamp = Timestamp(0);

    /// Unix epoch (1970-01-01 00:00:00 UTC)
    pub const UNIX_EPOCH: Timestamp = Timestamp(UNIX_EPOCH_TICKS);

    /// Create a timestamp for the current moment
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    /// Create a timestamp from raw ticks
    #[inline]
    pub const fn from_ticks(ticks: i64) -> Self {
        Timestamp(ticks)
    }

    /// Raw ticks
    #[inline]
    pub const fn ticks(&self) -> i64 {
        self.0
    }

    /// Convert from a chrono date time (sub-tick precision is truncated)
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let secs = dt.timestamp();
        let sub_ticks = i64::from(dt.timestamp_subsec_nanos()) / 100;
        let ticks = secs
            .saturating_mul(TICKS_PER_SECOND)
            .saturating_add(sub_ticks)
            .saturating_add(UNIX_EPOCH_TICKS);
        Timestamp(ticks)
    }

    /// Convert to a chrono date time
    ///
    /// Returns `None` when the tick value falls outside chrono's range.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let unix_ticks = self.0.checked_sub(UNIX_EPOCH_TICKS)?;
        let secs = unix_ticks.div_euclid(TICKS_PER_SECOND);
        let nanos = (unix_ticks.rem_euclid(TICKS_PER_SECOND) * 100) as u32;
        DateTime::from_timestamp(secs, nanos)
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Timestamp::MIN
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{} ticks", self.0),
        }
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Timestamp::from_datetime(dt)
    }
}
