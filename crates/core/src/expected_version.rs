//! Expected-version contract shared with the write path
//!
//! A prepare records what the writer expected the stream's version to be.
//! Negative values are sentinels; non-negative values are exact revisions.
//! For prepares that are committed immediately the same field holds the
//! final event number, which is why the raw value is an `i64` on records.

use serde::{Deserialize, Serialize};

/// Any revision is acceptable
pub const ANY: i64 = -2;

/// The stream must not exist
pub const NO_STREAM: i64 = -1;

/// Not a valid expectation
pub const INVALID: i64 = -3;

/// The stream must exist
pub const STREAM_EXISTS: i64 = -4;

/// Event number of a stream tombstone
pub const DELETED_STREAM: i64 = i64::MAX;

/// Expected version written on a tombstone prepare
pub const TOMBSTONE_EXPECTED_VERSION: i64 = DELETED_STREAM - 1;

/// Writer expectation about a stream's current version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpectedVersion {
    /// Any revision is acceptable
    Any,
    /// The stream must not exist
    NoStream,
    /// The stream must exist
    StreamExists,
    /// The stream must be at exactly this revision
    Exact(u64),
}

impl ExpectedVersion {
    /// Raw value stored in records
    pub fn to_raw(self) -> i64 {
        match self {
            ExpectedVersion::Any => ANY,
            ExpectedVersion::NoStream => NO_STREAM,
            ExpectedVersion::StreamExists => STREAM_EXISTS,
            ExpectedVersion::Exact(n) => i64::try_from(n).unwrap_or(i64::MAX),
        }
    }

    /// Interpret a raw value; `None` for values with no meaning
    pub fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            ANY => Some(ExpectedVersion::Any),
            NO_STREAM => Some(ExpectedVersion::NoStream),
            STREAM_EXISTS => Some(ExpectedVersion::StreamExists),
            n if n >= 0 => Some(ExpectedVersion::Exact(n as u64)),
            _ => None,
        }
    }
}

impl From<ExpectedVersion> for i64 {
    fn from(v: ExpectedVersion) -> Self {
        v.to_raw()
    }
}
