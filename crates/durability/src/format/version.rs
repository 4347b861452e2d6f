//! Record versions and the 32/64-bit sentinel mapping.
//!
//! Version 0 records store expected versions and event numbers as `i32`;
//! version 1 records store them as `i64`. The log is 64-bit internally, so
//! decoding a V0 record widens its 32-bit sentinels to the 64-bit ones and
//! encoding to V0 narrows them back. Both directions must be exact or legacy
//! clients see a different stream state than the log holds.

use tflog_core::expected_version::{DELETED_STREAM, TOMBSTONE_EXPECTED_VERSION};
use tflog_core::{Error, Result};

/// Legacy version with 32-bit event numbers
pub const LOG_RECORD_V0: u8 = 0;

/// Current classic version with 64-bit event numbers
pub const LOG_RECORD_V1: u8 = 1;

/// 32-bit tombstone event number
pub const DELETED_STREAM_V0: i32 = i32::MAX;

/// 32-bit tombstone expected version
pub const TOMBSTONE_EXPECTED_VERSION_V0: i32 = i32::MAX - 1;

/// Widen a V0 prepare expected version.
#[inline]
pub fn expected_version_from_v0(raw: i32) -> i64 {
    if raw == TOMBSTONE_EXPECTED_VERSION_V0 {
        TOMBSTONE_EXPECTED_VERSION
    } else {
        i64::from(raw)
    }
}

/// Narrow a prepare expected version for a V0 record.
pub fn expected_version_to_v0(value: i64) -> Result<i32> {
    if value == TOMBSTONE_EXPECTED_VERSION {
        return Ok(TOMBSTONE_EXPECTED_VERSION_V0);
    }
    i32::try_from(value).map_err(|_| {
        Error::InvalidArgument(format!(
            "expected version {} does not fit a version 0 record",
            value
        ))
    })
}

/// Widen a V0 commit first event number.
#[inline]
pub fn event_number_from_v0(raw: i32) -> i64 {
    if raw == DELETED_STREAM_V0 {
        DELETED_STREAM
    } else {
        i64::from(raw)
    }
}

/// Narrow a commit first event number for a V0 record.
pub fn event_number_to_v0(value: i64) -> Result<i32> {
    if value == DELETED_STREAM {
        return Ok(DELETED_STREAM_V0);
    }
    i32::try_from(value).map_err(|_| {
        Error::InvalidArgument(format!(
            "event number {} does not fit a version 0 record",
            value
        ))
    })
}

/// Check a classic prepare/commit version byte.
pub fn ensure_classic_version(kind: &'static str, version: u8, log_position: i64) -> Result<()> {
    match version {
        LOG_RECORD_V0 | LOG_RECORD_V1 => Ok(()),
        _ => Err(Error::UnsupportedVersion {
            kind,
            version,
            log_position,
        }),
    }
}
