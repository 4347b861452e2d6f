//! Core types for the transaction log
//!
//! This crate defines the foundational types shared by the record codec and
//! its callers:
//! - RecordId: 128-bit identifiers with on-disk GUID layout
//! - Timestamp: tick-precision timestamps
//! - ExpectedVersion: writer expectations and stream sentinels
//! - Limits: maximum record size
//! - Error: error taxonomy for decode and construction

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod expected_version;
pub mod limits;
pub mod timestamp;
pub mod types;

pub use error::{Error, Result};
pub use expected_version::ExpectedVersion;
pub use limits::{Limits, MAX_LOG_RECORD_SIZE};
pub use timestamp::Timestamp;
pub use types::{RecordId, RECORD_ID_SIZE};
