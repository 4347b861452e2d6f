//! tflog - transaction log records
//!
//! tflog reads and writes the records of an append-only transaction log in
//! two on-disk families: the classic prepare/commit/system records and the
//! unified fixed-header records.
//!
//! # Quick Start
//!
//! ```
//! use tflog::{CodecConfig, LogRecord, MemoryLog, PrepareLogRecord, RecordSource};
//!
//! let log = MemoryLog::new(CodecConfig::default())?;
//! let record: LogRecord = PrepareLogRecord::single_write(0, "orders-1", "OrderPlaced", b"{}".to_vec())
//!     .build()?
//!     .into();
//! let appended = log.append(record)?;
//!
//! assert_eq!(log.read_at(0)?, appended.record);
//! # Ok::<(), tflog::Error>(())
//! ```
//!
//! # Architecture
//!
//! - `tflog-core`: identifiers, timestamps, limits and the error type
//! - `tflog-durability`: record formats, transactions and epoch chains

pub use tflog_core::{Error, ExpectedVersion, Limits, RecordId, Result, Timestamp};
pub use tflog_durability::*;
