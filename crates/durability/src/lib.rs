//! Transaction log records for tflog
//!
//! This crate handles everything that touches log bytes:
//!
//! - Framing: length prefix/suffix around every record
//! - Record codecs for the classic (prepare/commit/system) and unified families
//! - Zero-copy prepare views for scans
//! - Transaction boundaries and prepare/commit resolution
//! - Epoch records and epoch chain validation
//! - An in-memory log for scans, retries and epoch walks

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config; // Codec configuration (family, record size, epoch walk)
pub mod epoch_chain; // Epoch chain loading and follower validation
pub mod format; // Binary record formats of both families
pub mod memory_log; // In-memory framed log
pub mod source; // Positioned record access
pub mod transaction; // Transaction boundaries and resolution

// === Re-exports ===
pub use config::{CodecConfig, ConfigError};
pub use epoch_chain::{validate_epoch_chain, EpochChain, EpochChainMismatch};
pub use format::{
    append_epoch, decode_epoch, CommitLogRecord, EpochRecord, LogRecord, LogRecordKind,
    PrepareFlags, PrepareLogRecord, PrepareRecord, PrepareRecordView, Record, RecordFamily,
    StreamWriteRecord, SystemLogRecord,
};
pub use memory_log::{AppendOutcome, Appended, BackwardScan, ForwardScan, MemoryLog};
pub use source::RecordSource;
pub use transaction::{
    is_transaction_boundary, resolve_transactions, ResolvedTransaction, ResolverStats,
    TransactionResolver,
};
