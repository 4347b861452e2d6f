//! Positioned access to a log.

use crate::format::LogRecord;
use tflog_core::Result;

/// A log that records can be read from by position.
///
/// Positions are the byte offsets of framed records. Implementations decode
/// with the record family of the log they serve.
pub trait RecordSource {
    /// Decode the record starting at `log_position`.
    fn read_at(&self, log_position: i64) -> Result<LogRecord>;

    /// Decode the record ending at `log_position`.
    ///
    /// Returns the record with its start position, or `None` at the start
    /// of the log.
    fn read_prev(&self, log_position: i64) -> Result<Option<(i64, LogRecord)>>;

    /// Position the next record will be written at
    fn writer_checkpoint(&self) -> i64;
}
