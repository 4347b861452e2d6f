//! Size limits for log records
//!
//! The maximum record size is the one knob the codec needs from its
//! configuration. A record that exceeds it is treated as corruption, never as
//! a legitimate large record: a bit flip in a length field must not turn into
//! a multi-gigabyte allocation.

use crate::error::{Error, Result};

/// Default maximum log record size (16MB)
pub const MAX_LOG_RECORD_SIZE: usize = 16 * 1024 * 1024;

/// Size limits for log records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum record size in bytes, excluding framing (default: 16MB)
    pub max_record_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_record_size: MAX_LOG_RECORD_SIZE,
        }
    }
}

impl Limits {
    /// Create limits with a small maximum for testing
    pub fn with_small_limits() -> Self {
        Limits {
            max_record_size: 4096,
        }
    }

    /// Create limits with an explicit maximum record size
    pub fn with_max_record_size(max_record_size: usize) -> Self {
        Limits { max_record_size }
    }

    /// Validate a declared or computed record size
    pub fn check_record_size(&self, size: usize, log_position: i64) -> Result<()> {
        if size > self.max_record_size {
            return Err(Error::RecordTooLarge {
                log_position,
                size,
                max: self.max_record_size,
            });
        }
        Ok(())
    }
}
