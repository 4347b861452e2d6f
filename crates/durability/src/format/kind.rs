//! Record kind registry.
//!
//! | Byte | Kind | Family |
//! |------|------|--------|
//! | 0 | Prepare | classic |
//! | 1 | Commit | classic |
//! | 2 | System | both (classic system record, unified epoch) |
//! | 3 | PartitionType | unified |
//! | 4 | StreamType | unified |
//! | 5 | Stream | unified |
//! | 6 | Partition | unified |
//! | 7 | StreamWrite | unified |
//! | 8 | EventType | unified |
//! | 9 | ContentType | unified |
//! | 10 | TransactionStart | unified |
//! | 11 | TransactionEnd | unified |

use tflog_core::{Error, Result};

/// Kind byte at offset 0 of every record
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogRecordKind {
    /// Event data, part of a write
    Prepare = 0,
    /// Commit of an explicit transaction
    Commit = 1,
    /// System record (epochs)
    System = 2,
    /// Partition type definition
    PartitionType = 3,
    /// Stream type definition
    StreamType = 4,
    /// Stream definition
    Stream = 5,
    /// Partition definition
    Partition = 6,
    /// Write of one or more events to a stream
    StreamWrite = 7,
    /// Event type definition
    EventType = 8,
    /// Content type definition
    ContentType = 9,
    /// Start of an explicit transaction
    TransactionStart = 10,
    /// End of an explicit transaction
    TransactionEnd = 11,
}

impl LogRecordKind {
    /// Parse a kind byte.
    pub fn from_byte(byte: u8, log_position: i64) -> Result<Self> {
        Ok(match byte {
            0 => LogRecordKind::Prepare,
            1 => LogRecordKind::Commit,
            2 => LogRecordKind::System,
            3 => LogRecordKind::PartitionType,
            4 => LogRecordKind::StreamType,
            5 => LogRecordKind::Stream,
            6 => LogRecordKind::Partition,
            7 => LogRecordKind::StreamWrite,
            8 => LogRecordKind::EventType,
            9 => LogRecordKind::ContentType,
            10 => LogRecordKind::TransactionStart,
            11 => LogRecordKind::TransactionEnd,
            other => {
                return Err(Error::InvalidRecordKind {
                    kind: other,
                    log_position,
                })
            }
        })
    }

    /// Kind byte
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Name used in error messages
    pub fn name(self) -> &'static str {
        match self {
            LogRecordKind::Prepare => "Prepare",
            LogRecordKind::Commit => "Commit",
            LogRecordKind::System => "System",
            LogRecordKind::PartitionType => "PartitionType",
            LogRecordKind::StreamType => "StreamType",
            LogRecordKind::Stream => "Stream",
            LogRecordKind::Partition => "Partition",
            LogRecordKind::StreamWrite => "StreamWrite",
            LogRecordKind::EventType => "EventType",
            LogRecordKind::ContentType => "ContentType",
            LogRecordKind::TransactionStart => "TransactionStart",
            LogRecordKind::TransactionEnd => "TransactionEnd",
        }
    }
}

impl std::fmt::Display for LogRecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
