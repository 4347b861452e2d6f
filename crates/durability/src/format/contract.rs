//! Prepare contract shared by both record families.
//!
//! The write path and the transaction resolver only need to know what a
//! prepare says, not how it is laid out. Classic prepares name their stream
//! and event type with strings; unified stream writes refer to them by
//! number.

use crate::format::prepare::PrepareFlags;
use tflog_core::{Limits, RecordId, Result, Timestamp};

/// Stream a prepare writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamRef<'a> {
    /// Stream name (classic family)
    Name(&'a str),
    /// Stream number (unified family)
    Number(u32),
}

/// Event type of a prepare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTypeRef<'a> {
    /// Event type name (classic family)
    Name(&'a str),
    /// Event type number (unified family)
    Number(u32),
}

impl std::fmt::Display for StreamRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamRef::Name(name) => f.write_str(name),
            StreamRef::Number(n) => write!(f, "#{}", n),
        }
    }
}

impl std::fmt::Display for EventTypeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventTypeRef::Name(name) => f.write_str(name),
            EventTypeRef::Number(n) => write!(f, "#{}", n),
        }
    }
}

/// A record that prepares an event write.
pub trait PrepareRecord {
    /// Position of the record in the log
    fn log_position(&self) -> i64;

    /// Prepare flags
    fn flags(&self) -> PrepareFlags;

    /// Position of the first prepare of the transaction
    fn transaction_position(&self) -> i64;

    /// Offset within the transaction (-1 for none)
    fn transaction_offset(&self) -> i32;

    /// Expected version, or the final event number for committed prepares
    fn expected_version(&self) -> i64;

    /// Stream written to
    fn event_stream(&self) -> StreamRef<'_>;

    /// Event identifier
    fn event_id(&self) -> RecordId;

    /// Correlation identifier of the write
    fn correlation_id(&self) -> RecordId;

    /// Time the record was created
    fn timestamp(&self) -> Timestamp;

    /// Event type
    fn event_type_ref(&self) -> EventTypeRef<'_>;

    /// Event data as exposed to readers
    fn data(&self) -> &[u8];

    /// Event metadata
    fn metadata(&self) -> &[u8];

    /// Build an identical record for a new position after a failed append,
    /// checked against the `limits` of the log it is retried into.
    fn copy_for_retry(
        &self,
        log_position: i64,
        transaction_position: i64,
        limits: &Limits,
    ) -> Result<Self>
    where
        Self: Sized;
}
