//! Classic commit records.
//!
//! A commit makes the prepares of an explicit transaction visible. Its sort
//! key is the log position it was written at, which is what orders commits
//! for readers.
//!
//! # Layout (after the classic header)
//!
//! ```text
//! transaction_position:i64  first_event_number:i32 (V0) | i64 (V1)
//! sort_key:i64  correlation_id:16  timestamp:i64
//! ```

use crate::format::codec::{write_classic_header, write_record_id, FieldReader, CLASSIC_HEADER_SIZE};
use crate::format::framing::FRAMING_OVERHEAD;
use crate::format::kind::LogRecordKind;
use crate::format::version::{
    ensure_classic_version, event_number_from_v0, event_number_to_v0, LOG_RECORD_V0,
    LOG_RECORD_V1,
};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;
use tflog_core::{Error, RecordId, Result, Timestamp, RECORD_ID_SIZE};

/// Classic commit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitLogRecord {
    version: u8,
    log_position: i64,
    transaction_position: i64,
    first_event_number: i64,
    sort_key: i64,
    correlation_id: RecordId,
    timestamp: Timestamp,
}

impl CommitLogRecord {
    /// Create a commit at the current version.
    pub fn new(
        log_position: i64,
        correlation_id: RecordId,
        transaction_position: i64,
        timestamp: Timestamp,
        first_event_number: i64,
    ) -> Result<Self> {
        Self::with_version(
            LOG_RECORD_V1,
            log_position,
            correlation_id,
            transaction_position,
            timestamp,
            first_event_number,
        )
    }

    /// Create a commit at an explicit version.
    pub fn with_version(
        version: u8,
        log_position: i64,
        correlation_id: RecordId,
        transaction_position: i64,
        timestamp: Timestamp,
        first_event_number: i64,
    ) -> Result<Self> {
        ensure_classic_version("Commit", version, log_position)?;
        correlation_id.ensure_not_nil("correlation_id")?;
        if log_position < 0 {
            return Err(Error::InvalidArgument(format!(
                "log position {} is negative",
                log_position
            )));
        }
        if transaction_position < 0 {
            return Err(Error::InvalidArgument(format!(
                "transaction position {} is negative",
                transaction_position
            )));
        }
        if first_event_number < 0 {
            return Err(Error::InvalidArgument(format!(
                "first event number {} is negative",
                first_event_number
            )));
        }
        if version == LOG_RECORD_V0 {
            event_number_to_v0(first_event_number)?;
        }
        Ok(CommitLogRecord {
            version,
            log_position,
            transaction_position,
            first_event_number,
            sort_key: log_position,
            correlation_id,
            timestamp,
        })
    }

    /// Decode the body of a commit whose header has been read.
    pub fn decode(reader: &mut FieldReader<'_>, version: u8, log_position: i64) -> Result<Self> {
        ensure_classic_version("Commit", version, log_position)?;
        reader.set_log_position(log_position);

        let transaction_position = reader.read_i64("transaction_position")?;
        let first_event_number = if version == LOG_RECORD_V0 {
            event_number_from_v0(reader.read_i32("first_event_number")?)
        } else {
            reader.read_i64("first_event_number")?
        };
        let sort_key = reader.read_i64("sort_key")?;
        let correlation_id = reader.read_record_id("correlation_id")?;
        let timestamp = reader.read_timestamp("timestamp")?;

        correlation_id.ensure_not_nil("correlation_id")?;

        Ok(CommitLogRecord {
            version,
            log_position,
            transaction_position,
            first_event_number,
            sort_key,
            correlation_id,
            timestamp,
        })
    }

    /// Encode the record, header included, without framing.
    pub fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_classic_header(writer, LogRecordKind::Commit, self.version, self.log_position)?;
        writer.write_i64::<LittleEndian>(self.transaction_position)?;
        if self.version == LOG_RECORD_V0 {
            writer.write_i32::<LittleEndian>(event_number_to_v0(self.first_event_number)?)?;
        } else {
            writer.write_i64::<LittleEndian>(self.first_event_number)?;
        }
        writer.write_i64::<LittleEndian>(self.sort_key)?;
        write_record_id(writer, &self.correlation_id)?;
        writer.write_i64::<LittleEndian>(self.timestamp.ticks())?;
        Ok(())
    }

    /// Encoded length without framing.
    pub fn encoded_len(&self) -> usize {
        let event_number_size = if self.version == LOG_RECORD_V0 { 4 } else { 8 };
        CLASSIC_HEADER_SIZE + 8 + event_number_size + 8 + RECORD_ID_SIZE + 8
    }

    /// Encoded length including the length prefix and suffix.
    pub fn size_with_length_prefix_and_suffix(&self) -> usize {
        self.encoded_len() + FRAMING_OVERHEAD
    }

    /// Record version
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Position of the record in the log
    pub fn log_position(&self) -> i64 {
        self.log_position
    }

    /// Position of the first prepare of the committed transaction
    pub fn transaction_position(&self) -> i64 {
        self.transaction_position
    }

    /// Event number assigned to the first committed event
    pub fn first_event_number(&self) -> i64 {
        self.first_event_number
    }

    /// Visibility order
    pub fn sort_key(&self) -> i64 {
        self.sort_key
    }

    /// Correlation identifier of the write
    pub fn correlation_id(&self) -> RecordId {
        self.correlation_id
    }

    /// Creation time
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}
