//! The closed set of log records and family dispatch.
//!
//! A log is written in exactly one record family. The family decides which
//! kind bytes are legal and how each kind is decoded:
//!
//! | Kind | Classic | Unified |
//! |------|---------|---------|
//! | Prepare (0) | prepare | - |
//! | Commit (1) | commit | - |
//! | System (2) | system record | epoch |
//! | PartitionType..EventType (3-8) | - | named / stream write |
//! | ContentType (9) | - | named |
//! | TransactionStart, TransactionEnd (10-11) | - | no payload |

use crate::format::codec::FieldReader;
use crate::format::commit::CommitLogRecord;
use crate::format::contract::PrepareRecord;
use crate::format::epoch::{decode_epoch, EpochRecord};
use crate::format::framing::write_frame;
use crate::format::kind::LogRecordKind;
use crate::format::prepare::PrepareLogRecord;
use crate::format::system::{SystemLogRecord, SystemRecordType};
use crate::format::unified::{
    ContentTypeRecord, EventTypeRecord, NamedRecord, PartitionRecord, PartitionTypeRecord,
    StreamRecord, StreamTypeRecord, StreamWriteRecord, SubHeader, TransactionEndRecord,
    TransactionStartRecord, UnifiedEpochRecord, UnifiedRecord,
};
use crate::format::bytes::{i64_at, u8_at};
use std::io::Write;
use tflog_core::{Error, Limits, Result};

/// Behavior shared by every record type.
pub trait Record {
    /// Record kind
    fn kind(&self) -> LogRecordKind;

    /// Record version
    fn version(&self) -> u8;

    /// Position of the record in the log
    fn log_position(&self) -> i64;

    /// Encode the record without framing.
    fn encode<W: Write>(&self, writer: &mut W) -> Result<()>;

    /// Encoded length including the length prefix and suffix.
    fn size_with_length_prefix_and_suffix(&self) -> usize;

    /// Encode into a new buffer, without framing.
    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.size_with_length_prefix_and_suffix());
        self.encode(&mut out)?;
        Ok(out)
    }

    /// Encode with length prefix and suffix.
    fn to_framed_bytes(&self) -> Result<Vec<u8>> {
        let record = self.to_bytes()?;
        let mut out = Vec::with_capacity(self.size_with_length_prefix_and_suffix());
        write_frame(&mut out, &record)?;
        Ok(out)
    }
}

macro_rules! impl_record {
    ($ty:ty, $kind:expr) => {
        impl Record for $ty {
            fn kind(&self) -> LogRecordKind {
                $kind
            }

            fn version(&self) -> u8 {
                <$ty>::version(self)
            }

            fn log_position(&self) -> i64 {
                <$ty>::log_position(self)
            }

            fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
                <$ty>::encode(self, writer)
            }

            fn size_with_length_prefix_and_suffix(&self) -> usize {
                <$ty>::size_with_length_prefix_and_suffix(self)
            }
        }
    };
}

impl_record!(PrepareLogRecord, LogRecordKind::Prepare);
impl_record!(CommitLogRecord, LogRecordKind::Commit);
impl_record!(SystemLogRecord, LogRecordKind::System);
impl_record!(StreamWriteRecord, LogRecordKind::StreamWrite);

impl<H: SubHeader> Record for UnifiedRecord<H> {
    fn kind(&self) -> LogRecordKind {
        H::KIND
    }

    fn version(&self) -> u8 {
        UnifiedRecord::version(self)
    }

    fn log_position(&self) -> i64 {
        UnifiedRecord::log_position(self)
    }

    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        UnifiedRecord::encode(self, writer)
    }

    fn size_with_length_prefix_and_suffix(&self) -> usize {
        UnifiedRecord::size_with_length_prefix_and_suffix(self)
    }
}

impl<H: SubHeader> Record for NamedRecord<H> {
    fn kind(&self) -> LogRecordKind {
        H::KIND
    }

    fn version(&self) -> u8 {
        NamedRecord::version(self)
    }

    fn log_position(&self) -> i64 {
        NamedRecord::log_position(self)
    }

    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        NamedRecord::encode(self, writer)
    }

    fn size_with_length_prefix_and_suffix(&self) -> usize {
        NamedRecord::size_with_length_prefix_and_suffix(self)
    }
}

/// Any record of either family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// Classic prepare
    Prepare(PrepareLogRecord),
    /// Classic commit
    Commit(CommitLogRecord),
    /// Classic system record
    System(SystemLogRecord),
    /// Unified epoch
    Epoch(UnifiedEpochRecord),
    /// Unified partition type
    PartitionType(PartitionTypeRecord),
    /// Unified stream type
    StreamType(StreamTypeRecord),
    /// Unified stream
    Stream(StreamRecord),
    /// Unified partition
    Partition(PartitionRecord),
    /// Unified event type
    EventType(EventTypeRecord),
    /// Unified stream write
    StreamWrite(StreamWriteRecord),
    /// Unified content type
    ContentType(ContentTypeRecord),
    /// Unified transaction start
    TransactionStart(TransactionStartRecord),
    /// Unified transaction end
    TransactionEnd(TransactionEndRecord),
}

macro_rules! dispatch {
    ($self:expr, $r:ident => $body:expr) => {
        match $self {
            LogRecord::Prepare($r) => $body,
            LogRecord::Commit($r) => $body,
            LogRecord::System($r) => $body,
            LogRecord::Epoch($r) => $body,
            LogRecord::PartitionType($r) => $body,
            LogRecord::StreamType($r) => $body,
            LogRecord::Stream($r) => $body,
            LogRecord::Partition($r) => $body,
            LogRecord::EventType($r) => $body,
            LogRecord::StreamWrite($r) => $body,
            LogRecord::ContentType($r) => $body,
            LogRecord::TransactionStart($r) => $body,
            LogRecord::TransactionEnd($r) => $body,
        }
    };
}

impl Record for LogRecord {
    fn kind(&self) -> LogRecordKind {
        dispatch!(self, r => Record::kind(r))
    }

    fn version(&self) -> u8 {
        dispatch!(self, r => Record::version(r))
    }

    fn log_position(&self) -> i64 {
        dispatch!(self, r => Record::log_position(r))
    }

    fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        dispatch!(self, r => Record::encode(r, writer))
    }

    fn size_with_length_prefix_and_suffix(&self) -> usize {
        dispatch!(self, r => Record::size_with_length_prefix_and_suffix(r))
    }
}

impl LogRecord {
    /// Family the record belongs to
    pub fn family(&self) -> RecordFamily {
        match self {
            LogRecord::Prepare(_) | LogRecord::Commit(_) | LogRecord::System(_) => {
                RecordFamily::Classic
            }
            _ => RecordFamily::Unified,
        }
    }

    /// The record as a prepare, for classic prepares and stream writes.
    pub fn as_prepare(&self) -> Option<&dyn PrepareRecord> {
        match self {
            LogRecord::Prepare(r) => Some(r),
            LogRecord::StreamWrite(r) => Some(r),
            _ => None,
        }
    }

    /// The epoch carried by the record, if it is an epoch record.
    ///
    /// A classic system record marked as an epoch whose payload cannot be
    /// read is an error, not `None`.
    pub fn as_epoch(&self) -> Result<Option<EpochRecord>> {
        match self {
            LogRecord::System(r) if r.system_record_type() == SystemRecordType::Epoch => {
                decode_epoch(r).map(Some)
            }
            LogRecord::Epoch(r) => Ok(Some(EpochRecord::from_unified_record(r))),
            _ => Ok(None),
        }
    }

    /// Copy a prepare for a new position after a failed append.
    pub fn copy_for_retry(
        &self,
        log_position: i64,
        transaction_position: i64,
        limits: &Limits,
    ) -> Result<LogRecord> {
        match self {
            LogRecord::Prepare(r) => r
                .copy_for_retry(log_position, transaction_position, limits)
                .map(LogRecord::Prepare),
            LogRecord::StreamWrite(r) => r
                .copy_for_retry(log_position, transaction_position, limits)
                .map(LogRecord::StreamWrite),
            other => Err(Error::InvalidArgument(format!(
                "{} records are not retried by copy",
                Record::kind(other)
            ))),
        }
    }
}

impl From<PrepareLogRecord> for LogRecord {
    fn from(r: PrepareLogRecord) -> Self {
        LogRecord::Prepare(r)
    }
}

impl From<CommitLogRecord> for LogRecord {
    fn from(r: CommitLogRecord) -> Self {
        LogRecord::Commit(r)
    }
}

impl From<SystemLogRecord> for LogRecord {
    fn from(r: SystemLogRecord) -> Self {
        LogRecord::System(r)
    }
}

impl From<StreamWriteRecord> for LogRecord {
    fn from(r: StreamWriteRecord) -> Self {
        LogRecord::StreamWrite(r)
    }
}

/// Record family a log is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecordFamily {
    /// Prepare/commit records with string stream names
    #[default]
    Classic,
    /// Fixed-header records with numbered streams and event types
    Unified,
}

impl RecordFamily {
    /// Family name
    pub fn name(self) -> &'static str {
        match self {
            RecordFamily::Classic => "classic",
            RecordFamily::Unified => "unified",
        }
    }

    /// Decode one unframed record. Every byte must belong to the record.
    pub fn from_bytes(self, bytes: &[u8], limits: &Limits) -> Result<LogRecord> {
        match self {
            RecordFamily::Classic => decode_classic(bytes, limits),
            RecordFamily::Unified => decode_unified(bytes, limits),
        }
    }

    /// Family record that stores `epoch`.
    pub fn epoch_record(self, epoch: &EpochRecord) -> Result<LogRecord> {
        match self {
            RecordFamily::Classic => epoch.to_system_record().map(LogRecord::System),
            RecordFamily::Unified => epoch.to_unified_record().map(LogRecord::Epoch),
        }
    }
}

impl std::fmt::Display for RecordFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn decode_classic(bytes: &[u8], limits: &Limits) -> Result<LogRecord> {
    let hint = i64_at(bytes, 2, -1, "log_position").unwrap_or(-1);
    limits.check_record_size(bytes.len(), hint)?;

    let mut reader = FieldReader::new(bytes);
    let kind = reader.read_u8("kind")?;
    let version = reader.read_u8("version")?;
    let log_position = reader.read_i64("log_position")?;
    reader.set_log_position(log_position);

    let record = match LogRecordKind::from_byte(kind, log_position)? {
        LogRecordKind::Prepare => LogRecord::Prepare(PrepareLogRecord::decode(
            &mut reader,
            version,
            log_position,
            limits,
        )?),
        LogRecordKind::Commit => {
            LogRecord::Commit(CommitLogRecord::decode(&mut reader, version, log_position)?)
        }
        LogRecordKind::System => LogRecord::System(SystemLogRecord::decode(
            &mut reader,
            version,
            log_position,
            limits,
        )?),
        _ => return Err(Error::InvalidRecordKind { kind, log_position }),
    };
    reader.finish("record")?;
    Ok(record)
}

fn decode_unified(bytes: &[u8], limits: &Limits) -> Result<LogRecord> {
    let log_position = i64_at(bytes, 32, -1, "log_position").unwrap_or(-1);
    let kind = u8_at(bytes, 0, log_position, "kind")?;
    let owned = bytes.to_vec();
    Ok(match LogRecordKind::from_byte(kind, log_position)? {
        LogRecordKind::System => LogRecord::Epoch(UnifiedEpochRecord::from_bytes(owned, limits)?),
        LogRecordKind::PartitionType => {
            LogRecord::PartitionType(PartitionTypeRecord::from_bytes(owned, limits)?)
        }
        LogRecordKind::StreamType => {
            LogRecord::StreamType(StreamTypeRecord::from_bytes(owned, limits)?)
        }
        LogRecordKind::Stream => LogRecord::Stream(StreamRecord::from_bytes(owned, limits)?),
        LogRecordKind::Partition => {
            LogRecord::Partition(PartitionRecord::from_bytes(owned, limits)?)
        }
        LogRecordKind::EventType => {
            LogRecord::EventType(EventTypeRecord::from_bytes(owned, limits)?)
        }
        LogRecordKind::StreamWrite => {
            LogRecord::StreamWrite(StreamWriteRecord::from_bytes(owned, limits)?)
        }
        LogRecordKind::ContentType => {
            LogRecord::ContentType(ContentTypeRecord::from_bytes(owned, limits)?)
        }
        LogRecordKind::TransactionStart => LogRecord::TransactionStart(
            TransactionStartRecord::from_bytes_without_payload(owned, limits)?,
        ),
        LogRecordKind::TransactionEnd => LogRecord::TransactionEnd(
            TransactionEndRecord::from_bytes_without_payload(owned, limits)?,
        ),
        LogRecordKind::Prepare | LogRecordKind::Commit => {
            return Err(Error::InvalidRecordKind { kind, log_position })
        }
    })
}
