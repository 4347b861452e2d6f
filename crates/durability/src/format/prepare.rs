//! Classic prepare records.
//!
//! A prepare carries one event. Single-event writes are committed by the
//! prepare itself (`IsCommitted`); explicit transactions write several
//! prepares that share a transaction position and are made visible by a
//! later commit record.
//!
//! # Layout (after the classic header)
//!
//! ```text
//! flags:u16  transaction_position:i64  transaction_offset:i32
//! expected_version:i32 (V0) | i64 (V1)
//! event_stream_id:string  event_id:16  correlation_id:16  timestamp:i64
//! event_type:string  data_len:i32  data  metadata_len:i32  metadata
//! ```

use crate::format::codec::{
    string_size_with_length_prefix, write_classic_header, write_record_id, write_sized_bytes,
    write_string, FieldReader, CLASSIC_HEADER_SIZE,
};
use crate::format::contract::{EventTypeRef, PrepareRecord, StreamRef};
use crate::format::framing::FRAMING_OVERHEAD;
use crate::format::kind::LogRecordKind;
use crate::format::version::{
    ensure_classic_version, expected_version_from_v0, expected_version_to_v0, LOG_RECORD_V0,
    LOG_RECORD_V1,
};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use tflog_core::expected_version::{ANY, TOMBSTONE_EXPECTED_VERSION};
use tflog_core::{Error, Limits, RecordId, Result, Timestamp, RECORD_ID_SIZE};

/// Event type written on stream tombstones
pub const STREAM_DELETED_EVENT_TYPE: &str = "$streamDeleted";

/// Prepare flag set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PrepareFlags(u16);

impl PrepareFlags {
    /// No flags
    pub const NONE: PrepareFlags = PrepareFlags(0x00);
    /// The prepare contains data
    pub const DATA: PrepareFlags = PrepareFlags(0x01);
    /// The prepare starts a transaction
    pub const TRANSACTION_BEGIN: PrepareFlags = PrepareFlags(0x02);
    /// The prepare ends a transaction
    pub const TRANSACTION_END: PrepareFlags = PrepareFlags(0x04);
    /// The prepare deletes its stream
    pub const STREAM_DELETE: PrepareFlags = PrepareFlags(0x08);
    /// Committed immediately, no commit record will follow
    pub const IS_COMMITTED: PrepareFlags = PrepareFlags(0x20);
    /// Data and metadata are JSON
    pub const IS_JSON: PrepareFlags = PrepareFlags(0x100);
    /// Data was redacted and must not be served
    pub const IS_REDACTED: PrepareFlags = PrepareFlags(0x200);

    /// One event in its own transaction
    pub const SINGLE_WRITE: PrepareFlags =
        PrepareFlags(Self::DATA.0 | Self::TRANSACTION_BEGIN.0 | Self::TRANSACTION_END.0);
    /// Hard deletion of a stream
    pub const DELETE_TOMBSTONE: PrepareFlags = PrepareFlags(
        Self::TRANSACTION_BEGIN.0 | Self::TRANSACTION_END.0 | Self::STREAM_DELETE.0,
    );

    const NAMES: [(PrepareFlags, &'static str); 7] = [
        (Self::DATA, "Data"),
        (Self::TRANSACTION_BEGIN, "TransactionBegin"),
        (Self::TRANSACTION_END, "TransactionEnd"),
        (Self::STREAM_DELETE, "StreamDelete"),
        (Self::IS_COMMITTED, "IsCommitted"),
        (Self::IS_JSON, "IsJson"),
        (Self::IS_REDACTED, "IsRedacted"),
    ];

    /// Flags from raw bits. Unknown bits are kept.
    #[inline]
    pub const fn from_bits(bits: u16) -> Self {
        PrepareFlags(bits)
    }

    /// Raw bits
    #[inline]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// True if every flag in `set` is present.
    #[inline]
    pub const fn has_all_of(self, set: PrepareFlags) -> bool {
        self.0 & set.0 == set.0
    }

    /// True if at least one flag in `set` is present.
    #[inline]
    pub const fn has_any_of(self, set: PrepareFlags) -> bool {
        self.0 & set.0 != 0
    }

    /// True if no flag in `set` is present.
    #[inline]
    pub const fn has_none_of(self, set: PrepareFlags) -> bool {
        self.0 & set.0 == 0
    }
}

impl BitOr for PrepareFlags {
    type Output = PrepareFlags;

    fn bitor(self, rhs: Self) -> Self {
        PrepareFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for PrepareFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for PrepareFlags {
    type Output = PrepareFlags;

    fn bitand(self, rhs: Self) -> Self {
        PrepareFlags(self.0 & rhs.0)
    }
}

impl std::fmt::Display for PrepareFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0 == 0 {
            return f.write_str("None");
        }
        let mut rest = self.0;
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.has_all_of(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
                rest &= !flag.0;
            }
        }
        if rest != 0 {
            if !first {
                f.write_str(" | ")?;
            }
            write!(f, "{:#x}", rest)?;
        }
        Ok(())
    }
}

/// Classic prepare record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareLogRecord {
    version: u8,
    log_position: i64,
    flags: PrepareFlags,
    transaction_position: i64,
    transaction_offset: i32,
    expected_version: i64,
    event_stream_id: String,
    event_id: RecordId,
    correlation_id: RecordId,
    timestamp: Timestamp,
    event_type: String,
    data: Vec<u8>,
    metadata: Vec<u8>,
}

impl PrepareLogRecord {
    /// Start building a prepare at `log_position` for `event_stream_id`.
    ///
    /// Defaults: current version, fresh event and correlation ids,
    /// transaction position equal to the log position, offset 0,
    /// `ExpectedVersion::Any`, `SingleWrite` flags, timestamp now.
    pub fn builder(log_position: i64, event_stream_id: impl Into<String>) -> PrepareRecordBuilder {
        PrepareRecordBuilder::new(log_position, event_stream_id.into())
    }

    /// Builder for a single event committed by its own prepare.
    pub fn single_write(
        log_position: i64,
        event_stream_id: impl Into<String>,
        event_type: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> PrepareRecordBuilder {
        Self::builder(log_position, event_stream_id)
            .with_flags(PrepareFlags::SINGLE_WRITE | PrepareFlags::IS_COMMITTED)
            .with_event_type(event_type)
            .with_data(data)
    }

    /// Builder for a stream tombstone.
    pub fn delete_tombstone(
        log_position: i64,
        event_stream_id: impl Into<String>,
    ) -> PrepareRecordBuilder {
        Self::builder(log_position, event_stream_id)
            .with_flags(PrepareFlags::DELETE_TOMBSTONE | PrepareFlags::IS_COMMITTED)
            .with_expected_version(TOMBSTONE_EXPECTED_VERSION)
            .with_event_type(STREAM_DELETED_EVENT_TYPE)
    }

    /// Decode the body of a prepare whose header has been read.
    pub fn decode(
        reader: &mut FieldReader<'_>,
        version: u8,
        log_position: i64,
        limits: &Limits,
    ) -> Result<Self> {
        ensure_classic_version("Prepare", version, log_position)?;
        reader.set_log_position(log_position);

        let flags = PrepareFlags::from_bits(reader.read_u16("flags")?);
        let transaction_position = reader.read_i64("transaction_position")?;
        let transaction_offset = reader.read_i32("transaction_offset")?;
        let expected_version = if version == LOG_RECORD_V0 {
            expected_version_from_v0(reader.read_i32("expected_version")?)
        } else {
            reader.read_i64("expected_version")?
        };
        let event_stream_id = reader.read_string("event_stream_id")?;
        let event_id = reader.read_record_id("event_id")?;
        let correlation_id = reader.read_record_id("correlation_id")?;
        let timestamp = reader.read_timestamp("timestamp")?;
        let event_type = reader.read_string("event_type")?;
        let data = reader.read_sized_bytes("data", limits)?;
        let metadata = reader.read_sized_bytes("metadata", limits)?;

        event_id.ensure_not_nil("event_id")?;
        correlation_id.ensure_not_nil("correlation_id")?;

        let record = PrepareLogRecord {
            version,
            log_position,
            flags,
            transaction_position,
            transaction_offset,
            expected_version,
            event_stream_id,
            event_id,
            correlation_id,
            timestamp,
            event_type,
            data,
            metadata,
        };
        // approximate footprint, see `in_memory_size`
        limits.check_record_size(record.in_memory_size(), log_position)?;
        Ok(record)
    }

    /// Encode the record, header included, without framing.
    pub fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_classic_header(writer, LogRecordKind::Prepare, self.version, self.log_position)?;
        writer.write_u16::<LittleEndian>(self.flags.bits())?;
        writer.write_i64::<LittleEndian>(self.transaction_position)?;
        writer.write_i32::<LittleEndian>(self.transaction_offset)?;
        if self.version == LOG_RECORD_V0 {
            writer.write_i32::<LittleEndian>(expected_version_to_v0(self.expected_version)?)?;
        } else {
            writer.write_i64::<LittleEndian>(self.expected_version)?;
        }
        write_string(writer, &self.event_stream_id)?;
        write_record_id(writer, &self.event_id)?;
        write_record_id(writer, &self.correlation_id)?;
        writer.write_i64::<LittleEndian>(self.timestamp.ticks())?;
        write_string(writer, &self.event_type)?;
        write_sized_bytes(writer, &self.data)?;
        write_sized_bytes(writer, &self.metadata)?;
        Ok(())
    }

    /// Encoded length without framing.
    pub fn encoded_len(&self) -> usize {
        let expected_version_size = if self.version == LOG_RECORD_V0 { 4 } else { 8 };
        CLASSIC_HEADER_SIZE
            + 2
            + 8
            + 4
            + expected_version_size
            + string_size_with_length_prefix(self.event_stream_id.len())
            + RECORD_ID_SIZE
            + RECORD_ID_SIZE
            + 8
            + string_size_with_length_prefix(self.event_type.len())
            + 4
            + self.data.len()
            + 4
            + self.metadata.len()
    }

    /// Encoded length including the length prefix and suffix.
    pub fn size_with_length_prefix_and_suffix(&self) -> usize {
        self.encoded_len() + FRAMING_OVERHEAD
    }

    /// Approximate footprint of the decoded record: the Rust struct size plus
    /// the lengths of its owned strings and buffers. Allocator overhead and
    /// spare capacity are not counted, and the struct size depends on the
    /// target. `decode` and `build` check this size, not the encoded length,
    /// against the maximum record size.
    pub fn in_memory_size(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.event_stream_id.len()
            + self.event_type.len()
            + self.data.len()
            + self.metadata.len()
    }

    /// Record version
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Position of the record in the log
    pub fn log_position(&self) -> i64 {
        self.log_position
    }

    /// Prepare flags
    pub fn flags(&self) -> PrepareFlags {
        self.flags
    }

    /// Position of the first prepare of the transaction
    pub fn transaction_position(&self) -> i64 {
        self.transaction_position
    }

    /// Offset within the transaction
    pub fn transaction_offset(&self) -> i32 {
        self.transaction_offset
    }

    /// Expected version, or the final event number when `IsCommitted`
    pub fn expected_version(&self) -> i64 {
        self.expected_version
    }

    /// Stream name
    pub fn event_stream_id(&self) -> &str {
        &self.event_stream_id
    }

    /// Event identifier
    pub fn event_id(&self) -> RecordId {
        self.event_id
    }

    /// Correlation identifier
    pub fn correlation_id(&self) -> RecordId {
        self.correlation_id
    }

    /// Creation time
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Event type name (may be empty)
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Event data, empty when the record is redacted
    pub fn data(&self) -> &[u8] {
        if self.flags.has_any_of(PrepareFlags::IS_REDACTED) {
            &[]
        } else {
            &self.data
        }
    }

    /// Event data exactly as stored
    pub fn data_on_disk(&self) -> &[u8] {
        &self.data
    }

    /// Event metadata
    pub fn metadata(&self) -> &[u8] {
        &self.metadata
    }

    /// Copy for a new position after a failed append.
    ///
    /// The copy is written at the current record version and checked
    /// against `limits`.
    pub fn copy_for_retry(
        &self,
        log_position: i64,
        transaction_position: i64,
        limits: &Limits,
    ) -> Result<Self> {
        PrepareRecordBuilder {
            version: LOG_RECORD_V1,
            log_position,
            flags: self.flags,
            transaction_position,
            transaction_offset: self.transaction_offset,
            expected_version: self.expected_version,
            event_stream_id: self.event_stream_id.clone(),
            event_id: self.event_id,
            correlation_id: self.correlation_id,
            timestamp: self.timestamp,
            event_type: self.event_type.clone(),
            data: self.data.clone(),
            metadata: self.metadata.clone(),
            limits: *limits,
        }
        .build()
    }
}

impl PrepareRecord for PrepareLogRecord {
    fn log_position(&self) -> i64 {
        self.log_position
    }

    fn flags(&self) -> PrepareFlags {
        self.flags
    }

    fn transaction_position(&self) -> i64 {
        self.transaction_position
    }

    fn transaction_offset(&self) -> i32 {
        self.transaction_offset
    }

    fn expected_version(&self) -> i64 {
        self.expected_version
    }

    fn event_stream(&self) -> StreamRef<'_> {
        StreamRef::Name(&self.event_stream_id)
    }

    fn event_id(&self) -> RecordId {
        self.event_id
    }

    fn correlation_id(&self) -> RecordId {
        self.correlation_id
    }

    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    fn event_type_ref(&self) -> EventTypeRef<'_> {
        EventTypeRef::Name(&self.event_type)
    }

    fn data(&self) -> &[u8] {
        PrepareLogRecord::data(self)
    }

    fn metadata(&self) -> &[u8] {
        &self.metadata
    }

    fn copy_for_retry(
        &self,
        log_position: i64,
        transaction_position: i64,
        limits: &Limits,
    ) -> Result<Self> {
        PrepareLogRecord::copy_for_retry(self, log_position, transaction_position, limits)
    }
}

/// Builder for [`PrepareLogRecord`]; validation happens once in `build`.
#[derive(Debug, Clone)]
pub struct PrepareRecordBuilder {
    version: u8,
    log_position: i64,
    flags: PrepareFlags,
    transaction_position: i64,
    transaction_offset: i32,
    expected_version: i64,
    event_stream_id: String,
    event_id: RecordId,
    correlation_id: RecordId,
    timestamp: Timestamp,
    event_type: String,
    data: Vec<u8>,
    metadata: Vec<u8>,
    limits: Limits,
}

impl PrepareRecordBuilder {
    fn new(log_position: i64, event_stream_id: String) -> Self {
        PrepareRecordBuilder {
            version: LOG_RECORD_V1,
            log_position,
            flags: PrepareFlags::SINGLE_WRITE,
            transaction_position: log_position,
            transaction_offset: 0,
            expected_version: ANY,
            event_stream_id,
            event_id: RecordId::new(),
            correlation_id: RecordId::new(),
            timestamp: Timestamp::now(),
            event_type: String::new(),
            data: Vec::new(),
            metadata: Vec::new(),
            limits: Limits::default(),
        }
    }

    /// Set the record version (0 or 1)
    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    /// Set the flags
    pub fn with_flags(mut self, flags: PrepareFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set the transaction position
    pub fn with_transaction_position(mut self, transaction_position: i64) -> Self {
        self.transaction_position = transaction_position;
        self
    }

    /// Set the transaction offset
    pub fn with_transaction_offset(mut self, transaction_offset: i32) -> Self {
        self.transaction_offset = transaction_offset;
        self
    }

    /// Set the raw expected version
    pub fn with_expected_version(mut self, expected_version: impl Into<i64>) -> Self {
        self.expected_version = expected_version.into();
        self
    }

    /// Set the event id
    pub fn with_event_id(mut self, event_id: RecordId) -> Self {
        self.event_id = event_id;
        self
    }

    /// Set the correlation id
    pub fn with_correlation_id(mut self, correlation_id: RecordId) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// Set the timestamp
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Set the event type
    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    /// Set the event data
    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }

    /// Set the event metadata
    pub fn with_metadata(mut self, metadata: impl Into<Vec<u8>>) -> Self {
        self.metadata = metadata.into();
        self
    }

    /// Set the limits checked by `build`
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Validate and build the record.
    pub fn build(self) -> Result<PrepareLogRecord> {
        ensure_classic_version("Prepare", self.version, self.log_position)?;
        self.correlation_id.ensure_not_nil("correlation_id")?;
        self.event_id.ensure_not_nil("event_id")?;
        if self.log_position < 0 {
            return Err(Error::InvalidArgument(format!(
                "log position {} is negative",
                self.log_position
            )));
        }
        if self.transaction_position < 0 {
            return Err(Error::InvalidArgument(format!(
                "transaction position {} is negative",
                self.transaction_position
            )));
        }
        if self.transaction_offset < -1 {
            return Err(Error::InvalidArgument(format!(
                "transaction offset {} is below -1",
                self.transaction_offset
            )));
        }
        if self.event_stream_id.is_empty() {
            return Err(Error::InvalidArgument(
                "event stream id is empty".to_string(),
            ));
        }
        if self.expected_version < ANY {
            return Err(Error::InvalidArgument(format!(
                "expected version {} is below Any",
                self.expected_version
            )));
        }
        if self.version == LOG_RECORD_V0 {
            expected_version_to_v0(self.expected_version)?;
        }

        let limits = self.limits;
        let record = PrepareLogRecord {
            version: self.version,
            log_position: self.log_position,
            flags: self.flags,
            transaction_position: self.transaction_position,
            transaction_offset: self.transaction_offset,
            expected_version: self.expected_version,
            event_stream_id: self.event_stream_id,
            event_id: self.event_id,
            correlation_id: self.correlation_id,
            timestamp: self.timestamp,
            event_type: self.event_type,
            data: self.data,
            metadata: self.metadata,
        };
        // approximate footprint, see `in_memory_size`
        limits.check_record_size(record.in_memory_size(), record.log_position)?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::codec::FieldReader;

    fn sample(version: u8) -> PrepareLogRecord {
        PrepareLogRecord::builder(1024, "orders-1")
            .with_version(version)
            .with_flags(PrepareFlags::SINGLE_WRITE | PrepareFlags::IS_JSON)
            .with_transaction_position(1024)
            .with_expected_version(5)
            .with_timestamp(Timestamp::from_ticks(638_000_000_000_000_000))
            .with_event_type("OrderPlaced")
            .with_data(br#"{"total":10}"#.to_vec())
            .with_metadata(b"{}".to_vec())
            .build()
            .unwrap()
    }

    fn roundtrip(record: &PrepareLogRecord) -> PrepareLogRecord {
        let mut buf = Vec::new();
        record.encode(&mut buf).unwrap();
        assert_eq!(buf.len(), record.encoded_len());

        let mut reader = FieldReader::new(&buf);
        assert_eq!(reader.read_u8("kind").unwrap(), 0);
        let version = reader.read_u8("version").unwrap();
        let log_position = reader.read_i64("log_position").unwrap();
        let decoded =
            PrepareLogRecord::decode(&mut reader, version, log_position, &Limits::default())
                .unwrap();
        reader.finish("prepare").unwrap();
        decoded
    }

    #[test]
    fn test_roundtrip_both_versions() {
        for version in [LOG_RECORD_V0, LOG_RECORD_V1] {
            let record = sample(version);
            assert_eq!(roundtrip(&record), record);
        }
    }

    #[test]
    fn test_v0_tombstone_sentinel_survives_roundtrip() {
        let record = PrepareLogRecord::delete_tombstone(0, "gone")
            .with_version(LOG_RECORD_V0)
            .build()
            .unwrap();
        assert_eq!(record.expected_version(), i64::MAX - 1);

        let mut buf = Vec::new();
        record.encode(&mut buf).unwrap();
        // expected version sits after kind, version, log position, flags,
        // transaction position and transaction offset
        assert_eq!(&buf[24..28], &(i32::MAX - 1).to_le_bytes());

        assert_eq!(roundtrip(&record).expected_version(), i64::MAX - 1);
    }

    #[test]
    fn test_size_with_length_prefix_and_suffix() {
        let record = sample(LOG_RECORD_V1);
        let mut buf = Vec::new();
        record.encode(&mut buf).unwrap();
        assert_eq!(record.size_with_length_prefix_and_suffix(), buf.len() + 8);
    }

    #[test]
    fn test_redacted_data_is_hidden_but_stored() {
        let record = PrepareLogRecord::builder(0, "s")
            .with_flags(PrepareFlags::SINGLE_WRITE | PrepareFlags::IS_REDACTED)
            .with_data(vec![1, 2, 3])
            .build()
            .unwrap();
        assert!(record.data().is_empty());
        assert_eq!(record.data_on_disk(), &[1, 2, 3]);
        assert_eq!(roundtrip(&record).data_on_disk(), &[1, 2, 3]);
    }

    #[test]
    fn test_copy_for_retry_keeps_identity() {
        let record = sample(LOG_RECORD_V1);
        let copy = record.copy_for_retry(4096, 4096, &Limits::default()).unwrap();

        assert_eq!(copy.log_position(), 4096);
        assert_eq!(copy.transaction_position(), 4096);
        assert_eq!(copy.event_id(), record.event_id());
        assert_eq!(copy.correlation_id(), record.correlation_id());
        assert_eq!(copy.flags(), record.flags());
        assert_eq!(copy.event_stream_id(), record.event_stream_id());
        assert_eq!(copy.expected_version(), record.expected_version());
        assert_eq!(copy.data(), record.data());
        assert_eq!(copy.metadata(), record.metadata());
        assert_eq!(copy.timestamp(), record.timestamp());
    }

    #[test]
    fn test_copy_for_retry_upgrades_v0() {
        let record = sample(LOG_RECORD_V0);
        assert_eq!(
            record
                .copy_for_retry(10, 10, &Limits::default())
                .unwrap()
                .version(),
            LOG_RECORD_V1
        );
    }

    #[test]
    fn test_in_memory_size_bounds_build() {
        let builder = PrepareLogRecord::builder(0, "orders")
            .with_event_type("OrderPlaced")
            .with_data(vec![1u8; 2000])
            .with_metadata(vec![2u8; 100]);
        let record = builder.clone().build().unwrap();
        let size = record.in_memory_size();
        assert_eq!(
            size,
            std::mem::size_of::<PrepareLogRecord>() + "orders".len() + "OrderPlaced".len() + 2100
        );
        assert!(size > 2100);

        assert!(builder
            .clone()
            .with_limits(Limits::with_max_record_size(size))
            .build()
            .is_ok());
        assert!(matches!(
            builder
                .with_limits(Limits::with_max_record_size(size - 1))
                .build(),
            Err(Error::RecordTooLarge { .. })
        ));
    }

    #[test]
    fn test_copy_for_retry_uses_given_limits() {
        let record = PrepareLogRecord::builder(0, "s")
            .with_data(vec![0u8; 20 * 1024 * 1024])
            .with_limits(Limits::with_max_record_size(32 * 1024 * 1024))
            .build()
            .unwrap();

        assert!(matches!(
            record.copy_for_retry(64, 64, &Limits::default()),
            Err(Error::RecordTooLarge { .. })
        ));
        let copy = record
            .copy_for_retry(64, 64, &Limits::with_max_record_size(32 * 1024 * 1024))
            .unwrap();
        assert_eq!(copy.log_position(), 64);
        assert_eq!(copy.data_on_disk().len(), 20 * 1024 * 1024);
    }

    #[test]
    fn test_build_validation() {
        assert!(matches!(
            PrepareLogRecord::builder(0, "s")
                .with_event_id(RecordId::nil())
                .build(),
            Err(Error::IdentifierInvalid { field: "event_id" })
        ));
        assert!(matches!(
            PrepareLogRecord::builder(0, "s")
                .with_correlation_id(RecordId::nil())
                .build(),
            Err(Error::IdentifierInvalid {
                field: "correlation_id"
            })
        ));
        assert!(PrepareLogRecord::builder(0, "").build().is_err());
        assert!(PrepareLogRecord::builder(0, "s")
            .with_transaction_offset(-2)
            .build()
            .is_err());
        assert!(PrepareLogRecord::builder(0, "s")
            .with_transaction_position(-1)
            .build()
            .is_err());
        assert!(PrepareLogRecord::builder(0, "s")
            .with_expected_version(-3)
            .build()
            .is_err());
        assert!(PrepareLogRecord::builder(0, "s")
            .with_transaction_offset(-1)
            .with_expected_version(-2)
            .build()
            .is_ok());
        assert!(matches!(
            PrepareLogRecord::builder(0, "s").with_version(2).build(),
            Err(Error::UnsupportedVersion { version: 2, .. })
        ));
    }

    #[test]
    fn test_oversized_record_is_rejected() {
        let result = PrepareLogRecord::builder(0, "s")
            .with_data(vec![0u8; 8192])
            .with_limits(Limits::with_small_limits())
            .build();
        assert!(matches!(result, Err(Error::RecordTooLarge { .. })));
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let mut reader = FieldReader::new(&[]);
        assert!(matches!(
            PrepareLogRecord::decode(&mut reader, 3, 77, &Limits::default()),
            Err(Error::UnsupportedVersion {
                kind: "Prepare",
                version: 3,
                log_position: 77
            })
        ));
    }

    #[test]
    fn test_flag_queries() {
        let flags = PrepareFlags::SINGLE_WRITE | PrepareFlags::IS_COMMITTED;
        assert!(flags.has_all_of(PrepareFlags::TRANSACTION_BEGIN | PrepareFlags::TRANSACTION_END));
        assert!(flags.has_any_of(PrepareFlags::STREAM_DELETE | PrepareFlags::DATA));
        assert!(flags.has_none_of(PrepareFlags::STREAM_DELETE | PrepareFlags::IS_JSON));
        assert_eq!(PrepareFlags::SINGLE_WRITE.bits(), 0x07);
        assert_eq!(PrepareFlags::DELETE_TOMBSTONE.bits(), 0x0E);
    }

    #[test]
    fn test_flags_display() {
        assert_eq!(PrepareFlags::NONE.to_string(), "None");
        assert_eq!(
            (PrepareFlags::DATA | PrepareFlags::IS_JSON).to_string(),
            "Data | IsJson"
        );
        assert_eq!(PrepareFlags::from_bits(0x1000).to_string(), "0x1000");
    }
}
