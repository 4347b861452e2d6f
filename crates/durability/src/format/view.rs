//! Zero-copy view over a classic prepare record.
//!
//! Scans that only need a few fields of each prepare (flags, positions,
//! stream) should not allocate the whole record. The view walks the
//! variable-length fields once to compute their offsets and checks that the
//! walk ends exactly at the declared length; scalar fields are then decoded
//! on access straight from the borrowed bytes.

use crate::format::bytes::{i32_at, i64_at, slice_at, u8_at, var_u32_at};
use crate::format::codec::FieldReader;
use crate::format::kind::LogRecordKind;
use crate::format::prepare::{PrepareFlags, PrepareLogRecord};
use crate::format::version::{ensure_classic_version, expected_version_from_v0, LOG_RECORD_V0};
use std::ops::Range;
use tflog_core::{Error, Limits, RecordId, Result, Timestamp, RECORD_ID_SIZE};

const FLAGS_OFFSET: usize = 10;
const TRANSACTION_POSITION_OFFSET: usize = 12;
const TRANSACTION_OFFSET_OFFSET: usize = 20;
const EXPECTED_VERSION_OFFSET: usize = 24;

/// Borrowed view over the bytes of a classic prepare record.
#[derive(Debug, Clone)]
pub struct PrepareRecordView<'a> {
    bytes: &'a [u8],
    version: u8,
    log_position: i64,
    event_stream_id: &'a str,
    event_id_offset: usize,
    event_type: &'a str,
    data: Range<usize>,
    metadata: Range<usize>,
}

impl<'a> PrepareRecordView<'a> {
    /// Lay a view over the first `length` bytes of `bytes`.
    ///
    /// `length` is the record length declared by its framing.
    pub fn new(bytes: &'a [u8], length: usize, limits: &Limits) -> Result<Self> {
        if length > bytes.len() {
            return Err(Error::malformed(-1, length, bytes.len(), "prepare view"));
        }
        let bytes = &bytes[..length];

        let log_position = i64_at(bytes, 2, -1, "log_position")?;
        let kind = LogRecordKind::from_byte(u8_at(bytes, 0, log_position, "kind")?, log_position)?;
        if kind != LogRecordKind::Prepare {
            return Err(Error::InvalidRecordKind {
                kind: kind.as_byte(),
                log_position,
            });
        }
        let version = u8_at(bytes, 1, log_position, "version")?;
        ensure_classic_version("Prepare", version, log_position)?;

        let mut offset = EXPECTED_VERSION_OFFSET + if version == LOG_RECORD_V0 { 4 } else { 8 };

        let (stream_id_size, used) = var_u32_at(bytes, offset, log_position, "event_stream_id")?;
        offset += used;
        let stream_id_size = stream_id_size as usize;
        check_declared(stream_id_size, log_position, limits)?;
        let event_stream_id = utf8_at(bytes, offset, stream_id_size, log_position, "event_stream_id")?;
        offset += stream_id_size;

        let event_id_offset = offset;
        // event id, correlation id, timestamp
        offset += RECORD_ID_SIZE + RECORD_ID_SIZE + 8;

        let (event_type_size, used) = var_u32_at(bytes, offset, log_position, "event_type")?;
        offset += used;
        let event_type_size = event_type_size as usize;
        let event_type = utf8_at(bytes, offset, event_type_size, log_position, "event_type")?;
        offset += event_type_size;

        let data_size = non_negative(i32_at(bytes, offset, log_position, "data")?, log_position, "data")?;
        check_declared(stream_id_size + data_size, log_position, limits)?;
        offset += 4;
        let data = offset..offset + data_size;
        offset += data_size;

        let metadata_size = non_negative(
            i32_at(bytes, offset, log_position, "metadata")?,
            log_position,
            "metadata",
        )?;
        offset += 4;
        let metadata = offset..offset + metadata_size;
        offset += metadata_size;

        check_declared(stream_id_size + data_size + metadata_size, log_position, limits)?;
        if offset != length {
            return Err(Error::malformed(log_position, length, offset, "prepare view"));
        }

        let view = PrepareRecordView {
            bytes,
            version,
            log_position,
            event_stream_id,
            event_id_offset,
            event_type,
            data,
            metadata,
        };
        view.event_id().ensure_not_nil("event_id")?;
        view.correlation_id().ensure_not_nil("correlation_id")?;
        Ok(view)
    }

    // offsets were checked against the length in `new`
    fn fixed<const N: usize>(&self, offset: usize) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[offset..offset + N]);
        out
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
        PrepareFlags::from_bits(u16::from_le_bytes(self.fixed(FLAGS_OFFSET)))
    }

    /// Position of the first prepare of the transaction
    pub fn transaction_position(&self) -> i64 {
        i64::from_le_bytes(self.fixed(TRANSACTION_POSITION_OFFSET))
    }

    /// Offset within the transaction
    pub fn transaction_offset(&self) -> i32 {
        i32::from_le_bytes(self.fixed(TRANSACTION_OFFSET_OFFSET))
    }

    /// Expected version, widened for version 0 records
    pub fn expected_version(&self) -> i64 {
        if self.version == LOG_RECORD_V0 {
            expected_version_from_v0(i32::from_le_bytes(self.fixed(EXPECTED_VERSION_OFFSET)))
        } else {
            i64::from_le_bytes(self.fixed(EXPECTED_VERSION_OFFSET))
        }
    }

    /// Stream name
    pub fn event_stream_id(&self) -> &'a str {
        self.event_stream_id
    }

    /// Event identifier
    pub fn event_id(&self) -> RecordId {
        RecordId::from_wire_bytes(self.fixed(self.event_id_offset))
    }

    /// Correlation identifier
    pub fn correlation_id(&self) -> RecordId {
        RecordId::from_wire_bytes(self.fixed(self.event_id_offset + RECORD_ID_SIZE))
    }

    /// Creation time
    pub fn timestamp(&self) -> Timestamp {
        Timestamp::from_ticks(i64::from_le_bytes(
            self.fixed(self.event_id_offset + 2 * RECORD_ID_SIZE),
        ))
    }

    /// Event type name
    pub fn event_type(&self) -> &'a str {
        self.event_type
    }

    /// Event data, empty when the record is redacted
    pub fn data(&self) -> &'a [u8] {
        if self.flags().has_any_of(PrepareFlags::IS_REDACTED) {
            return &[];
        }
        &self.bytes[self.data.clone()]
    }

    /// Event metadata
    pub fn metadata(&self) -> &'a [u8] {
        &self.bytes[self.metadata.clone()]
    }

    /// The viewed record bytes
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Materialize an owned record.
    pub fn to_record(&self) -> Result<PrepareLogRecord> {
        let mut reader = FieldReader::new(self.bytes);
        reader.set_log_position(self.log_position);
        reader.read_u8("kind")?;
        reader.read_u8("version")?;
        reader.read_i64("log_position")?;
        let limits = Limits::with_max_record_size(usize::MAX);
        let record = PrepareLogRecord::decode(&mut reader, self.version, self.log_position, &limits)?;
        reader.finish("prepare")?;
        Ok(record)
    }
}

fn utf8_at<'a>(
    bytes: &'a [u8],
    offset: usize,
    len: usize,
    log_position: i64,
    field: &'static str,
) -> Result<&'a str> {
    std::str::from_utf8(slice_at(bytes, offset, len, log_position, field)?)
        .map_err(|_| Error::InvalidString {
            field,
            log_position,
        })
}

// declared sizes are checked as soon as they are read, before any slicing
fn check_declared(declared: usize, log_position: i64, limits: &Limits) -> Result<()> {
    if declared > limits.max_record_size {
        return Err(Error::RecordTooLarge {
            log_position,
            size: declared,
            max: limits.max_record_size,
        });
    }
    Ok(())
}

fn non_negative(size: i32, log_position: i64, field: &'static str) -> Result<usize> {
    usize::try_from(size).map_err(|_| Error::malformed(log_position, 0, size as usize, field))
}
