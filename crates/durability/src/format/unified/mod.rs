//! Unified record family.
//!
//! Every unified record is one contiguous buffer:
//!
//! ```text
//! ┌──────────────────────────┬──────────────────────┬──────────────────┐
//! │ Record header (40 bytes) │ Sub-header (fixed)   │ Payload          │
//! └──────────────────────────┴──────────────────────┴──────────────────┘
//!
//! Record header:
//! ┌──────────┬─────────────┬──────────────┬───────────────┬───────────────┬──────────────────┐
//! │ kind (1) │ version (1) │ reserved (6) │ timestamp (8) │ record_id (16)│ log_position (8) │
//! └──────────┴─────────────┴──────────────┴───────────────┴───────────────┴──────────────────┘
//! ```
//!
//! The sub-header size is fixed per kind, so the payload starts at a known
//! offset and runs to the end of the record. Fields are read straight from
//! the buffer with bounds-checked little-endian accessors.

pub mod named;
pub mod stream_write;
pub mod sub_headers;

pub use named::{
    ContentTypeRecord, EventTypeRecord, NamedRecord, PartitionRecord, PartitionTypeRecord,
    StreamRecord, StreamTypeRecord,
};
pub use stream_write::{StreamWriteEvent, StreamWriteRecord, EVENT_HEADER_SIZE};
pub use sub_headers::{
    ContentTypeHeader, EpochHeader, EventTypeHeader, PartitionHeader, PartitionTypeHeader,
    StreamHeader, StreamTypeHeader, StreamWriteHeader, SubHeader, TransactionEndHeader,
    TransactionStartHeader,
};

use crate::format::bytes::{i64_at, record_id_at, slice_at, u8_at};
use crate::format::framing::FRAMING_OVERHEAD;
use crate::format::kind::LogRecordKind;
use std::io::Write;
use tflog_core::{Error, Limits, RecordId, Result, Timestamp};

/// Size of the header shared by every unified record
pub const RECORD_HEADER_SIZE: usize = 40;

/// Header shared by every unified record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Record kind
    pub kind: LogRecordKind,
    /// Version of the sub-header layout
    pub version: u8,
    /// Creation time
    pub timestamp: Timestamp,
    /// Identifier of the thing the record defines
    pub record_id: RecordId,
    /// Position of the record in the log
    pub log_position: i64,
}

impl RecordHeader {
    /// Serialize the header.
    pub fn to_bytes(&self) -> [u8; RECORD_HEADER_SIZE] {
        let mut bytes = [0u8; RECORD_HEADER_SIZE];
        bytes[0] = self.kind.as_byte();
        bytes[1] = self.version;
        bytes[8..16].copy_from_slice(&self.timestamp.ticks().to_le_bytes());
        bytes[16..32].copy_from_slice(&self.record_id.to_wire_bytes());
        bytes[32..40].copy_from_slice(&self.log_position.to_le_bytes());
        bytes
    }

    /// Read the header at the start of `buf`.
    pub fn read(buf: &[u8]) -> Result<Self> {
        // the position is only known once the header is read
        let log_position = i64_at(buf, 32, -1, "log_position")?;
        let kind = LogRecordKind::from_byte(u8_at(buf, 0, log_position, "kind")?, log_position)?;
        Ok(RecordHeader {
            kind,
            version: u8_at(buf, 1, log_position, "version")?,
            timestamp: Timestamp::from_ticks(i64_at(buf, 8, log_position, "timestamp")?),
            record_id: record_id_at(buf, 16, log_position, "record_id")?,
            log_position,
        })
    }
}

/// A unified record: header, typed sub-header and raw payload in one buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnifiedRecord<H: SubHeader> {
    header: RecordHeader,
    sub_header: H,
    bytes: Vec<u8>,
}

impl<H: SubHeader> UnifiedRecord<H> {
    /// Offset of the payload within the record
    pub const PAYLOAD_OFFSET: usize = RECORD_HEADER_SIZE + H::SIZE;

    /// Assemble a record at the sub-header's current version.
    pub fn new(
        timestamp: Timestamp,
        record_id: RecordId,
        log_position: i64,
        sub_header: H,
        payload: &[u8],
    ) -> Result<Self> {
        record_id.ensure_not_nil("record_id")?;
        sub_header.validate()?;
        if log_position < 0 {
            return Err(Error::InvalidArgument(format!(
                "log position {} is negative",
                log_position
            )));
        }

        let header = RecordHeader {
            kind: H::KIND,
            version: H::VERSION,
            timestamp,
            record_id,
            log_position,
        };
        let mut bytes = Vec::with_capacity(Self::PAYLOAD_OFFSET + payload.len());
        bytes.extend_from_slice(&header.to_bytes());
        bytes.resize(Self::PAYLOAD_OFFSET, 0);
        sub_header.write(&mut bytes[RECORD_HEADER_SIZE..Self::PAYLOAD_OFFSET]);
        bytes.extend_from_slice(payload);

        Ok(UnifiedRecord {
            header,
            sub_header,
            bytes,
        })
    }

    /// Take ownership of record bytes and parse the fixed headers.
    pub fn from_bytes(bytes: Vec<u8>, limits: &Limits) -> Result<Self> {
        let header = RecordHeader::read(&bytes)?;
        limits.check_record_size(bytes.len(), header.log_position)?;
        if header.kind != H::KIND {
            return Err(Error::InvalidRecordKind {
                kind: header.kind.as_byte(),
                log_position: header.log_position,
            });
        }
        if header.version != H::VERSION {
            return Err(Error::UnsupportedVersion {
                kind: H::KIND.name(),
                version: header.version,
                log_position: header.log_position,
            });
        }
        let raw = slice_at(
            &bytes,
            RECORD_HEADER_SIZE,
            H::SIZE,
            header.log_position,
            "sub-header",
        )?;
        let sub_header = H::read(raw, header.log_position)?;
        header.record_id.ensure_not_nil("record_id")?;
        sub_header.validate()?;

        Ok(UnifiedRecord {
            header,
            sub_header,
            bytes,
        })
    }

    /// Record header
    pub fn header(&self) -> &RecordHeader {
        &self.header
    }

    /// Typed sub-header
    pub fn sub_header(&self) -> &H {
        &self.sub_header
    }

    /// Payload bytes following the sub-header
    pub fn payload(&self) -> &[u8] {
        &self.bytes[Self::PAYLOAD_OFFSET..]
    }

    /// The whole record as stored
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Record kind
    pub fn kind(&self) -> LogRecordKind {
        self.header.kind
    }

    /// Record version
    pub fn version(&self) -> u8 {
        self.header.version
    }

    /// Position of the record in the log
    pub fn log_position(&self) -> i64 {
        self.header.log_position
    }

    /// Creation time
    pub fn timestamp(&self) -> Timestamp {
        self.header.timestamp
    }

    /// Record identifier
    pub fn record_id(&self) -> RecordId {
        self.header.record_id
    }

    /// Write the record bytes, without framing.
    pub fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.bytes)?;
        Ok(())
    }

    /// Encoded length including the length prefix and suffix.
    pub fn size_with_length_prefix_and_suffix(&self) -> usize {
        self.bytes.len() + FRAMING_OVERHEAD
    }
}

/// Unified epoch record (kind `System`, version 1, no payload).
pub type UnifiedEpochRecord = UnifiedRecord<EpochHeader>;

/// Start of an explicit transaction (no payload).
pub type TransactionStartRecord = UnifiedRecord<TransactionStartHeader>;

/// End of an explicit transaction (no payload).
pub type TransactionEndRecord = UnifiedRecord<TransactionEndHeader>;

impl<H: SubHeader> UnifiedRecord<H> {
    /// Parse a record kind that carries no payload.
    pub fn from_bytes_without_payload(bytes: Vec<u8>, limits: &Limits) -> Result<Self> {
        let record = Self::from_bytes(bytes, limits)?;
        if !record.payload().is_empty() {
            return Err(Error::malformed(
                record.log_position(),
                Self::PAYLOAD_OFFSET,
                record.as_bytes().len(),
                "unexpected payload",
            ));
        }
        Ok(record)
    }
}

impl TransactionStartRecord {
    /// Transaction identifier, stored as the record id
    pub fn transaction_id(&self) -> RecordId {
        self.record_id()
    }

    /// Transaction status
    pub fn status(&self) -> u8 {
        self.sub_header().status
    }

    /// Transaction type
    pub fn transaction_type(&self) -> u8 {
        self.sub_header().transaction_type
    }

    /// Number of records in the transaction
    pub fn record_count(&self) -> u32 {
        self.sub_header().record_count
    }
}

impl TransactionEndRecord {
    /// Transaction identifier, stored as the record id
    pub fn transaction_id(&self) -> RecordId {
        self.record_id()
    }

    /// Number of records in the transaction
    pub fn record_count(&self) -> u32 {
        self.sub_header().record_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_header_layout() {
        let id = RecordId::new();
        let header = RecordHeader {
            kind: LogRecordKind::Stream,
            version: 0,
            timestamp: Timestamp::from_ticks(0x0102_0304_0506_0708),
            record_id: id,
            log_position: 4096,
        };
        let bytes = header.to_bytes();
        assert_eq!(bytes[0], 5);
        assert_eq!(bytes[1], 0);
        assert_eq!(&bytes[2..8], &[0u8; 6]);
        assert_eq!(&bytes[8..16], &0x0102_0304_0506_0708i64.to_le_bytes());
        assert_eq!(&bytes[16..32], &id.to_wire_bytes());
        assert_eq!(&bytes[32..40], &4096i64.to_le_bytes());
        assert_eq!(RecordHeader::read(&bytes).unwrap(), header);
    }

    #[test]
    fn test_epoch_record_roundtrip() {
        let sub_header = EpochHeader {
            prev_epoch_position: 100,
            epoch_number: 3,
            leader_instance_id: RecordId::new(),
        };
        let record =
            UnifiedEpochRecord::new(Timestamp::now(), RecordId::new(), 512, sub_header, &[])
                .unwrap();
        assert_eq!(record.as_bytes().len(), 72);
        assert_eq!(record.kind(), LogRecordKind::System);
        assert_eq!(record.version(), 1);

        let decoded =
            UnifiedEpochRecord::from_bytes(record.as_bytes().to_vec(), &Limits::default())
                .unwrap();
        assert_eq!(decoded, record);
        assert!(decoded.payload().is_empty());
    }

    #[test]
    fn test_wrong_version_is_rejected() {
        let record = UnifiedEpochRecord::new(
            Timestamp::now(),
            RecordId::new(),
            0,
            EpochHeader {
                prev_epoch_position: -1,
                epoch_number: 0,
                leader_instance_id: RecordId::new(),
            },
            &[],
        )
        .unwrap();
        let mut bytes = record.as_bytes().to_vec();
        bytes[1] = 0;
        assert!(matches!(
            UnifiedEpochRecord::from_bytes(bytes, &Limits::default()),
            Err(Error::UnsupportedVersion { version: 0, .. })
        ));
    }

    #[test]
    fn test_truncated_sub_header_is_malformed() {
        let record = UnifiedEpochRecord::new(
            Timestamp::now(),
            RecordId::new(),
            0,
            EpochHeader {
                prev_epoch_position: -1,
                epoch_number: 0,
                leader_instance_id: RecordId::new(),
            },
            &[],
        )
        .unwrap();
        let bytes = record.as_bytes()[..60].to_vec();
        assert!(matches!(
            UnifiedEpochRecord::from_bytes(bytes, &Limits::default()),
            Err(Error::MalformedLength { .. })
        ));
    }

    #[test]
    fn test_nil_record_id_is_rejected() {
        let result = UnifiedEpochRecord::new(
            Timestamp::now(),
            RecordId::nil(),
            0,
            EpochHeader {
                prev_epoch_position: -1,
                epoch_number: 0,
                leader_instance_id: RecordId::new(),
            },
            &[],
        );
        assert!(matches!(result, Err(Error::IdentifierInvalid { .. })));
    }

    #[test]
    fn test_transaction_records_roundtrip() {
        let transaction_id = RecordId::new();
        let start = TransactionStartRecord::new(
            Timestamp::now(),
            transaction_id,
            0,
            TransactionStartHeader {
                status: 1,
                transaction_type: 0,
                record_count: 2,
            },
            &[],
        )
        .unwrap();
        assert_eq!(start.as_bytes().len(), 48);
        assert_eq!(start.as_bytes()[0], 10);
        let decoded = TransactionStartRecord::from_bytes_without_payload(
            start.as_bytes().to_vec(),
            &Limits::default(),
        )
        .unwrap();
        assert_eq!(decoded, start);
        assert_eq!(decoded.transaction_id(), transaction_id);
        assert_eq!(decoded.status(), 1);
        assert_eq!(decoded.record_count(), 2);

        let end = TransactionEndRecord::new(
            Timestamp::now(),
            transaction_id,
            48,
            TransactionEndHeader { record_count: 2 },
            &[],
        )
        .unwrap();
        assert_eq!(end.as_bytes()[0], 11);
        let decoded = TransactionEndRecord::from_bytes_without_payload(
            end.as_bytes().to_vec(),
            &Limits::default(),
        )
        .unwrap();
        assert_eq!(decoded.transaction_id(), transaction_id);
        assert_eq!(decoded.record_count(), 2);
    }

    #[test]
    fn test_transaction_record_with_payload_is_malformed() {
        let end = TransactionEndRecord::new(
            Timestamp::now(),
            RecordId::new(),
            0,
            TransactionEndHeader { record_count: 0 },
            b"x",
        )
        .unwrap();
        assert!(matches!(
            TransactionEndRecord::from_bytes_without_payload(
                end.as_bytes().to_vec(),
                &Limits::default()
            ),
            Err(Error::MalformedLength { .. })
        ));
    }
}
