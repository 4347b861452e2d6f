//! Unified records whose payload is a UTF-8 name.
//!
//! Partitions, partition types, streams, stream types, event types and
//! content types all define a named thing. The name is the whole payload, with no length
//! prefix; it is decoded once and kept alongside the raw bytes.

use super::sub_headers::{
    ContentTypeHeader, EventTypeHeader, PartitionHeader, PartitionTypeHeader, StreamHeader,
    StreamTypeHeader, SubHeader,
};
use super::UnifiedRecord;
use crate::format::kind::LogRecordKind;
use std::io::Write;
use tflog_core::{Error, Limits, RecordId, Result, Timestamp};

/// Unified record with a name payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedRecord<H: SubHeader> {
    record: UnifiedRecord<H>,
    name: String,
}

/// Partition type definition
pub type PartitionTypeRecord = NamedRecord<PartitionTypeHeader>;
/// Stream type definition
pub type StreamTypeRecord = NamedRecord<StreamTypeHeader>;
/// Stream definition
pub type StreamRecord = NamedRecord<StreamHeader>;
/// Partition definition
pub type PartitionRecord = NamedRecord<PartitionHeader>;
/// Event type definition
pub type EventTypeRecord = NamedRecord<EventTypeHeader>;
/// Content type definition
pub type ContentTypeRecord = NamedRecord<ContentTypeHeader>;

impl<H: SubHeader> NamedRecord<H> {
    /// Create a named record.
    pub fn new(
        timestamp: Timestamp,
        record_id: RecordId,
        log_position: i64,
        sub_header: H,
        name: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        let record =
            UnifiedRecord::new(timestamp, record_id, log_position, sub_header, name.as_bytes())?;
        Ok(NamedRecord { record, name })
    }

    /// Take ownership of record bytes and decode the name.
    pub fn from_bytes(bytes: Vec<u8>, limits: &Limits) -> Result<Self> {
        let record = UnifiedRecord::<H>::from_bytes(bytes, limits)?;
        let name = std::str::from_utf8(record.payload())
            .map_err(|_| Error::InvalidString {
                field: "name",
                log_position: record.log_position(),
            })?
            .to_string();
        Ok(NamedRecord { record, name })
    }

    /// Name carried in the payload
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Underlying record
    pub fn record(&self) -> &UnifiedRecord<H> {
        &self.record
    }

    /// Typed sub-header
    pub fn sub_header(&self) -> &H {
        self.record.sub_header()
    }

    /// Record kind
    pub fn kind(&self) -> LogRecordKind {
        self.record.kind()
    }

    /// Record version
    pub fn version(&self) -> u8 {
        self.record.version()
    }

    /// Position of the record in the log
    pub fn log_position(&self) -> i64 {
        self.record.log_position()
    }

    /// Creation time
    pub fn timestamp(&self) -> Timestamp {
        self.record.timestamp()
    }

    /// Identifier of the defined thing
    pub fn record_id(&self) -> RecordId {
        self.record.record_id()
    }

    /// Write the record bytes, without framing.
    pub fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.record.encode(writer)
    }

    /// Encoded length including the length prefix and suffix.
    pub fn size_with_length_prefix_and_suffix(&self) -> usize {
        self.record.size_with_length_prefix_and_suffix()
    }
}

impl StreamRecord {
    /// Number stream writes use to refer to the stream
    pub fn stream_number(&self) -> u32 {
        self.sub_header().reference_number
    }

    /// Partition the stream lives in
    pub fn partition_id(&self) -> RecordId {
        self.sub_header().partition_id
    }

    /// Stream type
    pub fn stream_type_id(&self) -> RecordId {
        self.sub_header().stream_type_id
    }
}

impl EventTypeRecord {
    /// Number stream writes use to refer to the event type
    pub fn event_type_number(&self) -> u32 {
        self.sub_header().reference_number
    }

    /// Version of the event type
    pub fn event_type_version(&self) -> u16 {
        self.sub_header().event_type_version
    }

    /// Parent event type, nil for none
    pub fn parent_event_type_id(&self) -> RecordId {
        self.sub_header().parent_event_type_id
    }

    /// Partition the type is defined in
    pub fn partition_id(&self) -> RecordId {
        self.sub_header().partition_id
    }
}

impl PartitionRecord {
    /// Partition number
    pub fn partition_number(&self) -> u16 {
        self.sub_header().reference_number
    }

    /// Partition flags
    pub fn flags(&self) -> u8 {
        self.sub_header().flags
    }

    /// Partition type
    pub fn partition_type_id(&self) -> RecordId {
        self.sub_header().partition_type_id
    }

    /// Parent partition, nil for the root
    pub fn parent_partition_id(&self) -> RecordId {
        self.sub_header().parent_partition_id
    }
}

impl ContentTypeRecord {
    /// Number events use to refer to the content type
    pub fn content_type_number(&self) -> u16 {
        self.sub_header().reference_number
    }

    /// Partition the type is defined in
    pub fn partition_id(&self) -> RecordId {
        self.sub_header().partition_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(name: &str) -> StreamRecord {
        StreamRecord::new(
            Timestamp::from_ticks(638_000_000_000_000_000),
            RecordId::new(),
            256,
            StreamHeader {
                partition_id: RecordId::new(),
                stream_type_id: RecordId::new(),
                reference_number: 1024,
            },
            name,
        )
        .unwrap()
    }

    #[test]
    fn test_stream_record_roundtrip() {
        let record = stream("orders-ü");
        let bytes = record.record().as_bytes().to_vec();
        assert_eq!(bytes.len(), 40 + 40 + "orders-ü".len());
        assert_eq!(&bytes[80..], "orders-ü".as_bytes());

        let decoded = StreamRecord::from_bytes(bytes, &Limits::default()).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.name(), "orders-ü");
        assert_eq!(decoded.stream_number(), 1024);
        assert_eq!(decoded.size_with_length_prefix_and_suffix(), 80 + "orders-ü".len() + 8);
    }

    #[test]
    fn test_kind_mismatch_is_rejected() {
        let bytes = stream("s").record().as_bytes().to_vec();
        assert!(matches!(
            EventTypeRecord::from_bytes(bytes, &Limits::default()),
            Err(Error::InvalidRecordKind { kind: 5, .. })
        ));
    }

    #[test]
    fn test_invalid_utf8_name() {
        let mut bytes = stream("ab").record().as_bytes().to_vec();
        let last = bytes.len() - 1;
        bytes[last] = 0xFF;
        assert!(matches!(
            StreamRecord::from_bytes(bytes, &Limits::default()),
            Err(Error::InvalidString { field: "name", .. })
        ));
    }

    #[test]
    fn test_partition_and_event_type_accessors() {
        let partition = PartitionRecord::new(
            Timestamp::now(),
            RecordId::new(),
            0,
            PartitionHeader {
                partition_type_id: RecordId::new(),
                parent_partition_id: RecordId::nil(),
                flags: 1,
                reference_number: 3,
            },
            "root",
        )
        .unwrap();
        assert_eq!(partition.partition_number(), 3);
        assert_eq!(partition.flags(), 1);
        assert!(partition.parent_partition_id().is_nil());

        let event_type = EventTypeRecord::new(
            Timestamp::now(),
            RecordId::new(),
            0,
            EventTypeHeader {
                parent_event_type_id: RecordId::nil(),
                partition_id: RecordId::new(),
                reference_number: 77,
                event_type_version: 2,
            },
            "OrderPlaced",
        )
        .unwrap();
        let decoded = EventTypeRecord::from_bytes(
            event_type.record().as_bytes().to_vec(),
            &Limits::default(),
        )
        .unwrap();
        assert_eq!(decoded.event_type_number(), 77);
        assert_eq!(decoded.event_type_version(), 2);
        assert_eq!(decoded.name(), "OrderPlaced");
    }

    #[test]
    fn test_content_type_roundtrip() {
        let partition_id = RecordId::new();
        let record = ContentTypeRecord::new(
            Timestamp::now(),
            RecordId::new(),
            128,
            ContentTypeHeader {
                partition_id,
                reference_number: 2,
            },
            "application/json",
        )
        .unwrap();
        let bytes = record.record().as_bytes().to_vec();
        assert_eq!(bytes[0], 9);
        assert_eq!(bytes.len(), 40 + 24 + "application/json".len());

        let decoded = ContentTypeRecord::from_bytes(bytes, &Limits::default()).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.name(), "application/json");
        assert_eq!(decoded.content_type_number(), 2);
        assert_eq!(decoded.partition_id(), partition_id);
    }
}
