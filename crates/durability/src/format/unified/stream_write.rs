//! Unified stream write records.
//!
//! # Payload Layout
//!
//! The payload is `event_count` events back to back:
//!
//! ```text
//! ┌──────────────────────────┬──────────────┬──────────────────┐
//! │ Event header (40 bytes)  │ data         │ metadata         │
//! └──────────────────────────┴──────────────┴──────────────────┘
//!
//! Event header:
//! event_size:i32@0  event_type_number:u32@4  flags:u16@8  data_size:i32@12
//! event_id@16  metadata_size:i32@32
//! ```
//!
//! `event_size` covers the event header and both buffers.

use super::sub_headers::StreamWriteHeader;
use super::UnifiedRecord;
use crate::format::bytes::{i32_at, record_id_at, u16_at, u32_at};
use crate::format::contract::{EventTypeRef, PrepareRecord, StreamRef};
use crate::format::kind::LogRecordKind;
use crate::format::prepare::PrepareFlags;
use std::io::Write;
use std::ops::Range;
use tflog_core::{Error, Limits, RecordId, Result, Timestamp};

/// Size of the per-event header
pub const EVENT_HEADER_SIZE: usize = 40;

/// One event of a stream write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamWriteEvent<'a> {
    /// Event type number
    pub event_type_number: u32,
    /// Event flags
    pub flags: u16,
    /// Event identifier
    pub event_id: RecordId,
    /// Event data
    pub data: &'a [u8],
    /// Event metadata
    pub metadata: &'a [u8],
}

impl StreamWriteEvent<'_> {
    fn encoded_len(&self) -> usize {
        EVENT_HEADER_SIZE + self.data.len() + self.metadata.len()
    }

    fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        let too_large = |what: &str, len: usize| {
            Error::InvalidArgument(format!("event {} of {} bytes", what, len))
        };
        let event_size = i32::try_from(self.encoded_len())
            .map_err(|_| too_large("size", self.encoded_len()))?;
        let data_size =
            i32::try_from(self.data.len()).map_err(|_| too_large("data", self.data.len()))?;
        let metadata_size = i32::try_from(self.metadata.len())
            .map_err(|_| too_large("metadata", self.metadata.len()))?;

        let mut header = [0u8; EVENT_HEADER_SIZE];
        header[0..4].copy_from_slice(&event_size.to_le_bytes());
        header[4..8].copy_from_slice(&self.event_type_number.to_le_bytes());
        header[8..10].copy_from_slice(&self.flags.to_le_bytes());
        header[12..16].copy_from_slice(&data_size.to_le_bytes());
        header[16..32].copy_from_slice(&self.event_id.to_wire_bytes());
        header[32..36].copy_from_slice(&metadata_size.to_le_bytes());

        out.extend_from_slice(&header);
        out.extend_from_slice(self.data);
        out.extend_from_slice(self.metadata);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct EventEntry {
    event_type_number: u32,
    flags: u16,
    event_id: RecordId,
    data: Range<usize>,
    metadata: Range<usize>,
}

/// Unified record writing one or more events to a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamWriteRecord {
    record: UnifiedRecord<StreamWriteHeader>,
    events: Vec<EventEntry>,
}

impl StreamWriteRecord {
    /// Create a stream write. `event_count` is taken from `events`.
    pub fn new(
        timestamp: Timestamp,
        log_position: i64,
        mut sub_header: StreamWriteHeader,
        events: &[StreamWriteEvent<'_>],
    ) -> Result<Self> {
        if events.is_empty() {
            return Err(Error::InvalidArgument(
                "stream write needs at least one event".to_string(),
            ));
        }
        sub_header.event_count = u16::try_from(events.len())
            .map_err(|_| Error::InvalidArgument(format!("{} events in one write", events.len())))?;
        check_transaction(&sub_header)?;

        let mut payload = Vec::with_capacity(events.iter().map(|e| e.encoded_len()).sum());
        for event in events {
            event.event_id.ensure_not_nil("event_id")?;
            event.write_to(&mut payload)?;
        }

        let record =
            UnifiedRecord::new(timestamp, RecordId::new(), log_position, sub_header, &payload)?;
        Self::from_record(record)
    }

    /// Take ownership of record bytes and index the events.
    pub fn from_bytes(bytes: Vec<u8>, limits: &Limits) -> Result<Self> {
        Self::from_record(UnifiedRecord::from_bytes(bytes, limits)?)
    }

    fn from_record(record: UnifiedRecord<StreamWriteHeader>) -> Result<Self> {
        let bytes = record.as_bytes();
        let log_position = record.log_position();
        let count = record.sub_header().event_count as usize;
        if count == 0 {
            return Err(Error::malformed(
                log_position,
                EVENT_HEADER_SIZE,
                0,
                "stream write without events",
            ));
        }

        let mut events = Vec::with_capacity(count);
        let mut offset = UnifiedRecord::<StreamWriteHeader>::PAYLOAD_OFFSET;
        for _ in 0..count {
            let event_size = i32_at(bytes, offset, log_position, "event_size")?;
            let data_size = i32_at(bytes, offset + 12, log_position, "data_size")?;
            let metadata_size = i32_at(bytes, offset + 32, log_position, "metadata_size")?;
            if data_size < 0 || metadata_size < 0 {
                return Err(Error::malformed(
                    log_position,
                    0,
                    data_size.min(metadata_size) as usize,
                    "negative event buffer size",
                ));
            }
            let expected = EVENT_HEADER_SIZE + data_size as usize + metadata_size as usize;
            if event_size < 0 || event_size as usize != expected {
                return Err(Error::malformed(
                    log_position,
                    expected,
                    event_size as usize,
                    "event_size",
                ));
            }
            if offset + expected > bytes.len() {
                return Err(Error::malformed(
                    log_position,
                    offset + expected,
                    bytes.len(),
                    "event",
                ));
            }

            let data_start = offset + EVENT_HEADER_SIZE;
            let metadata_start = data_start + data_size as usize;
            events.push(EventEntry {
                event_type_number: u32_at(bytes, offset + 4, log_position, "event_type_number")?,
                flags: u16_at(bytes, offset + 8, log_position, "event_flags")?,
                event_id: record_id_at(bytes, offset + 16, log_position, "event_id")?,
                data: data_start..metadata_start,
                metadata: metadata_start..metadata_start + metadata_size as usize,
            });
            offset += expected;
        }
        if offset != bytes.len() {
            return Err(Error::malformed(
                log_position,
                offset,
                bytes.len(),
                "stream write payload",
            ));
        }
        for event in &events {
            event.event_id.ensure_not_nil("event_id")?;
        }

        Ok(StreamWriteRecord { record, events })
    }

    fn event_at(&self, entry: &EventEntry) -> StreamWriteEvent<'_> {
        let bytes = self.record.as_bytes();
        StreamWriteEvent {
            event_type_number: entry.event_type_number,
            flags: entry.flags,
            event_id: entry.event_id,
            data: &bytes[entry.data.clone()],
            metadata: &bytes[entry.metadata.clone()],
        }
    }

    fn first(&self) -> &EventEntry {
        // construction and decoding both reject empty writes
        &self.events[0]
    }

    /// Events in write order
    pub fn events(&self) -> impl Iterator<Item = StreamWriteEvent<'_>> + '_ {
        self.events.iter().map(move |e| self.event_at(e))
    }

    /// Number of events
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Underlying record
    pub fn record(&self) -> &UnifiedRecord<StreamWriteHeader> {
        &self.record
    }

    /// Typed sub-header
    pub fn sub_header(&self) -> &StreamWriteHeader {
        self.record.sub_header()
    }

    /// Stream written to
    pub fn stream_number(&self) -> u32 {
        self.sub_header().stream_number
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

    /// Write identifier
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

    /// Copy for a new position after a failed append.
    ///
    /// Record id, timestamp, transaction offset and events are kept. The
    /// copy is checked against `limits`.
    pub fn copy_for_retry(
        &self,
        log_position: i64,
        transaction_position: i64,
        limits: &Limits,
    ) -> Result<Self> {
        let sub_header = StreamWriteHeader {
            transaction_position,
            ..*self.sub_header()
        };
        check_transaction(&sub_header)?;
        let record = UnifiedRecord::new(
            self.timestamp(),
            self.record_id(),
            log_position,
            sub_header,
            self.record.payload(),
        )?;
        limits.check_record_size(record.as_bytes().len(), log_position)?;
        Self::from_record(record)
    }
}

fn check_transaction(sub_header: &StreamWriteHeader) -> Result<()> {
    if sub_header.transaction_position < 0 {
        return Err(Error::InvalidArgument(format!(
            "transaction position {} is negative",
            sub_header.transaction_position
        )));
    }
    if sub_header.transaction_offset < -1 {
        return Err(Error::InvalidArgument(format!(
            "transaction offset {} is below -1",
            sub_header.transaction_offset
        )));
    }
    Ok(())
}

impl PrepareRecord for StreamWriteRecord {
    fn log_position(&self) -> i64 {
        self.record.log_position()
    }

    fn flags(&self) -> PrepareFlags {
        PrepareFlags::from_bits(self.sub_header().flags)
    }

    fn transaction_position(&self) -> i64 {
        self.sub_header().transaction_position
    }

    fn transaction_offset(&self) -> i32 {
        self.sub_header().transaction_offset
    }

    fn expected_version(&self) -> i64 {
        self.sub_header().expected_version
    }

    fn event_stream(&self) -> StreamRef<'_> {
        StreamRef::Number(self.sub_header().stream_number)
    }

    fn event_id(&self) -> RecordId {
        self.first().event_id
    }

    fn correlation_id(&self) -> RecordId {
        self.sub_header().correlation_id
    }

    fn timestamp(&self) -> Timestamp {
        self.record.timestamp()
    }

    fn event_type_ref(&self) -> EventTypeRef<'_> {
        EventTypeRef::Number(self.first().event_type_number)
    }

    fn data(&self) -> &[u8] {
        if self.flags().has_any_of(PrepareFlags::IS_REDACTED) {
            return &[];
        }
        &self.record.as_bytes()[self.first().data.clone()]
    }

    fn metadata(&self) -> &[u8] {
        &self.record.as_bytes()[self.first().metadata.clone()]
    }

    fn copy_for_retry(
        &self,
        log_position: i64,
        transaction_position: i64,
        limits: &Limits,
    ) -> Result<Self> {
        StreamWriteRecord::copy_for_retry(self, log_position, transaction_position, limits)
    }
}
