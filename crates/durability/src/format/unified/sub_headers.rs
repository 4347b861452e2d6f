//! Fixed-size sub-headers of the unified record kinds.
//!
//! | Kind | Version | Size | Layout |
//! |------|---------|------|--------|
//! | System (epoch) | 1 | 32 | prev_epoch_position:i64@0, epoch_number:i32@8, leader_instance_id@16 |
//! | PartitionType | 0 | 16 | partition_id@0 |
//! | StreamType | 0 | 16 | partition_id@0 |
//! | Stream | 0 | 40 | partition_id@0, stream_type_id@16, reference_number:u32@32 |
//! | Partition | 0 | 40 | partition_type_id@0, parent_partition_id@16, flags:u8@32, reference_number:u16@34 |
//! | EventType | 0 | 40 | parent_event_type_id@0, partition_id@16, reference_number:u32@32, event_type_version:u16@36 |
//! | StreamWrite | 0 | 48 | correlation_id@0, stream_number:u32@16, event_count:u16@20, flags:u16@22, expected_version:i64@24, transaction_position:i64@32, transaction_offset:i32@40 |
//! | ContentType | 0 | 24 | partition_id@0, reference_number:u16@16 |
//! | TransactionStart | 0 | 8 | status:u8@0, transaction_type:u8@1, record_count:u32@4 |
//! | TransactionEnd | 0 | 8 | record_count:u32@0 |
//!
//! Gaps in the layouts are reserved and written as zero.

use crate::format::bytes::{i32_at, i64_at, record_id_at, u16_at, u32_at, u8_at};
use crate::format::kind::LogRecordKind;
use tflog_core::{RecordId, Result};

/// Fixed-size sub-header of a unified record kind.
pub trait SubHeader: Sized + Copy + std::fmt::Debug + PartialEq + Eq {
    /// Record kind the sub-header belongs to
    const KIND: LogRecordKind;
    /// Current layout version
    const VERSION: u8;
    /// Size in bytes
    const SIZE: usize;

    /// Parse from exactly `SIZE` bytes.
    fn read(raw: &[u8], log_position: i64) -> Result<Self>;

    /// Write into exactly `SIZE` zeroed bytes.
    fn write(&self, out: &mut [u8]);

    /// Check identifiers that must not be nil.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

fn put_id(out: &mut [u8], offset: usize, id: &RecordId) {
    out[offset..offset + 16].copy_from_slice(&id.to_wire_bytes());
}

/// Epoch sub-header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochHeader {
    /// Position of the previous epoch, -1 for the first
    pub prev_epoch_position: i64,
    /// Epoch number
    pub epoch_number: i32,
    /// Leader that started the epoch (nil if unknown)
    pub leader_instance_id: RecordId,
}

impl SubHeader for EpochHeader {
    const KIND: LogRecordKind = LogRecordKind::System;
    const VERSION: u8 = 1;
    const SIZE: usize = 32;

    fn read(raw: &[u8], log_position: i64) -> Result<Self> {
        Ok(EpochHeader {
            prev_epoch_position: i64_at(raw, 0, log_position, "prev_epoch_position")?,
            epoch_number: i32_at(raw, 8, log_position, "epoch_number")?,
            leader_instance_id: record_id_at(raw, 16, log_position, "leader_instance_id")?,
        })
    }

    fn write(&self, out: &mut [u8]) {
        out[0..8].copy_from_slice(&self.prev_epoch_position.to_le_bytes());
        out[8..12].copy_from_slice(&self.epoch_number.to_le_bytes());
        put_id(out, 16, &self.leader_instance_id);
    }
}

/// Partition type sub-header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionTypeHeader {
    /// Partition the type is defined in
    pub partition_id: RecordId,
}

impl SubHeader for PartitionTypeHeader {
    const KIND: LogRecordKind = LogRecordKind::PartitionType;
    const VERSION: u8 = 0;
    const SIZE: usize = 16;

    fn read(raw: &[u8], log_position: i64) -> Result<Self> {
        Ok(PartitionTypeHeader {
            partition_id: record_id_at(raw, 0, log_position, "partition_id")?,
        })
    }

    fn write(&self, out: &mut [u8]) {
        put_id(out, 0, &self.partition_id);
    }

    fn validate(&self) -> Result<()> {
        self.partition_id.ensure_not_nil("partition_id")
    }
}

/// Stream type sub-header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamTypeHeader {
    /// Partition the type is defined in
    pub partition_id: RecordId,
}

impl SubHeader for StreamTypeHeader {
    const KIND: LogRecordKind = LogRecordKind::StreamType;
    const VERSION: u8 = 0;
    const SIZE: usize = 16;

    fn read(raw: &[u8], log_position: i64) -> Result<Self> {
        Ok(StreamTypeHeader {
            partition_id: record_id_at(raw, 0, log_position, "partition_id")?,
        })
    }

    fn write(&self, out: &mut [u8]) {
        put_id(out, 0, &self.partition_id);
    }

    fn validate(&self) -> Result<()> {
        self.partition_id.ensure_not_nil("partition_id")
    }
}

/// Stream sub-header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    /// Partition the stream lives in
    pub partition_id: RecordId,
    /// Stream type
    pub stream_type_id: RecordId,
    /// Stream number used by stream writes
    pub reference_number: u32,
}

impl SubHeader for StreamHeader {
    const KIND: LogRecordKind = LogRecordKind::Stream;
    const VERSION: u8 = 0;
    const SIZE: usize = 40;

    fn read(raw: &[u8], log_position: i64) -> Result<Self> {
        Ok(StreamHeader {
            partition_id: record_id_at(raw, 0, log_position, "partition_id")?,
            stream_type_id: record_id_at(raw, 16, log_position, "stream_type_id")?,
            reference_number: u32_at(raw, 32, log_position, "reference_number")?,
        })
    }

    fn write(&self, out: &mut [u8]) {
        put_id(out, 0, &self.partition_id);
        put_id(out, 16, &self.stream_type_id);
        out[32..36].copy_from_slice(&self.reference_number.to_le_bytes());
    }

    fn validate(&self) -> Result<()> {
        self.partition_id.ensure_not_nil("partition_id")
    }
}

/// Partition sub-header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionHeader {
    /// Partition type
    pub partition_type_id: RecordId,
    /// Parent partition, nil for the root
    pub parent_partition_id: RecordId,
    /// Partition flags
    pub flags: u8,
    /// Partition number
    pub reference_number: u16,
}

impl SubHeader for PartitionHeader {
    const KIND: LogRecordKind = LogRecordKind::Partition;
    const VERSION: u8 = 0;
    const SIZE: usize = 40;

    fn read(raw: &[u8], log_position: i64) -> Result<Self> {
        Ok(PartitionHeader {
            partition_type_id: record_id_at(raw, 0, log_position, "partition_type_id")?,
            parent_partition_id: record_id_at(raw, 16, log_position, "parent_partition_id")?,
            flags: u8_at(raw, 32, log_position, "flags")?,
            reference_number: u16_at(raw, 34, log_position, "reference_number")?,
        })
    }

    fn write(&self, out: &mut [u8]) {
        put_id(out, 0, &self.partition_type_id);
        put_id(out, 16, &self.parent_partition_id);
        out[32] = self.flags;
        out[34..36].copy_from_slice(&self.reference_number.to_le_bytes());
    }

    fn validate(&self) -> Result<()> {
        self.partition_type_id.ensure_not_nil("partition_type_id")
    }
}

/// Event type sub-header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventTypeHeader {
    /// Parent event type, nil for none
    pub parent_event_type_id: RecordId,
    /// Partition the type is defined in
    pub partition_id: RecordId,
    /// Event type number used by stream writes
    pub reference_number: u32,
    /// Version of the event type
    pub event_type_version: u16,
}

impl SubHeader for EventTypeHeader {
    const KIND: LogRecordKind = LogRecordKind::EventType;
    const VERSION: u8 = 0;
    const SIZE: usize = 40;

    fn read(raw: &[u8], log_position: i64) -> Result<Self> {
        Ok(EventTypeHeader {
            parent_event_type_id: record_id_at(raw, 0, log_position, "parent_event_type_id")?,
            partition_id: record_id_at(raw, 16, log_position, "partition_id")?,
            reference_number: u32_at(raw, 32, log_position, "reference_number")?,
            event_type_version: u16_at(raw, 36, log_position, "event_type_version")?,
        })
    }

    fn write(&self, out: &mut [u8]) {
        put_id(out, 0, &self.parent_event_type_id);
        put_id(out, 16, &self.partition_id);
        out[32..36].copy_from_slice(&self.reference_number.to_le_bytes());
        out[36..38].copy_from_slice(&self.event_type_version.to_le_bytes());
    }

    fn validate(&self) -> Result<()> {
        self.partition_id.ensure_not_nil("partition_id")
    }
}

/// Stream write sub-header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamWriteHeader {
    /// Correlation identifier of the write
    pub correlation_id: RecordId,
    /// Stream written to
    pub stream_number: u32,
    /// Number of events in the payload
    pub event_count: u16,
    /// Prepare flags of the write
    pub flags: u16,
    /// Expected version of the stream
    pub expected_version: i64,
    /// Position of the first record of the transaction
    pub transaction_position: i64,
    /// Offset of the write within its transaction
    pub transaction_offset: i32,
}

impl SubHeader for StreamWriteHeader {
    const KIND: LogRecordKind = LogRecordKind::StreamWrite;
    const VERSION: u8 = 0;
    const SIZE: usize = 48;

    fn read(raw: &[u8], log_position: i64) -> Result<Self> {
        Ok(StreamWriteHeader {
            correlation_id: record_id_at(raw, 0, log_position, "correlation_id")?,
            stream_number: u32_at(raw, 16, log_position, "stream_number")?,
            event_count: u16_at(raw, 20, log_position, "event_count")?,
            flags: u16_at(raw, 22, log_position, "flags")?,
            expected_version: i64_at(raw, 24, log_position, "expected_version")?,
            transaction_position: i64_at(raw, 32, log_position, "transaction_position")?,
            transaction_offset: i32_at(raw, 40, log_position, "transaction_offset")?,
        })
    }

    fn write(&self, out: &mut [u8]) {
        put_id(out, 0, &self.correlation_id);
        out[16..20].copy_from_slice(&self.stream_number.to_le_bytes());
        out[20..22].copy_from_slice(&self.event_count.to_le_bytes());
        out[22..24].copy_from_slice(&self.flags.to_le_bytes());
        out[24..32].copy_from_slice(&self.expected_version.to_le_bytes());
        out[32..40].copy_from_slice(&self.transaction_position.to_le_bytes());
        out[40..44].copy_from_slice(&self.transaction_offset.to_le_bytes());
    }

    fn validate(&self) -> Result<()> {
        self.correlation_id.ensure_not_nil("correlation_id")
    }
}

/// Content type sub-header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentTypeHeader {
    /// Partition the type is defined in
    pub partition_id: RecordId,
    /// Content type number
    pub reference_number: u16,
}

impl SubHeader for ContentTypeHeader {
    const KIND: LogRecordKind = LogRecordKind::ContentType;
    const VERSION: u8 = 0;
    const SIZE: usize = 24;

    fn read(raw: &[u8], log_position: i64) -> Result<Self> {
        Ok(ContentTypeHeader {
            partition_id: record_id_at(raw, 0, log_position, "partition_id")?,
            reference_number: u16_at(raw, 16, log_position, "reference_number")?,
        })
    }

    fn write(&self, out: &mut [u8]) {
        put_id(out, 0, &self.partition_id);
        out[16..18].copy_from_slice(&self.reference_number.to_le_bytes());
    }

    fn validate(&self) -> Result<()> {
        self.partition_id.ensure_not_nil("partition_id")
    }
}

/// Transaction start sub-header. The record id is the transaction id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionStartHeader {
    /// Transaction status
    pub status: u8,
    /// Transaction type
    pub transaction_type: u8,
    /// Number of records in the transaction
    pub record_count: u32,
}

impl SubHeader for TransactionStartHeader {
    const KIND: LogRecordKind = LogRecordKind::TransactionStart;
    const VERSION: u8 = 0;
    const SIZE: usize = 8;

    fn read(raw: &[u8], log_position: i64) -> Result<Self> {
        Ok(TransactionStartHeader {
            status: u8_at(raw, 0, log_position, "status")?,
            transaction_type: u8_at(raw, 1, log_position, "transaction_type")?,
            record_count: u32_at(raw, 4, log_position, "record_count")?,
        })
    }

    fn write(&self, out: &mut [u8]) {
        out[0] = self.status;
        out[1] = self.transaction_type;
        out[4..8].copy_from_slice(&self.record_count.to_le_bytes());
    }
}

/// Transaction end sub-header. The record id is the transaction id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionEndHeader {
    /// Number of records in the transaction
    pub record_count: u32,
}

impl SubHeader for TransactionEndHeader {
    const KIND: LogRecordKind = LogRecordKind::TransactionEnd;
    const VERSION: u8 = 0;
    const SIZE: usize = 8;

    fn read(raw: &[u8], log_position: i64) -> Result<Self> {
        Ok(TransactionEndHeader {
            record_count: u32_at(raw, 0, log_position, "record_count")?,
        })
    }

    fn write(&self, out: &mut [u8]) {
        out[0..4].copy_from_slice(&self.record_count.to_le_bytes());
    }
}
