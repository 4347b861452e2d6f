//! Classic system records.
//!
//! System records carry cluster bookkeeping; the only kind in use is the
//! epoch, serialized as JSON (see [`crate::format::epoch`]).
//!
//! # Layout (after the classic header)
//!
//! ```text
//! timestamp:i64  system_record_type:u8  serialization:u8  reserved:i64
//! data_len:i32  data
//! ```

use crate::format::codec::{write_classic_header, write_sized_bytes, FieldReader, CLASSIC_HEADER_SIZE};
use crate::format::framing::FRAMING_OVERHEAD;
use crate::format::kind::LogRecordKind;
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;
use tflog_core::{Error, Limits, Result, Timestamp};

/// Only supported system record version
pub const SYSTEM_RECORD_VERSION: u8 = 0;

/// Kind of a system record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemRecordType {
    /// Not a valid system record
    Invalid,
    /// Epoch (leadership term) record
    Epoch,
    /// Byte not assigned to a known kind, kept as read
    Unknown(u8),
}

impl SystemRecordType {
    /// Parse a type byte.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => SystemRecordType::Invalid,
            1 => SystemRecordType::Epoch,
            other => SystemRecordType::Unknown(other),
        }
    }

    /// Type byte
    pub fn as_byte(self) -> u8 {
        match self {
            SystemRecordType::Invalid => 0,
            SystemRecordType::Epoch => 1,
            SystemRecordType::Unknown(byte) => byte,
        }
    }
}

/// Serialization of a system record payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemRecordSerialization {
    /// Not a valid serialization
    Invalid,
    /// Binary payload
    Binary,
    /// JSON payload
    Json,
    /// BSON payload
    Bson,
    /// Byte not assigned to a known serialization, kept as read
    Unknown(u8),
}

impl SystemRecordSerialization {
    /// Parse a serialization byte.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => SystemRecordSerialization::Invalid,
            1 => SystemRecordSerialization::Binary,
            2 => SystemRecordSerialization::Json,
            3 => SystemRecordSerialization::Bson,
            other => SystemRecordSerialization::Unknown(other),
        }
    }

    /// Serialization byte
    pub fn as_byte(self) -> u8 {
        match self {
            SystemRecordSerialization::Invalid => 0,
            SystemRecordSerialization::Binary => 1,
            SystemRecordSerialization::Json => 2,
            SystemRecordSerialization::Bson => 3,
            SystemRecordSerialization::Unknown(byte) => byte,
        }
    }
}

/// Classic system record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemLogRecord {
    log_position: i64,
    timestamp: Timestamp,
    system_record_type: SystemRecordType,
    serialization: SystemRecordSerialization,
    reserved: i64,
    data: Vec<u8>,
}

impl SystemLogRecord {
    /// Create a system record.
    pub fn new(
        log_position: i64,
        timestamp: Timestamp,
        system_record_type: SystemRecordType,
        serialization: SystemRecordSerialization,
        data: impl Into<Vec<u8>>,
    ) -> Result<Self> {
        if log_position < 0 {
            return Err(Error::InvalidArgument(format!(
                "log position {} is negative",
                log_position
            )));
        }
        Ok(SystemLogRecord {
            log_position,
            timestamp,
            system_record_type,
            serialization,
            reserved: 0,
            data: data.into(),
        })
    }

    /// Decode the body of a system record whose header has been read.
    pub fn decode(
        reader: &mut FieldReader<'_>,
        version: u8,
        log_position: i64,
        limits: &Limits,
    ) -> Result<Self> {
        if version != SYSTEM_RECORD_VERSION {
            return Err(Error::UnsupportedVersion {
                kind: "System",
                version,
                log_position,
            });
        }
        reader.set_log_position(log_position);

        let timestamp = reader.read_timestamp("timestamp")?;
        let system_record_type = SystemRecordType::from_byte(reader.read_u8("system_record_type")?);
        let serialization = SystemRecordSerialization::from_byte(reader.read_u8("serialization")?);
        let reserved = reader.read_i64("reserved")?;
        let data = reader.read_sized_bytes("data", limits)?;

        Ok(SystemLogRecord {
            log_position,
            timestamp,
            system_record_type,
            serialization,
            reserved,
            data,
        })
    }

    /// Encode the record, header included, without framing.
    pub fn encode<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_classic_header(
            writer,
            LogRecordKind::System,
            SYSTEM_RECORD_VERSION,
            self.log_position,
        )?;
        writer.write_i64::<LittleEndian>(self.timestamp.ticks())?;
        writer.write_u8(self.system_record_type.as_byte())?;
        writer.write_u8(self.serialization.as_byte())?;
        writer.write_i64::<LittleEndian>(self.reserved)?;
        write_sized_bytes(writer, &self.data)?;
        Ok(())
    }

    /// Encoded length without framing.
    pub fn encoded_len(&self) -> usize {
        CLASSIC_HEADER_SIZE + 8 + 1 + 1 + 8 + 4 + self.data.len()
    }

    /// Encoded length including the length prefix and suffix.
    pub fn size_with_length_prefix_and_suffix(&self) -> usize {
        self.encoded_len() + FRAMING_OVERHEAD
    }

    /// Record version
    pub fn version(&self) -> u8 {
        SYSTEM_RECORD_VERSION
    }

    /// Position of the record in the log
    pub fn log_position(&self) -> i64 {
        self.log_position
    }

    /// Creation time
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Kind of system record
    pub fn system_record_type(&self) -> SystemRecordType {
        self.system_record_type
    }

    /// Payload serialization
    pub fn serialization(&self) -> SystemRecordSerialization {
        self.serialization
    }

    /// Reserved field, zero when written by this codec
    pub fn reserved(&self) -> i64 {
        self.reserved
    }

    /// Payload bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
