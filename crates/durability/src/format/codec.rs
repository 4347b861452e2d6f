//! Sequential field codec for the classic record family.
//!
//! Classic records are encoded field by field: fixed-width little-endian
//! scalars, 7-bit length-prefixed UTF-8 strings, GUID-layout identifiers and
//! `i32` length-prefixed byte buffers. Decoding walks a `Cursor` over the
//! record bytes; running out of bytes is reported as `MalformedLength` with
//! the field that was being read.

use crate::format::bytes::{put_var_u32, var_u32_len};
use crate::format::kind::LogRecordKind;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};
use tflog_core::{Error, Limits, RecordId, Result, Timestamp, RECORD_ID_SIZE};

/// Cursor over classic record bytes with error context.
pub struct FieldReader<'a> {
    cursor: Cursor<&'a [u8]>,
    log_position: i64,
}

impl<'a> FieldReader<'a> {
    /// Create a reader at the start of `bytes`.
    pub fn new(bytes: &'a [u8]) -> Self {
        FieldReader {
            cursor: Cursor::new(bytes),
            log_position: -1,
        }
    }

    /// Attach the record's log position to subsequent errors.
    pub fn set_log_position(&mut self, log_position: i64) {
        self.log_position = log_position;
    }

    /// Log position used in error context.
    pub fn log_position(&self) -> i64 {
        self.log_position
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.cursor.position() as usize
    }

    /// Total length of the underlying buffer.
    pub fn len(&self) -> usize {
        self.cursor.get_ref().len()
    }

    /// True when the underlying buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.cursor.get_ref().is_empty()
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.position())
    }

    fn short(&self, start: usize, needed: usize, field: &'static str) -> Error {
        Error::malformed(self.log_position, start + needed, self.len(), field)
    }

    /// Read a `u8`.
    pub fn read_u8(&mut self, field: &'static str) -> Result<u8> {
        let start = self.position();
        self.cursor.read_u8().map_err(|_| self.short(start, 1, field))
    }

    /// Read a little-endian `u16`.
    pub fn read_u16(&mut self, field: &'static str) -> Result<u16> {
        let start = self.position();
        self.cursor
            .read_u16::<LittleEndian>()
            .map_err(|_| self.short(start, 2, field))
    }

    /// Read a little-endian `i32`.
    pub fn read_i32(&mut self, field: &'static str) -> Result<i32> {
        let start = self.position();
        self.cursor
            .read_i32::<LittleEndian>()
            .map_err(|_| self.short(start, 4, field))
    }

    /// Read a little-endian `i64`.
    pub fn read_i64(&mut self, field: &'static str) -> Result<i64> {
        let start = self.position();
        self.cursor
            .read_i64::<LittleEndian>()
            .map_err(|_| self.short(start, 8, field))
    }

    /// Read a tick timestamp.
    pub fn read_timestamp(&mut self, field: &'static str) -> Result<Timestamp> {
        self.read_i64(field).map(Timestamp::from_ticks)
    }

    /// Read a 16-byte identifier.
    pub fn read_record_id(&mut self, field: &'static str) -> Result<RecordId> {
        let start = self.position();
        let mut bytes = [0u8; RECORD_ID_SIZE];
        self.cursor
            .read_exact(&mut bytes)
            .map_err(|_| self.short(start, RECORD_ID_SIZE, field))?;
        Ok(RecordId::from_wire_bytes(bytes))
    }

    /// Read a 7-bit encoded `u32`.
    pub fn read_var_u32(&mut self, field: &'static str) -> Result<u32> {
        let mut value: u32 = 0;
        for i in 0..5 {
            let byte = self.read_u8(field)?;
            if i == 4 && byte > 0x0F {
                return Err(Error::malformed(self.log_position, 5, 6, field));
            }
            value |= u32::from(byte & 0x7F) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(Error::malformed(self.log_position, 5, 6, field))
    }

    /// Read exactly `len` bytes.
    pub fn read_bytes(&mut self, len: usize, field: &'static str) -> Result<Vec<u8>> {
        let start = self.position();
        if len > self.remaining() {
            return Err(self.short(start, len, field));
        }
        let mut out = vec![0u8; len];
        self.cursor
            .read_exact(&mut out)
            .map_err(|_| self.short(start, len, field))?;
        Ok(out)
    }

    /// Read a 7-bit length-prefixed UTF-8 string.
    pub fn read_string(&mut self, field: &'static str) -> Result<String> {
        let len = self.read_var_u32(field)? as usize;
        let bytes = self.read_bytes(len, field)?;
        String::from_utf8(bytes).map_err(|_| Error::InvalidString {
            field,
            log_position: self.log_position,
        })
    }

    /// Read an `i32` length-prefixed byte buffer.
    ///
    /// Negative lengths are malformed; lengths above the configured maximum
    /// are rejected before any allocation.
    pub fn read_sized_bytes(&mut self, field: &'static str, limits: &Limits) -> Result<Vec<u8>> {
        let len = self.read_i32(field)?;
        if len < 0 {
            return Err(Error::malformed(self.log_position, 0, len as usize, field));
        }
        let len = len as usize;
        limits.check_record_size(len, self.log_position)?;
        self.read_bytes(len, field)
    }

    /// Require that every byte was consumed.
    pub fn finish(&self, detail: &'static str) -> Result<()> {
        if self.position() != self.len() {
            return Err(Error::malformed(
                self.log_position,
                self.len(),
                self.position(),
                detail,
            ));
        }
        Ok(())
    }
}

/// Size of the header shared by classic records: kind, version, log position
pub const CLASSIC_HEADER_SIZE: usize = 1 + 1 + 8;

/// Write the header shared by classic records.
pub fn write_classic_header<W: Write>(
    writer: &mut W,
    kind: LogRecordKind,
    version: u8,
    log_position: i64,
) -> Result<()> {
    writer.write_u8(kind.as_byte())?;
    writer.write_u8(version)?;
    writer.write_i64::<LittleEndian>(log_position)?;
    Ok(())
}

/// Write a 7-bit length-prefixed UTF-8 string.
pub fn write_string<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    let len = u32::try_from(value.len())
        .map_err(|_| Error::InvalidArgument(format!("string of {} bytes", value.len())))?;
    let mut prefix = Vec::with_capacity(5);
    put_var_u32(&mut prefix, len);
    writer.write_all(&prefix)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

/// Write a 16-byte identifier.
pub fn write_record_id<W: Write>(writer: &mut W, id: &RecordId) -> Result<()> {
    writer.write_all(&id.to_wire_bytes())?;
    Ok(())
}

/// Write an `i32` length-prefixed byte buffer.
pub fn write_sized_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    let len = i32::try_from(bytes.len())
        .map_err(|_| Error::InvalidArgument(format!("buffer of {} bytes", bytes.len())))?;
    writer.write_i32::<LittleEndian>(len)?;
    writer.write_all(bytes)?;
    Ok(())
}

/// Encoded size of a string including its 7-bit length prefix.
pub fn string_size_with_length_prefix(byte_len: usize) -> usize {
    var_u32_len(byte_len.min(u32::MAX as usize) as u32) + byte_len
}
