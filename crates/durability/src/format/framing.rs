//! Length prefix/suffix framing.
//!
//! # Frame Layout
//!
//! ```text
//! ┌─────────────────┬─────────────────────────┬─────────────────┐
//! │ Length (4 bytes)│ Record (Length bytes)   │ Length (4 bytes)│
//! └─────────────────┴─────────────────────────┴─────────────────┘
//! ```
//!
//! The trailing copy of the length lets a reader step backwards from the end
//! of a frame to its start without any index. A frame whose prefix and suffix
//! disagree was torn or corrupted.

use crate::format::bytes::u32_at;
use tflog_core::{Error, Limits, Result};

/// Bytes added around every record by framing
pub const FRAMING_OVERHEAD: usize = 2 * std::mem::size_of::<u32>();

/// Position of the record following one of `length` bytes at `logical_position`.
#[inline]
pub fn next_log_position(logical_position: i64, length: usize) -> i64 {
    logical_position + length as i64 + FRAMING_OVERHEAD as i64
}

/// Position of the record of `length` bytes that ends at `logical_position`.
#[inline]
pub fn prev_log_position(logical_position: i64, length: usize) -> i64 {
    logical_position - length as i64 - FRAMING_OVERHEAD as i64
}

/// Append `record` to `out` with prefix and suffix.
pub fn write_frame(out: &mut Vec<u8>, record: &[u8]) -> Result<()> {
    let len = u32::try_from(record.len())
        .map_err(|_| Error::InvalidArgument(format!("record of {} bytes", record.len())))?;
    out.reserve(record.len() + FRAMING_OVERHEAD);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(record);
    out.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

/// Frame a single record.
pub fn frame(record: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(record.len() + FRAMING_OVERHEAD);
    write_frame(&mut out, record)?;
    Ok(out)
}

/// A frame located inside a larger buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramedRecord<'a> {
    /// Record bytes without prefix or suffix
    pub record: &'a [u8],
    /// Offset of the length prefix
    pub start: usize,
    /// Offset just past the length suffix
    pub end: usize,
}

impl FramedRecord<'_> {
    /// Length of the record without framing.
    pub fn len(&self) -> usize {
        self.record.len()
    }

    /// True for an empty record.
    pub fn is_empty(&self) -> bool {
        self.record.is_empty()
    }
}

/// Read the frame that starts at `offset`.
pub fn read_frame_forward<'a>(
    buf: &'a [u8],
    offset: usize,
    limits: &Limits,
) -> Result<FramedRecord<'a>> {
    let log_position = offset as i64;
    let len = u32_at(buf, offset, log_position, "length prefix")? as usize;
    limits.check_record_size(len, log_position)?;

    let end = offset + len + FRAMING_OVERHEAD;
    if end > buf.len() {
        return Err(Error::malformed(log_position, end, buf.len(), "frame"));
    }
    let suffix = u32_at(buf, end - 4, log_position, "length suffix")? as usize;
    if suffix != len {
        return Err(Error::malformed(
            log_position,
            len,
            suffix,
            "length suffix does not match prefix",
        ));
    }

    Ok(FramedRecord {
        record: &buf[offset + 4..end - 4],
        start: offset,
        end,
    })
}

/// Read the frame that ends at `end`.
pub fn read_frame_backward<'a>(
    buf: &'a [u8],
    end: usize,
    limits: &Limits,
) -> Result<FramedRecord<'a>> {
    if end < FRAMING_OVERHEAD || end > buf.len() {
        return Err(Error::malformed(
            end as i64,
            FRAMING_OVERHEAD,
            end.min(buf.len()),
            "frame end",
        ));
    }
    let len = u32_at(buf, end - 4, end as i64, "length suffix")? as usize;
    limits.check_record_size(len, end as i64)?;

    let start = end
        .checked_sub(len + FRAMING_OVERHEAD)
        .ok_or_else(|| Error::malformed(end as i64, len + FRAMING_OVERHEAD, end, "frame"))?;
    let frame = read_frame_forward(buf, start, limits)?;
    if frame.end != end {
        return Err(Error::malformed(
            start as i64,
            end - start,
            frame.end - start,
            "frame end",
        ));
    }
    Ok(frame)
}
