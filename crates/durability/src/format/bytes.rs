//! Bounds-checked little-endian field access over raw byte slices.
//!
//! The unified record family and the zero-copy prepare view read fields at
//! computed offsets instead of walking a cursor. Every accessor here checks
//! the range first and decodes explicitly as little-endian, so results do not
//! depend on host byte order or alignment.

use tflog_core::{Error, RecordId, Result, RECORD_ID_SIZE};

/// Borrow `len` bytes at `offset`, or fail with `MalformedLength`.
#[inline]
pub fn slice_at<'a>(
    buf: &'a [u8],
    offset: usize,
    len: usize,
    log_position: i64,
    field: &'static str,
) -> Result<&'a [u8]> {
    let end = offset
        .checked_add(len)
        .ok_or_else(|| Error::malformed(log_position, usize::MAX, buf.len(), field))?;
    buf.get(offset..end)
        .ok_or_else(|| Error::malformed(log_position, end, buf.len(), field))
}

#[inline]
fn array_at<const N: usize>(
    buf: &[u8],
    offset: usize,
    log_position: i64,
    field: &'static str,
) -> Result<[u8; N]> {
    let bytes = slice_at(buf, offset, N, log_position, field)?;
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    Ok(out)
}

/// Read a `u8` at `offset`.
#[inline]
pub fn u8_at(buf: &[u8], offset: usize, log_position: i64, field: &'static str) -> Result<u8> {
    Ok(array_at::<1>(buf, offset, log_position, field)?[0])
}

/// Read a little-endian `u16` at `offset`.
#[inline]
pub fn u16_at(buf: &[u8], offset: usize, log_position: i64, field: &'static str) -> Result<u16> {
    array_at(buf, offset, log_position, field).map(u16::from_le_bytes)
}

/// Read a little-endian `u32` at `offset`.
#[inline]
pub fn u32_at(buf: &[u8], offset: usize, log_position: i64, field: &'static str) -> Result<u32> {
    array_at(buf, offset, log_position, field).map(u32::from_le_bytes)
}

/// Read a little-endian `i32` at `offset`.
#[inline]
pub fn i32_at(buf: &[u8], offset: usize, log_position: i64, field: &'static str) -> Result<i32> {
    array_at(buf, offset, log_position, field).map(i32::from_le_bytes)
}

/// Read a little-endian `i64` at `offset`.
#[inline]
pub fn i64_at(buf: &[u8], offset: usize, log_position: i64, field: &'static str) -> Result<i64> {
    array_at(buf, offset, log_position, field).map(i64::from_le_bytes)
}

/// Read an identifier at `offset`.
#[inline]
pub fn record_id_at(
    buf: &[u8],
    offset: usize,
    log_position: i64,
    field: &'static str,
) -> Result<RecordId> {
    array_at::<RECORD_ID_SIZE>(buf, offset, log_position, field).map(RecordId::from_wire_bytes)
}

/// Decode a 7-bit variable-length `u32` at `offset`.
///
/// Returns the value and the number of bytes it occupied. At most five bytes
/// are read; a fifth byte carrying more than four significant bits overflows.
pub fn var_u32_at(
    buf: &[u8],
    offset: usize,
    log_position: i64,
    field: &'static str,
) -> Result<(u32, usize)> {
    let mut value: u32 = 0;
    for i in 0..5 {
        let byte = u8_at(buf, offset + i, log_position, field)?;
        if i == 4 && byte > 0x0F {
            return Err(Error::malformed(log_position, 5, 6, field));
        }
        value |= u32::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(Error::malformed(log_position, 5, 6, field))
}

/// Number of bytes the 7-bit encoding of `value` occupies.
#[inline]
pub fn var_u32_len(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0xFFF_FFFF => 4,
        _ => 5,
    }
}

/// Append the 7-bit encoding of `value`.
pub fn put_var_u32(out: &mut Vec<u8>, mut value: u32) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn test_roundtrip_any_var_u32(value: u32) {
            let mut buf = Vec::new();
            put_var_u32(&mut buf, value);

            let (decoded, used) = var_u32_at(&buf, 0, 0, "value").unwrap();

            prop_assert_eq!(decoded, value);
            prop_assert_eq!(used, buf.len());
            prop_assert_eq!(var_u32_len(value), buf.len());
        }
    }

    #[test]
    fn test_encode_boundary_values_correctly() {
        let cases: &[(u32, &[u8])] = &[
            (0, &[0x00]),
            (127, &[0x7F]),
            (128, &[0x80, 0x01]),
            (300, &[0xAC, 0x02]),
            (16_384, &[0x80, 0x80, 0x01]),
            (u32::MAX, &[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]),
        ];
        for (value, expected) in cases {
            let mut buf = Vec::new();
            put_var_u32(&mut buf, *value);
            assert_eq!(buf.as_slice(), *expected, "value {}", value);
        }
    }

    #[test]
    fn test_fail_on_overlong_var_u32() {
        let buf = [0xFF, 0xFF, 0xFF, 0xFF, 0x1F];
        assert!(matches!(
            var_u32_at(&buf, 0, 0, "len"),
            Err(Error::MalformedLength { .. })
        ));
    }

    #[test]
    fn test_fail_on_truncated_var_u32() {
        let buf = [0x80, 0x80];
        assert!(matches!(
            var_u32_at(&buf, 0, 0, "len"),
            Err(Error::MalformedLength { .. })
        ));
    }

    #[test]
    fn test_read_little_endian_regardless_of_alignment() {
        let buf = [0xAA, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        assert_eq!(u16_at(&buf, 1, 0, "x").unwrap(), 0x0201);
        assert_eq!(u32_at(&buf, 1, 0, "x").unwrap(), 0x0403_0201);
        assert_eq!(i64_at(&buf, 1, 0, "x").unwrap(), 0x0807_0605_0403_0201);
    }

    #[test]
    fn test_fail_out_of_bounds() {
        let buf = [0u8; 4];
        let err = i64_at(&buf, 0, 99, "log_position").unwrap_err();
        match err {
            Error::MalformedLength {
                log_position,
                expected,
                actual,
                ..
            } => {
                assert_eq!(log_position, 99);
                assert_eq!(expected, 8);
                assert_eq!(actual, 4);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(slice_at(&buf, usize::MAX, 2, 0, "x").is_err());
    }
}
