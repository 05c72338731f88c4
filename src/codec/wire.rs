//! Primitive AMQP wire types.
//!
//! All integers are big-endian. Strings come in two sizes:
//! - short string: 1-byte length + up to 255 bytes of UTF-8
//! - long string: 4-byte length + arbitrary bytes

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::error::{DecodeError, DecodeResult};

/// Longest payload a short string can carry.
pub const SHORT_STR_MAX: usize = u8::MAX as usize;

pub(crate) fn ensure(buf: &Bytes, needed: usize) -> DecodeResult<()> {
    if buf.remaining() < needed {
        return Err(DecodeError::Truncated {
            needed,
            available: buf.remaining(),
        });
    }
    Ok(())
}

pub(crate) fn get_u8(buf: &mut Bytes) -> DecodeResult<u8> {
    ensure(buf, 1)?;
    Ok(buf.get_u8())
}

pub(crate) fn get_u16(buf: &mut Bytes) -> DecodeResult<u16> {
    ensure(buf, 2)?;
    Ok(buf.get_u16())
}

pub(crate) fn get_u32(buf: &mut Bytes) -> DecodeResult<u32> {
    ensure(buf, 4)?;
    Ok(buf.get_u32())
}

pub(crate) fn get_u64(buf: &mut Bytes) -> DecodeResult<u64> {
    ensure(buf, 8)?;
    Ok(buf.get_u64())
}

/// Read a short string (octet length prefix, UTF-8 body).
pub(crate) fn get_short_str(buf: &mut Bytes) -> DecodeResult<String> {
    let len = get_u8(buf)? as usize;
    ensure(buf, len)?;
    let raw = buf.split_to(len);
    String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
}

/// Read a long string as raw bytes (u32 length prefix).
pub(crate) fn get_long_bytes(buf: &mut Bytes) -> DecodeResult<Bytes> {
    let len = get_u32(buf)? as usize;
    ensure(buf, len)?;
    Ok(buf.split_to(len))
}

/// Read a long string that must be valid UTF-8 (mechanism and locale lists).
pub(crate) fn get_long_str(buf: &mut Bytes) -> DecodeResult<String> {
    let raw = get_long_bytes(buf)?;
    String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::InvalidUtf8)
}

/// Write a short string.
///
/// Values longer than 255 bytes are cut at the last char boundary that fits;
/// callers validate user-supplied short strings before they reach the codec.
pub(crate) fn put_short_str(buf: &mut BytesMut, value: &str) {
    let mut end = value.len().min(SHORT_STR_MAX);
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    buf.put_u8(end as u8);
    buf.put_slice(&value.as_bytes()[..end]);
}

pub(crate) fn put_long_bytes(buf: &mut BytesMut, value: &[u8]) {
    buf.put_u32(value.len() as u32);
    buf.put_slice(value);
}
