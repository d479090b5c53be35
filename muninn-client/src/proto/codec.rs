//! Pure wire primitives: varint length prefixes, little-endian integers,
//! field and tuple framing. No I/O happens here.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

use super::value::Value;

/// Largest value representable in the 5-byte length prefix.
pub const VARINT_MAX: u64 = (1 << 35) - 1;

/// Append `n` as a base-128 varint, most significant group first; every
/// byte except the last carries the continuation bit.
pub fn put_varint(buf: &mut BytesMut, n: u64) -> Result<()> {
    if n < 1 << 7 {
        buf.put_u8(n as u8);
    } else if n < 1 << 14 {
        buf.put_u8((n >> 7) as u8 | 0x80);
        buf.put_u8(n as u8 & 0x7f);
    } else if n < 1 << 21 {
        buf.put_u8((n >> 14) as u8 | 0x80);
        buf.put_u8((n >> 7) as u8 | 0x80);
        buf.put_u8(n as u8 & 0x7f);
    } else if n < 1 << 28 {
        buf.put_u8((n >> 21) as u8 | 0x80);
        buf.put_u8((n >> 14) as u8 | 0x80);
        buf.put_u8((n >> 7) as u8 | 0x80);
        buf.put_u8(n as u8 & 0x7f);
    } else if n < 1 << 35 {
        buf.put_u8((n >> 28) as u8 | 0x80);
        buf.put_u8((n >> 21) as u8 | 0x80);
        buf.put_u8((n >> 14) as u8 | 0x80);
        buf.put_u8((n >> 7) as u8 | 0x80);
        buf.put_u8(n as u8 & 0x7f);
    } else {
        return Err(Error::Usage(format!("value {n} does not fit in a varint")));
    }
    Ok(())
}

/// Decode a varint; accepts at most 5 bytes.
pub fn get_varint(buf: &mut impl Buf) -> Result<u64> {
    let mut n: u64 = 0;
    for _ in 0..5 {
        if !buf.has_remaining() {
            return Err(Error::Protocol("truncated varint".into()));
        }
        let b = buf.get_u8();
        n = (n << 7) | u64::from(b & 0x7f);
        if b & 0x80 == 0 {
            return Ok(n);
        }
    }
    Err(Error::Protocol("varint longer than 5 bytes".into()))
}

/// Append `<varint length><raw bytes>`.
pub fn put_bytes_field(buf: &mut BytesMut, raw: &[u8]) -> Result<()> {
    put_varint(buf, raw.len() as u64)?;
    buf.put_slice(raw);
    Ok(())
}

/// Append one field; text encodes to UTF-8, integers to 4 or 8
/// little-endian bytes per their variant.
pub fn put_field(buf: &mut BytesMut, value: &Value) -> Result<()> {
    match value {
        Value::Bytes(b) => put_bytes_field(buf, b),
        Value::Str(s) => put_bytes_field(buf, s.as_bytes()),
        Value::U32(n) => {
            put_varint(buf, 4)?;
            buf.put_u32_le(*n);
            Ok(())
        }
        Value::U64(n) => {
            put_varint(buf, 8)?;
            buf.put_u64_le(*n);
            Ok(())
        }
    }
}

/// Append `<u32 cardinality><field>+`.
pub fn put_tuple(buf: &mut BytesMut, values: &[Value]) -> Result<()> {
    buf.put_u32_le(values.len() as u32);
    for value in values {
        put_field(buf, value)?;
    }
    Ok(())
}

/// Split one length-prefixed field off the front of `buf`.
pub fn get_field(buf: &mut Bytes) -> Result<Bytes> {
    let len = get_varint(buf)? as usize;
    if buf.remaining() < len {
        return Err(Error::Protocol("truncated field".into()));
    }
    Ok(buf.split_to(len))
}

/// Decode `<u32 cardinality><field>+` from `buf`.
pub fn get_tuple(buf: &mut Bytes) -> Result<Vec<Bytes>> {
    if buf.remaining() < 4 {
        return Err(Error::Protocol("truncated tuple".into()));
    }
    let cardinality = buf.get_u32_le() as usize;
    let mut fields = Vec::with_capacity(cardinality.min(buf.remaining()));
    for _ in 0..cardinality {
        fields.push(get_field(buf)?);
    }
    Ok(fields)
}
