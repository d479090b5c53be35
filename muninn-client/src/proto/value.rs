use bytes::{Buf, Bytes};
use serde::Deserialize;

use crate::error::{Error, Result};

/// A single tuple element. On the wire every field is an opaque
/// length-prefixed byte string; the variant records the semantic type so
/// encoding is explicit rather than guessed from magnitude.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bytes(Bytes),
    Str(String),
    U32(u32),
    U64(u64),
}

impl Value {
    /// Magnitude-typed integer: values that fit 32 bits become 4-byte
    /// fields, larger ones 8-byte fields. Callers that need a fixed width
    /// use the `U32`/`U64` variants (or raw bytes) directly.
    pub fn integer(n: u64) -> Value {
        if n <= u64::from(u32::MAX) {
            Value::U32(n as u32)
        } else {
            Value::U64(n)
        }
    }

    /// Like [`Value::integer`] but rejects negative input.
    pub fn signed(n: i64) -> Result<Value> {
        if n < 0 {
            return Err(Error::Usage(format!("integer field out of range: {n}")));
        }
        Ok(Value::integer(n as u64))
    }

    /// Raw payload bytes of the field as they appear on the wire.
    pub fn to_wire_bytes(&self) -> Vec<u8> {
        match self {
            Value::Bytes(b) => b.to_vec(),
            Value::Str(s) => s.as_bytes().to_vec(),
            Value::U32(n) => n.to_le_bytes().to_vec(),
            Value::U64(n) => n.to_le_bytes().to_vec(),
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U64(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Value {
        Value::Bytes(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Value {
        Value::Bytes(Bytes::from(b))
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Value {
        Value::Bytes(Bytes::copy_from_slice(b))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Str(s)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Value {
        Value::U32(n)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Value {
        Value::U64(n)
    }
}

/// How invalid UTF-8 in decoded text fields is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextErrors {
    /// Fail the cast with an invalid-data error.
    #[default]
    Strict,
    /// Substitute replacement characters.
    Lossy,
}

pub(crate) fn decode_text(raw: &[u8], errors: TextErrors) -> Result<String> {
    match errors {
        TextErrors::Strict => std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|e| Error::InvalidData(format!("invalid utf-8 in text field: {e}"))),
        TextErrors::Lossy => Ok(String::from_utf8_lossy(raw).into_owned()),
    }
}

/// Per-position cast schema for decoded tuples. A schema shorter than the
/// tuple extends its last entry over the remaining fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Identity: keep the raw bytes.
    Bytes,
    /// 32-bit little-endian unsigned integer; the field must be exactly
    /// 4 bytes long.
    U32,
    /// 64-bit little-endian unsigned integer; the field must be exactly
    /// 8 bytes long.
    U64,
    /// UTF-8 text.
    Str,
}

impl FieldType {
    pub fn cast(self, raw: Bytes, errors: TextErrors) -> Result<Value> {
        match self {
            FieldType::Bytes => Ok(Value::Bytes(raw)),
            FieldType::U32 => {
                if raw.len() != 4 {
                    return Err(Error::InvalidData(format!(
                        "cannot cast field to u32: length must be 4 bytes, field length is {}",
                        raw.len()
                    )));
                }
                let mut raw = raw;
                Ok(Value::U32(raw.get_u32_le()))
            }
            FieldType::U64 => {
                if raw.len() != 8 {
                    return Err(Error::InvalidData(format!(
                        "cannot cast field to u64: length must be 8 bytes, field length is {}",
                        raw.len()
                    )));
                }
                let mut raw = raw;
                Ok(Value::U64(raw.get_u64_le()))
            }
            FieldType::Str => Ok(Value::Str(decode_text(&raw, errors)?)),
        }
    }
}
