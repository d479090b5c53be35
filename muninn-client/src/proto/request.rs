use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

use super::codec;
use super::value::Value;

/// Byte length of the fixed `op ‖ body_length ‖ request_id` header.
pub const HEADER_SIZE: usize = 12;

/// PING replies always carry this id; the ping lane is FIFO-ordered.
pub const PING_REQUEST_ID: u32 = 0;

/// Server echoes the affected tuple in the reply.
pub const FLAG_RETURN: u32 = 0x01;
/// Fail if the primary key already exists.
pub const FLAG_ADD: u32 = 0x02;
/// Fail if the primary key is absent.
pub const FLAG_REPLACE: u32 = 0x04;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum OpCode {
    Insert = 13,
    Select = 17,
    Update = 19,
    Delete = 21,
    Call = 22,
    Ping = 65280,
}

impl OpCode {
    pub fn from_raw(raw: u32) -> Option<OpCode> {
        match raw {
            13 => Some(OpCode::Insert),
            17 => Some(OpCode::Select),
            19 => Some(OpCode::Update),
            21 => Some(OpCode::Delete),
            22 => Some(OpCode::Call),
            65280 => Some(OpCode::Ping),
            _ => None,
        }
    }
}

/// Fixed frame header: `u32 op ‖ u32 body_length ‖ u32 request_id`, all
/// little-endian. `body_length` counts the bytes after the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub op: u32,
    pub body_length: u32,
    pub request_id: u32,
}

impl Header {
    pub fn decode(buf: &mut impl Buf) -> Header {
        Header {
            op: buf.get_u32_le(),
            body_length: buf.get_u32_le(),
            request_id: buf.get_u32_le(),
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.op);
        buf.put_u32_le(self.body_length);
        buf.put_u32_le(self.request_id);
    }
}

/// One `(field_no, op, argument)` update operation.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOp {
    pub field_no: u32,
    pub kind: UpdateOpKind,
    pub arg: Value,
}

impl UpdateOp {
    pub fn new(field_no: u32, kind: UpdateOpKind, arg: impl Into<Value>) -> UpdateOp {
        UpdateOp { field_no, kind, arg: arg.into() }
    }

    /// Build from the textual op symbol (`=`, `+`, `&`, `^`, `|`,
    /// `splice`, `#`, `!`).
    pub fn from_symbol(field_no: u32, symbol: &str, arg: impl Into<Value>) -> Result<UpdateOp> {
        Ok(UpdateOp { field_no, kind: UpdateOpKind::from_symbol(symbol)?, arg: arg.into() })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum UpdateOpKind {
    /// Assign; extends the tuple by one when `field_no` is one past the
    /// last field.
    Assign = 0,
    /// Signed 32- or 64-bit integer add.
    Add = 1,
    And = 2,
    Xor = 3,
    Or = 4,
    Splice = 5,
    /// Delete the field.
    Delete = 6,
    /// Insert before the field.
    InsertBefore = 7,
}

impl UpdateOpKind {
    pub fn from_symbol(symbol: &str) -> Result<UpdateOpKind> {
        match symbol {
            "=" => Ok(UpdateOpKind::Assign),
            "+" => Ok(UpdateOpKind::Add),
            "&" => Ok(UpdateOpKind::And),
            "^" => Ok(UpdateOpKind::Xor),
            "|" => Ok(UpdateOpKind::Or),
            "splice" => Ok(UpdateOpKind::Splice),
            "#" => Ok(UpdateOpKind::Delete),
            "!" => Ok(UpdateOpKind::InsertBefore),
            _ => Err(Error::Usage(format!("invalid update op symbol '{symbol}'"))),
        }
    }
}

/// One client request; [`Request::encode`] produces the full
/// `header ‖ body` frame for a given request id.
#[derive(Debug, Clone, PartialEq)]
pub enum Request<'a> {
    Ping,
    Insert { space: u32, flags: u32, tuple: &'a [Value] },
    Select { space: u32, index: u32, offset: u32, limit: u32, key: &'a [Value] },
    Update { space: u32, flags: u32, key: &'a [Value], ops: &'a [UpdateOp] },
    Delete { space: u32, flags: u32, key: &'a [Value] },
    Call { flags: u32, proc: &'a str, args: &'a [Value] },
}

impl Request<'_> {
    pub fn op(&self) -> OpCode {
        match self {
            Request::Ping => OpCode::Ping,
            Request::Insert { .. } => OpCode::Insert,
            Request::Select { .. } => OpCode::Select,
            Request::Update { .. } => OpCode::Update,
            Request::Delete { .. } => OpCode::Delete,
            Request::Call { .. } => OpCode::Call,
        }
    }

    pub fn encode(&self, request_id: u32) -> Result<Bytes> {
        let mut body = BytesMut::new();
        match self {
            Request::Ping => {}
            Request::Insert { space, flags, tuple } => {
                body.put_u32_le(*space);
                body.put_u32_le(*flags);
                codec::put_tuple(&mut body, tuple)?;
            }
            Request::Select { space, index, offset, limit, key } => {
                body.put_u32_le(*space);
                body.put_u32_le(*index);
                body.put_u32_le(*offset);
                body.put_u32_le(*limit);
                // key count; this request shape always carries one key
                body.put_u32_le(1);
                codec::put_tuple(&mut body, key)?;
            }
            Request::Update { space, flags, key, ops } => {
                body.put_u32_le(*space);
                body.put_u32_le(*flags);
                codec::put_tuple(&mut body, key)?;
                body.put_u32_le(ops.len() as u32);
                for op in *ops {
                    body.put_u32_le(op.field_no);
                    body.put_u8(op.kind as u8);
                    codec::put_field(&mut body, &op.arg)?;
                }
            }
            Request::Delete { space, flags, key } => {
                body.put_u32_le(*space);
                body.put_u32_le(*flags);
                codec::put_tuple(&mut body, key)?;
            }
            Request::Call { flags, proc, args } => {
                body.put_u32_le(*flags);
                codec::put_bytes_field(&mut body, proc.as_bytes())?;
                codec::put_tuple(&mut body, args)?;
            }
        }
        let mut frame = BytesMut::with_capacity(HEADER_SIZE + body.len());
        let header = Header {
            op: self.op() as u32,
            body_length: body.len() as u32,
            request_id,
        };
        header.encode(&mut frame);
        frame.extend_from_slice(&body);
        Ok(frame.freeze())
    }
}
