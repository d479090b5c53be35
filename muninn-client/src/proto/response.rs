use std::fmt;

use bytes::{Buf, Bytes};

use crate::error::{Error, Result};

use super::codec;
use super::request::{Header, OpCode};
use super::value::{decode_text, FieldType, TextErrors, Value};

/// Low byte of `return_code`: 0 = success, 1 = retryable. The error case
/// (2) never reaches a [`Response`]; it is raised as [`Error::Server`].
/// A retryable reply is surfaced to the caller, never retried internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Ok,
    TryAgain,
}

/// A parsed server reply: decoded tuples plus reply metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Op code echoed in the reply header, when recognized.
    pub op: Option<OpCode>,
    pub request_id: u32,
    pub completion: Completion,
    /// Application return code (upper 24 bits of the raw code).
    pub return_code: u32,
    pub return_message: Option<String>,
    /// Rows affected or returned.
    pub rowcount: u32,
    pub rows: Vec<Vec<Value>>,
}

impl Response {
    /// Parse a reply body. `field_types` casts decoded fields by position,
    /// the last entry extending over any remaining fields; an empty slice
    /// keeps raw bytes throughout.
    pub fn parse(
        header: Header,
        body: Bytes,
        field_types: &[FieldType],
        errors: TextErrors,
    ) -> Result<Response> {
        let mut resp = Response {
            op: OpCode::from_raw(header.op),
            request_id: header.request_id,
            completion: Completion::Ok,
            return_code: 0,
            return_message: None,
            rowcount: 0,
            rows: Vec::new(),
        };

        // PING replies carry no body at all
        if body.is_empty() {
            return Ok(resp);
        }

        let mut buf = body.clone();
        if buf.remaining() < 4 {
            return Err(Error::Protocol("truncated response body".into()));
        }
        let raw_code = buf.get_u32_le();
        let status = raw_code & 0xff;
        let code = raw_code >> 8;
        resp.return_code = code;

        match status {
            0 => {}
            1 => {
                resp.completion = Completion::TryAgain;
                if code != 0 {
                    // the tail is a message, not tuples
                    resp.return_message = Some(message_tail(&body, errors)?);
                    return Ok(resp);
                }
            }
            2 => {
                return Err(Error::Server { code, message: message_tail(&body, errors)? });
            }
            other => {
                return Err(Error::Protocol(format!("unknown completion status {other}")));
            }
        }

        if !buf.has_remaining() {
            return Ok(resp);
        }
        if buf.remaining() < 4 {
            return Err(Error::Protocol("truncated response body".into()));
        }
        resp.rowcount = buf.get_u32_le();

        // affected-count-only reply
        if header.body_length == 8 {
            return Ok(resp);
        }

        for _ in 0..resp.rowcount {
            if buf.remaining() < 4 {
                return Err(Error::Protocol("truncated tuple size".into()));
            }
            // tuple_size counts field payload only; the 4-byte cardinality
            // precedes the fields
            let tuple_size = buf.get_u32_le() as usize;
            let total = tuple_size + 4;
            if buf.remaining() < total {
                return Err(Error::Protocol("truncated tuple".into()));
            }
            let mut tuple_buf = buf.split_to(total);
            let raw = codec::get_tuple(&mut tuple_buf)?;
            if tuple_buf.has_remaining() {
                return Err(Error::Protocol("trailing bytes after tuple".into()));
            }
            resp.rows.push(cast_tuple(raw, field_types, errors)?);
        }
        if buf.has_remaining() {
            return Err(Error::Protocol("trailing bytes after last tuple".into()));
        }
        Ok(resp)
    }
}

/// The NUL-terminated message occupying the body after `return_code`;
/// the terminator is always dropped.
fn message_tail(body: &Bytes, errors: TextErrors) -> Result<String> {
    let tail = &body[4..];
    let msg = &tail[..tail.len().saturating_sub(1)];
    decode_text(msg, errors)
}

fn cast_tuple(
    raw: Vec<Bytes>,
    field_types: &[FieldType],
    errors: TextErrors,
) -> Result<Vec<Value>> {
    match field_types.last() {
        None => Ok(raw.into_iter().map(Value::Bytes).collect()),
        Some(last) => raw
            .into_iter()
            .enumerate()
            .map(|(i, b)| field_types.get(i).copied().unwrap_or(*last).cast(b, errors))
            .collect(),
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.op == Some(OpCode::Select) || !self.rows.is_empty() {
            return write!(f, "{:?}", self.rows);
        }
        if self.op == Some(OpCode::Ping) {
            return write!(f, "ping ok");
        }
        let records = if self.rowcount == 1 { "record" } else { "records" };
        match self.op {
            Some(OpCode::Delete) => write!(f, "{} {records} deleted", self.rowcount),
            Some(OpCode::Insert) => write!(f, "{} {records} inserted", self.rowcount),
            Some(OpCode::Update) => write!(f, "{} {records} updated", self.rowcount),
            _ => write!(f, "{} {records} affected", self.rowcount),
        }
    }
}
