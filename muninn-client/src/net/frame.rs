use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;

use crate::error::Error;
use crate::proto::{Header, HEADER_SIZE};

/// One reassembled `header ‖ body` packet.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: Header,
    pub body: Bytes,
}

/// Streaming packet reassembly. Bytes are buffered until a complete
/// `(header, body)` pair is available: a single read may carry several
/// frames and one frame may span many reads. A declared body larger than
/// `max_body` is a protocol error and no partial packet is ever emitted.
#[derive(Debug)]
pub struct FrameCodec {
    max_body: usize,
    pending: Option<Header>,
}

impl FrameCodec {
    pub fn new(max_body: usize) -> FrameCodec {
        FrameCodec { max_body, pending: None }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, Error> {
        let header = match self.pending {
            Some(header) => header,
            None => {
                if src.len() < HEADER_SIZE {
                    return Ok(None);
                }
                let header = Header::decode(src);
                if header.body_length as usize > self.max_body {
                    return Err(Error::Protocol(format!(
                        "frame body of {} bytes exceeds the {} byte limit",
                        header.body_length, self.max_body
                    )));
                }
                self.pending = Some(header);
                header
            }
        };
        if src.len() < header.body_length as usize {
            src.reserve(header.body_length as usize - src.len());
            return Ok(None);
        }
        self.pending = None;
        let body = src.split_to(header.body_length as usize).freeze();
        Ok(Some(Frame { header, body }))
    }
}
