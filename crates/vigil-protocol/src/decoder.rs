//! Streaming reply decoder.
//!
//! [`StreamDecoder`] accepts raw socket bytes as they arrive and hands
//! back completed frames. It owns the buffering that a one-shot
//! [`parse_frame`](crate::parse_frame) call leaves to the caller, so a
//! connection only has to feed it whatever each read returned.

use bytes::{Buf, BytesMut};

use crate::error::ProtocolError;
use crate::parse::parse_frame;
use crate::types::Frame;

/// How string payloads are treated once a frame is complete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Decoding {
    /// Bulk strings are kept as raw bytes. Status and error lines are
    /// always text and must be UTF-8 in either mode.
    #[default]
    Raw,
    /// Every bulk string must be valid UTF-8. A frame containing one that
    /// isn't fails as a whole; nothing is replaced.
    Utf8,
}

/// Incremental decoder: feed bytes in, pull frames out.
#[derive(Debug)]
pub struct StreamDecoder {
    buf: BytesMut,
    decoding: Decoding,
}

impl StreamDecoder {
    pub fn new(decoding: Decoding) -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
            decoding,
        }
    }

    /// Appends raw bytes received from the socket.
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Returns the next complete frame, or `None` if more data is needed.
    ///
    /// On error the buffered bytes are discarded: a malformed stream
    /// cannot be resynchronized.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        match parse_frame(&self.buf) {
            Ok(Some((frame, consumed))) => {
                self.buf.advance(consumed);
                if self.decoding == Decoding::Utf8 {
                    validate_utf8(&frame)?;
                }
                Ok(Some(frame))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                self.buf.clear();
                Err(e)
            }
        }
    }

    /// Number of bytes buffered but not yet decoded.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

fn validate_utf8(frame: &Frame) -> Result<(), ProtocolError> {
    match frame {
        Frame::Bulk(data) => std::str::from_utf8(data)
            .map(|_| ())
            .map_err(|_| ProtocolError::InvalidUtf8("bulk string")),
        Frame::Array(items) => items.iter().try_for_each(validate_utf8),
        _ => Ok(()),
    }
}
