//! Blocking frame reader.
//!
//! Wraps any `std::io::Read` (normally a `TcpStream` with a read timeout
//! set) and yields one complete frame per call. Socket reads go through a
//! scratch buffer that starts small and doubles while reads keep filling
//! it, but never beyond the configured chunk size, so a large bulk reply
//! arrives as a series of bounded reads reassembled by the decoder.

use std::io::{self, Read};

use thiserror::Error;

use crate::decoder::{Decoding, StreamDecoder};
use crate::error::ProtocolError;
use crate::types::Frame;

/// Default upper bound for a single socket read (about 1 MB).
pub const DEFAULT_CHUNK_SIZE: usize = 1_000_000;

const INITIAL_READ_SIZE: usize = 4096;

/// Errors produced while reading a frame.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The peer closed the stream while a reply was expected.
    #[error("closed on remote end")]
    Closed,

    /// The underlying read failed (including read timeouts).
    #[error("error while reading from socket: {0}")]
    Io(#[from] io::Error),

    /// The bytes received were not valid RESP.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Reads frames from a blocking byte source.
#[derive(Debug)]
pub struct FrameReader<R> {
    inner: R,
    decoder: StreamDecoder,
    scratch: Vec<u8>,
    chunk_size: usize,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R, decoding: Decoding, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            inner,
            decoder: StreamDecoder::new(decoding),
            scratch: vec![0u8; INITIAL_READ_SIZE.min(chunk_size)],
            chunk_size,
        }
    }

    /// Reads exactly one frame, blocking until it is complete.
    pub fn read_frame(&mut self) -> Result<Frame, ReadError> {
        loop {
            if let Some(frame) = self.decoder.next_frame()? {
                return Ok(frame);
            }

            let n = match self.inner.read(&mut self.scratch) {
                Ok(0) => return Err(ReadError::Closed),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ReadError::Io(e)),
            };
            self.decoder.feed(&self.scratch[..n]);

            // a full read suggests more is waiting; grow up to the cap
            if n == self.scratch.len() && self.scratch.len() < self.chunk_size {
                let next = (self.scratch.len() * 2).min(self.chunk_size);
                self.scratch.resize(next, 0);
            }
        }
    }

    /// Borrows the underlying source.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }
}
