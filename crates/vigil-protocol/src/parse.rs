//! One-shot RESP parsing over a byte slice.
//!
//! [`parse_frame`] never consumes its input. It either returns a frame
//! together with the number of bytes it occupied, or reports that the
//! buffer ends mid-frame so the caller can read more and try again from
//! the same start. Only RESP2 reply types are recognised.

use std::io::Cursor;

use bytes::Bytes;

use crate::error::ProtocolError;
use crate::types::Frame;

/// Arrays nested deeper than this are rejected.
const MAX_DEPTH: usize = 64;

const MAX_ELEMENTS: i64 = 1 << 20;

/// Largest bulk payload accepted (512 MiB).
const MAX_BULK: i64 = 512 << 20;

// upfront reservation for arrays; larger ones grow as elements arrive
const RESERVE_LIMIT: usize = 1024;

/// Parses the first frame in `buf`.
///
/// `Ok(None)` means the frame is not complete yet. Any error means the
/// stream is corrupt.
pub fn parse_frame(buf: &[u8]) -> Result<Option<(Frame, usize)>, ProtocolError> {
    let mut scanner = Scanner::new(buf);
    match scanner.frame(0) {
        Ok(frame) => Ok(Some((frame, scanner.offset()))),
        Err(ProtocolError::Incomplete) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Walks a buffer front to back, building frames as it validates them.
struct Scanner<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> Scanner<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(buf),
        }
    }

    fn offset(&self) -> usize {
        self.cursor.position() as usize
    }

    fn rest(&self) -> &'a [u8] {
        let buf: &'a [u8] = *self.cursor.get_ref();
        &buf[self.offset().min(buf.len())..]
    }

    fn advance(&mut self, n: usize) {
        self.cursor.set_position((self.offset() + n) as u64);
    }

    fn frame(&mut self, depth: usize) -> Result<Frame, ProtocolError> {
        let tag = *self.rest().first().ok_or(ProtocolError::Incomplete)?;
        self.advance(1);

        match tag {
            b'+' => self.text("simple string").map(Frame::Simple),
            b'-' => self.text("error string").map(Frame::Error),
            b':' => self.integer().map(Frame::Integer),
            b'$' => match self.length()? {
                None => Ok(Frame::Null),
                Some(len) if len > MAX_BULK => {
                    Err(ProtocolError::BulkStringTooLarge(len as usize))
                }
                Some(len) => self.bulk(len as usize),
            },
            b'*' => {
                if depth >= MAX_DEPTH {
                    return Err(ProtocolError::NestingTooDeep(MAX_DEPTH));
                }
                match self.length()? {
                    None => Ok(Frame::NullArray),
                    Some(n) if n > MAX_ELEMENTS => {
                        Err(ProtocolError::TooManyElements(n as usize))
                    }
                    Some(n) => {
                        let n = n as usize;
                        let mut items = Vec::with_capacity(n.min(RESERVE_LIMIT));
                        for _ in 0..n {
                            items.push(self.frame(depth + 1)?);
                        }
                        Ok(Frame::Array(items))
                    }
                }
            }
            other => Err(ProtocolError::InvalidPrefix(other)),
        }
    }

    /// Returns the bytes before the next CRLF and steps over it.
    fn line(&mut self) -> Result<&'a [u8], ProtocolError> {
        let rest = self.rest();
        let mut from = 0;
        // a lone \r inside the line is data, keep looking
        while let Some(i) = memchr::memchr(b'\r', &rest[from..]) {
            let cr = from + i;
            match rest.get(cr + 1) {
                Some(b'\n') => {
                    self.advance(cr + 2);
                    return Ok(&rest[..cr]);
                }
                Some(_) => from = cr + 1,
                None => break,
            }
        }
        Err(ProtocolError::Incomplete)
    }

    /// Status and error lines carry `String`s, so they are checked here
    /// regardless of the stream's [`Decoding`](crate::Decoding).
    fn text(&mut self, what: &'static str) -> Result<String, ProtocolError> {
        let line = self.line()?;
        std::str::from_utf8(line)
            .map(str::to_owned)
            .map_err(|_| ProtocolError::InvalidUtf8(what))
    }

    fn integer(&mut self) -> Result<i64, ProtocolError> {
        let line = self.line()?;
        parse_decimal(line)
    }

    /// Length header of a bulk string or array. `None` is the -1 null
    /// marker; any other negative value is malformed.
    fn length(&mut self) -> Result<Option<i64>, ProtocolError> {
        match self.integer()? {
            -1 => Ok(None),
            n if n < 0 => Err(ProtocolError::InvalidFrameLength(n)),
            n => Ok(Some(n)),
        }
    }

    fn bulk(&mut self, len: usize) -> Result<Frame, ProtocolError> {
        let rest = self.rest();
        let Some(tail) = rest.get(len..len + 2) else {
            return Err(ProtocolError::Incomplete);
        };
        if tail != b"\r\n" {
            return Err(ProtocolError::InvalidFrameLength(len as i64));
        }
        self.advance(len + 2);
        Ok(Frame::Bulk(Bytes::copy_from_slice(&rest[..len])))
    }
}

/// Decimal i64 without going through `str`. Digits accumulate toward the
/// sign so `i64::MIN` parses.
fn parse_decimal(line: &[u8]) -> Result<i64, ProtocolError> {
    let (sign, digits): (i64, &[u8]) = match line {
        [b'-', rest @ ..] => (-1, rest),
        _ => (1, line),
    };
    if digits.is_empty() {
        return Err(ProtocolError::InvalidInteger);
    }

    digits.iter().try_fold(0i64, |acc, &b| {
        if !b.is_ascii_digit() {
            return Err(ProtocolError::InvalidInteger);
        }
        acc.checked_mul(10)
            .and_then(|acc| acc.checked_add(sign * i64::from(b - b'0')))
            .ok_or(ProtocolError::InvalidInteger)
    })
}
