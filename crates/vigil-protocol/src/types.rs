//! RESP frame types.
//!
//! The [`Frame`] enum represents a single parsed reply. Bulk strings use
//! `Bytes` for reference-counted storage that avoids copies when a reply
//! is handed from the reader to the caller.

use bytes::Bytes;

/// A single RESP protocol frame.
///
/// Covers the reply types a Redis-compatible node sends to a client that
/// only issues administrative commands: status, errors, integers, bulk
/// strings and arrays, including the null forms of the latter two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Simple status reply, e.g. `+OK\r\n`.
    Simple(String),

    /// Error reply, e.g. `-ERR unknown command\r\n`.
    Error(String),

    /// 64-bit signed integer, e.g. `:42\r\n`.
    Integer(i64),

    /// Bulk (binary-safe) string, e.g. `$5\r\nhello\r\n`.
    Bulk(Bytes),

    /// Null bulk string, `$-1\r\n`.
    Null,

    /// Ordered array of frames, e.g. `*2\r\n+hello\r\n+world\r\n`.
    Array(Vec<Frame>),

    /// Null array, `*-1\r\n`.
    NullArray,
}

impl Frame {
    /// Builds a command frame: an array of bulk strings, name first.
    pub fn command<S: AsRef<[u8]>>(args: &[S]) -> Frame {
        Frame::Array(
            args.iter()
                .map(|a| Frame::Bulk(Bytes::copy_from_slice(a.as_ref())))
                .collect(),
        )
    }

    /// Returns `true` for either null form.
    pub fn is_null(&self) -> bool {
        matches!(self, Frame::Null | Frame::NullArray)
    }

    /// Returns `true` if this is the simple status `expected`.
    pub fn is_status(&self, expected: &str) -> bool {
        matches!(self, Frame::Simple(s) if s == expected)
    }

    /// Borrows the payload of a simple string or a UTF-8 bulk string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Frame::Simple(s) => Some(s),
            Frame::Bulk(data) => std::str::from_utf8(data).ok(),
            _ => None,
        }
    }
}
