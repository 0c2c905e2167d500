//! Errors raised while decoding replies.

use thiserror::Error;

/// Ways a RESP byte stream can be rejected.
///
/// Every variant except [`ProtocolError::Incomplete`] means the byte stream
/// can no longer be trusted and the connection carrying it should be closed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// More bytes are needed. Never surfaces from [`parse_frame`](crate::parse_frame).
    #[error("incomplete frame: need more data")]
    Incomplete,

    /// Leading byte is not one of `+ - : $ *`.
    #[error("invalid type prefix: {0:#04x}")]
    InvalidPrefix(u8),

    /// Integer or length header is not a decimal i64.
    #[error("invalid integer encoding")]
    InvalidInteger,

    /// A bulk string or array declared an invalid length, or a bulk
    /// payload was not followed by the line delimiter.
    #[error("invalid frame length: {0}")]
    InvalidFrameLength(i64),

    #[error("bulk string too large: {0} bytes")]
    BulkStringTooLarge(usize),

    /// Arrays nested deeper than the parser allows.
    #[error("frame nesting exceeds {0} levels")]
    NestingTooDeep(usize),

    #[error("too many elements in array: {0}")]
    TooManyElements(usize),

    /// Text decoding was requested and a reply contained invalid UTF-8.
    #[error("invalid utf-8 in {0}")]
    InvalidUtf8(&'static str),
}
