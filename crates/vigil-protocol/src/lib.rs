//! vigil-protocol: RESP wire protocol for talking to monitored nodes.
//!
//! Provides incremental parsing, a streaming decoder, a blocking reader
//! that bounds every socket read, direct-to-buffer serialization, and the
//! closed set of commands the watcher sends.
//!
//! # quick start
//!
//! ```
//! use bytes::BytesMut;
//! use vigil_protocol::{parse_frame, Command, Frame};
//!
//! // parse a status reply
//! let (frame, consumed) = parse_frame(b"+PONG\r\n").unwrap().unwrap();
//! assert_eq!(frame, Frame::Simple("PONG".into()));
//! assert_eq!(consumed, 7);
//!
//! // encode a command
//! let mut buf = BytesMut::new();
//! Command::Ping.encode(&mut buf);
//! assert_eq!(&buf[..], b"*1\r\n$4\r\nPING\r\n");
//! ```

pub mod command;
pub mod decoder;
pub mod error;
pub mod parse;
pub mod reader;
pub mod reply;
mod serialize;
pub mod types;

pub use command::Command;
pub use decoder::{Decoding, StreamDecoder};
pub use error::ProtocolError;
pub use parse::parse_frame;
pub use reader::{FrameReader, ReadError, DEFAULT_CHUNK_SIZE};
pub use reply::{classify_reply, ReplyError};
pub use types::Frame;
