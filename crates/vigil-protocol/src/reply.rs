//! Classification of top-level error replies.
//!
//! A node reports two very different kinds of trouble through `-` replies:
//! an application error about the command (the connection is fine), and a
//! `LOADING` state in which it can't serve anything yet. Callers need to
//! branch on that without string matching of their own.

use crate::types::Frame;

/// Prefix of a generic error reply. Stripped before surfacing.
const ERR_MARKER: &str = "ERR ";

/// Prefix sent while a node is loading its dataset into memory.
const LOADING_MARKER: &str = "LOADING ";

/// An error reply, already classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyError {
    /// Application-level error; the connection stays usable.
    Response(String),
    /// The node can't serve requests right now. The connection should be
    /// dropped and re-established (and re-authenticated) later.
    Loading(String),
}

/// Splits a reply into success or a classified error.
///
/// Only the top-level frame is inspected; error frames nested inside an
/// array are returned as ordinary elements.
pub fn classify_reply(frame: Frame) -> Result<Frame, ReplyError> {
    match frame {
        Frame::Error(msg) => {
            if let Some(rest) = msg.strip_prefix(ERR_MARKER) {
                Err(ReplyError::Response(rest.to_string()))
            } else if let Some(rest) = msg.strip_prefix(LOADING_MARKER) {
                Err(ReplyError::Loading(rest.to_string()))
            } else {
                Err(ReplyError::Response(msg))
            }
        }
        other => Ok(other),
    }
}
