//! Error types for node connections, the topology store and failover.

use std::io;

use vigil_protocol::ProtocolError;

use crate::topology::{AddressParseError, NodeAddress};

/// Transport-level failures. Every variant leaves the connection torn
/// down; the next command reconnects.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Could not establish the TCP connection.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: NodeAddress,
        #[source]
        source: io::Error,
    },

    /// Socket read failed.
    #[error("error reading from socket: {0}")]
    Read(#[source] io::Error),

    /// Socket write failed.
    #[error("error writing to socket: {0}")]
    Write(#[source] io::Error),

    /// The peer closed the connection while a reply was expected.
    #[error("socket closed on remote end")]
    Closed,

    /// The node is still loading its dataset into memory.
    #[error("node is loading: {0}")]
    Loading(String),

    /// SELECT was rejected during the connection handshake.
    #[error("invalid database index {db}: {reason}")]
    InvalidDatabase { db: u32, reason: String },

    /// A connect, read or write exceeded its timeout.
    #[error("operation timed out")]
    Timeout,
}

impl ConnectionError {
    /// The OS error code behind a read, write or connect failure, if any.
    pub fn os_error_code(&self) -> Option<i32> {
        match self {
            ConnectionError::Connect { source, .. }
            | ConnectionError::Read(source)
            | ConnectionError::Write(source) => source.raw_os_error(),
            _ => None,
        }
    }

    /// Maps an io error, folding both timeout kinds into `Timeout`.
    pub(crate) fn from_read(err: io::Error) -> Self {
        if is_timeout(&err) {
            ConnectionError::Timeout
        } else {
            ConnectionError::Read(err)
        }
    }

    pub(crate) fn from_write(err: io::Error) -> Self {
        if is_timeout(&err) {
            ConnectionError::Timeout
        } else {
            ConnectionError::Write(err)
        }
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

/// Anything that can go wrong executing a command against a node.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Malformed reply stream. The connection has been torn down.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The node answered with an error reply. The connection is still
    /// usable.
    #[error("{0}")]
    Response(String),

    /// AUTH was rejected.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The reply had the wrong shape for the command.
    #[error("unexpected reply to {command}: {reply}")]
    UnexpectedReply {
        command: &'static str,
        reply: String,
    },
}

impl NodeError {
    /// True if the connection was invalidated by this error.
    pub fn is_connection_level(&self) -> bool {
        matches!(self, NodeError::Connection(_) | NodeError::Protocol(_))
    }
}

/// Failures reading or writing persisted topology.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("topology store unavailable: {0}")]
    Node(#[from] NodeError),

    /// A persisted entry is not a valid `host:port`.
    #[error("malformed persisted address: {0}")]
    MalformedAddress(#[from] AddressParseError),

    /// Used by in-process stores that simulate an outage.
    #[error("topology store unavailable")]
    Unavailable,
}

/// Failover-level failures. The controller logs these and keeps running
/// in a degraded state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FailoverError {
    /// The primary failed and no replica is left to promote.
    #[error("no replica available for promotion")]
    NoReplicaAvailable,

    /// Promotion was requested for a node that is not a replica.
    #[error("{0} is not a replica")]
    NotAReplica(NodeAddress),

    /// The candidate rejected or never answered `SLAVEOF NO ONE`.
    #[error("failed to promote {addr}: {reason}")]
    PromotionFailed { addr: NodeAddress, reason: String },

    /// The address is not part of the node set.
    #[error("unknown node {0}")]
    UnknownNode(NodeAddress),
}
