//! Blocking RESP connection to a single node.
//!
//! Connections are lazy: the socket is opened on first use and torn down
//! on any transport or protocol failure, so the next command reconnects.
//! Every network call is bounded by the configured timeouts since probes
//! run on the reactor thread.

use std::io::{self, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::time::Duration;

use bytes::BytesMut;
use tracing::debug;
use vigil_protocol::{
    classify_reply, Command, Decoding, Frame, FrameReader, ReadError, ReplyError,
    DEFAULT_CHUNK_SIZE,
};

use crate::error::{ConnectionError, NodeError};
use crate::topology::NodeAddress;

/// Per-connection settings shared by every node the watcher talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Sent with AUTH right after connecting, when set.
    pub password: Option<String>,
    /// Selected right after connecting when non-zero.
    pub db: u32,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub decoding: Decoding,
    /// Upper bound on a single socket read.
    pub read_chunk_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            password: None,
            db: 0,
            connect_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_secs(2),
            write_timeout: Duration::from_secs(2),
            decoding: Decoding::Utf8,
            read_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// A connection to one node.
pub struct NodeConnection {
    addr: NodeAddress,
    config: ConnectionConfig,
    stream: Option<TcpStream>,
    reader: Option<FrameReader<TcpStream>>,
    write_buf: BytesMut,
}

impl NodeConnection {
    /// Creates a disconnected handle. Nothing touches the network until
    /// the first command.
    pub fn new(addr: NodeAddress, config: ConnectionConfig) -> Self {
        Self {
            addr,
            config,
            stream: None,
            reader: None,
            write_buf: BytesMut::with_capacity(256),
        }
    }

    pub fn address(&self) -> &NodeAddress {
        &self.addr
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Raw descriptor, only while connected.
    pub fn fd(&self) -> Option<RawFd> {
        self.stream.as_ref().map(AsRawFd::as_raw_fd)
    }

    /// Borrowed descriptor for reactor registration, only while connected.
    pub fn as_fd(&self) -> Option<BorrowedFd<'_>> {
        self.stream.as_ref().map(AsFd::as_fd)
    }

    /// Opens the socket and runs the AUTH/SELECT handshake. Returns the
    /// existing descriptor when already connected.
    pub fn connect(&mut self) -> Result<RawFd, NodeError> {
        if let Some(fd) = self.fd() {
            return Ok(fd);
        }

        let stream = self.open_stream()?;
        let reader_half = stream
            .try_clone()
            .map_err(|source| self.connect_error(source))?;
        let fd = stream.as_raw_fd();
        self.reader = Some(FrameReader::new(
            reader_half,
            self.config.decoding,
            self.config.read_chunk_size,
        ));
        self.stream = Some(stream);

        if let Err(e) = self.handshake() {
            self.disconnect();
            return Err(e);
        }

        debug!(addr = %self.addr, fd, "connected");
        Ok(fd)
    }

    fn open_stream(&self) -> Result<TcpStream, NodeError> {
        let addrs = (self.addr.host(), self.addr.port())
            .to_socket_addrs()
            .map_err(|source| self.connect_error(source))?;

        let mut last_err = None;
        for sock_addr in addrs {
            match TcpStream::connect_timeout(&sock_addr, nonzero(self.config.connect_timeout)) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(Some(nonzero(self.config.read_timeout)))
                        .and_then(|_| {
                            stream.set_write_timeout(Some(nonzero(self.config.write_timeout)))
                        })
                        .and_then(|_| stream.set_nodelay(true))
                        .map_err(|source| self.connect_error(source))?;
                    return Ok(stream);
                }
                Err(e) => last_err = Some(e),
            }
        }

        let source = last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "address resolved to nothing")
        });
        Err(self.connect_error(source))
    }

    fn connect_error(&self, source: io::Error) -> NodeError {
        if source.kind() == io::ErrorKind::TimedOut {
            return ConnectionError::Timeout.into();
        }
        ConnectionError::Connect {
            addr: self.addr.clone(),
            source,
        }
        .into()
    }

    fn handshake(&mut self) -> Result<(), NodeError> {
        if let Some(secret) = self.config.password.clone() {
            match self.execute(&Command::Auth { secret }) {
                Ok(reply) if reply.is_status("OK") => {}
                Ok(other) => {
                    return Err(NodeError::Authentication(format!(
                        "unexpected reply {other:?}"
                    )))
                }
                Err(NodeError::Response(msg)) => return Err(NodeError::Authentication(msg)),
                Err(e) => return Err(e),
            }
        }

        let db = self.config.db;
        if db != 0 {
            match self.execute(&Command::Select { db }) {
                Ok(reply) if reply.is_status("OK") => {}
                Ok(other) => {
                    return Err(ConnectionError::InvalidDatabase {
                        db,
                        reason: format!("unexpected reply {other:?}"),
                    }
                    .into())
                }
                Err(NodeError::Response(reason)) => {
                    return Err(ConnectionError::InvalidDatabase { db, reason }.into())
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Sends a typed command without waiting for the reply.
    pub fn send_command(&mut self, cmd: &Command) -> Result<(), NodeError> {
        self.connect()?;
        self.write_buf.clear();
        cmd.encode(&mut self.write_buf);
        self.flush_write_buf()
    }

    /// Sends an arbitrary frame without waiting for the reply.
    pub fn send_frame(&mut self, frame: &Frame) -> Result<(), NodeError> {
        self.connect()?;
        self.write_buf.clear();
        frame.serialize(&mut self.write_buf);
        self.flush_write_buf()
    }

    fn flush_write_buf(&mut self) -> Result<(), NodeError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(ConnectionError::Closed.into());
        };
        let result = stream
            .write_all(&self.write_buf)
            .and_then(|_| stream.flush());
        if let Err(e) = result {
            self.disconnect();
            return Err(ConnectionError::from_write(e).into());
        }
        Ok(())
    }

    /// Reads exactly one reply.
    ///
    /// Error replies come back as [`NodeError::Response`] and leave the
    /// connection intact. Everything else that fails disconnects first.
    pub fn read_reply(&mut self) -> Result<Frame, NodeError> {
        let Some(reader) = self.reader.as_mut() else {
            return Err(ConnectionError::Closed.into());
        };

        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                self.disconnect();
                return Err(match e {
                    ReadError::Closed => ConnectionError::Closed.into(),
                    ReadError::Io(e) => ConnectionError::from_read(e).into(),
                    ReadError::Protocol(e) => NodeError::Protocol(e),
                });
            }
        };

        match classify_reply(frame) {
            Ok(frame) => Ok(frame),
            Err(ReplyError::Response(msg)) => Err(NodeError::Response(msg)),
            Err(ReplyError::Loading(msg)) => {
                self.disconnect();
                Err(ConnectionError::Loading(msg).into())
            }
        }
    }

    /// Sends a command and reads its reply.
    pub fn execute(&mut self, cmd: &Command) -> Result<Frame, NodeError> {
        self.send_command(cmd)?;
        self.read_reply()
    }

    /// Closes the socket. Safe to call when already disconnected.
    pub fn disconnect(&mut self) {
        self.reader = None;
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
            debug!(addr = %self.addr, "disconnected");
        }
    }

    /// Checks, without blocking, whether the peer has closed the socket.
    ///
    /// Returns `false` when disconnected; there is nothing to observe.
    pub fn peer_closed(&self) -> bool {
        let Some(stream) = self.stream.as_ref() else {
            return false;
        };
        if stream.set_nonblocking(true).is_err() {
            return true;
        }
        let mut probe = [0u8; 1];
        let closed = match stream.peek(&mut probe) {
            Ok(0) => true,
            Ok(_) => false,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => false,
            Err(_) => true,
        };
        let _ = stream.set_nonblocking(false);
        closed
    }
}

impl Drop for NodeConnection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for NodeConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeConnection")
            .field("addr", &self.addr)
            .field("connected", &self.is_connected())
            .finish()
    }
}

// socket timeouts reject a zero duration
fn nonzero(d: Duration) -> Duration {
    d.max(Duration::from_millis(1))
}
