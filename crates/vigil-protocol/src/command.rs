//! Typed client commands.
//!
//! Every command a watcher sends, either to a monitored node or to the
//! topology store, is expressed as a [`Command`] and encoded through
//! [`Command::to_frame`] as an array of bulk strings. Keeping the set
//! closed makes it easy to see exactly what the watcher can do to a node.

use bytes::BytesMut;

use crate::types::Frame;

/// A command sent by the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// PING. Liveness probe; a healthy node answers `+PONG`.
    Ping,

    /// INFO [section]. Returns a text block of `key:value` lines.
    Info { section: Option<String> },

    /// AUTH <secret>.
    Auth { secret: String },

    /// SELECT <index>.
    Select { db: u32 },

    /// SLAVEOF <host> <port>, or SLAVEOF NO ONE when `primary` is `None`.
    ///
    /// The legacy spelling is used because every server version that
    /// accepts REPLICAOF also accepts SLAVEOF.
    ReplicaOf { primary: Option<(String, u16)> },

    /// GET <key>.
    Get { key: String },

    /// SET <key> <value>.
    Set { key: String, value: String },

    /// DEL <key>.
    Del { key: String },

    /// RPUSH <key> <value>.
    RPush { key: String, value: String },

    /// LREM <key> <count> <value>.
    LRem { key: String, count: i64, value: String },

    /// LRANGE <key> <start> <stop>.
    LRange { key: String, start: i64, stop: i64 },

    /// PUBLISH <channel> <message>.
    Publish { channel: String, message: String },
}

impl Command {
    /// Returns the command name as sent on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Ping => "PING",
            Command::Info { .. } => "INFO",
            Command::Auth { .. } => "AUTH",
            Command::Select { .. } => "SELECT",
            Command::ReplicaOf { .. } => "SLAVEOF",
            Command::Get { .. } => "GET",
            Command::Set { .. } => "SET",
            Command::Del { .. } => "DEL",
            Command::RPush { .. } => "RPUSH",
            Command::LRem { .. } => "LREM",
            Command::LRange { .. } => "LRANGE",
            Command::Publish { .. } => "PUBLISH",
        }
    }

    /// Encodes this command as an array of bulk strings.
    pub fn to_frame(&self) -> Frame {
        let mut args: Vec<String> = vec![self.name().to_string()];
        match self {
            Command::Ping => {}
            Command::Info { section } => args.extend(section.iter().cloned()),
            Command::Auth { secret } => args.push(secret.clone()),
            Command::Select { db } => args.push(db.to_string()),
            Command::ReplicaOf { primary: None } => {
                args.push("NO".into());
                args.push("ONE".into());
            }
            Command::ReplicaOf {
                primary: Some((host, port)),
            } => {
                args.push(host.clone());
                args.push(port.to_string());
            }
            Command::Get { key } | Command::Del { key } => args.push(key.clone()),
            Command::Set { key, value } | Command::RPush { key, value } => {
                args.push(key.clone());
                args.push(value.clone());
            }
            Command::LRem { key, count, value } => {
                args.push(key.clone());
                args.push(count.to_string());
                args.push(value.clone());
            }
            Command::LRange { key, start, stop } => {
                args.push(key.clone());
                args.push(start.to_string());
                args.push(stop.to_string());
            }
            Command::Publish { channel, message } => {
                args.push(channel.clone());
                args.push(message.clone());
            }
        }
        Frame::command(&args)
    }

    /// Serializes this command straight into `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        self.to_frame().serialize(dst);
    }
}
