//! Topology persistence.
//!
//! The controller mirrors every topology change into a [`TopologyStore`]
//! so a restarted watcher can pick up where it left off. The store is
//! also the sink for operational events (`publish`).
//!
//! Only one controller should write to a given store at a time; nothing
//! here arbitrates between concurrent writers.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use vigil_protocol::{Command, Frame};

use crate::connection::NodeConnection;
use crate::error::{NodeError, StoreError};
use crate::topology::{NodeAddress, Topology};

/// Key holding the primary's `host:port`.
pub const PRIMARY_KEY: &str = "master_server";
/// List of replica `host:port` entries, in promotion order.
pub const REPLICAS_KEY: &str = "slave_servers";
/// Prefix for per-node last-checked timestamps (unix milliseconds).
pub const LAST_CHECKED_PREFIX: &str = "server_checked:";

/// Durable home for the topology.
pub trait TopologyStore {
    /// Reads the persisted topology. An empty store yields an empty
    /// topology.
    fn load(&mut self) -> Result<Topology, StoreError>;

    /// Records the primary, or clears it with `None`.
    fn set_primary(&mut self, primary: Option<&NodeAddress>) -> Result<(), StoreError>;

    /// Appends a replica to the persisted list.
    fn push_replica(&mut self, addr: &NodeAddress) -> Result<(), StoreError>;

    /// Removes every occurrence of a replica from the persisted list.
    fn remove_replica(&mut self, addr: &NodeAddress) -> Result<(), StoreError>;

    fn clear_replicas(&mut self) -> Result<(), StoreError>;

    fn set_last_checked(&mut self, addr: &NodeAddress, at: SystemTime) -> Result<(), StoreError>;

    /// Publishes an operational event. Fire-and-forget.
    fn publish(&mut self, channel: &str, message: &str) -> Result<(), StoreError>;

    /// Replaces the persisted topology: clear, primary, then replicas in
    /// order.
    fn save(&mut self, topology: &Topology) -> Result<(), StoreError> {
        self.clear_replicas()?;
        self.set_primary(topology.primary())?;
        for replica in topology.replicas() {
            self.push_replica(replica)?;
        }
        Ok(())
    }

    /// Drops all persisted topology state.
    fn reset(&mut self) -> Result<(), StoreError> {
        self.clear_replicas()?;
        self.set_primary(None)
    }
}

fn unix_millis(at: SystemTime) -> u128 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Store backed by a key-value node spoken to over RESP.
pub struct RespTopologyStore {
    conn: NodeConnection,
}

impl RespTopologyStore {
    pub fn new(conn: NodeConnection) -> Self {
        Self { conn }
    }

    /// Opens the connection now, surfacing an unreachable store early.
    pub fn connect(&mut self) -> Result<(), StoreError> {
        self.conn.connect()?;
        Ok(())
    }

    fn run(&mut self, cmd: Command) -> Result<Frame, StoreError> {
        Ok(self.conn.execute(&cmd)?)
    }

    fn expect_ok(&mut self, cmd: Command) -> Result<(), StoreError> {
        let name = cmd.name();
        match self.run(cmd)? {
            reply if reply.is_status("OK") => Ok(()),
            other => Err(unexpected(name, &other)),
        }
    }

    fn expect_integer(&mut self, cmd: Command) -> Result<i64, StoreError> {
        let name = cmd.name();
        match self.run(cmd)? {
            Frame::Integer(n) => Ok(n),
            other => Err(unexpected(name, &other)),
        }
    }
}

fn unexpected(command: &'static str, reply: &Frame) -> StoreError {
    NodeError::UnexpectedReply {
        command,
        reply: format!("{reply:?}"),
    }
    .into()
}

impl TopologyStore for RespTopologyStore {
    fn load(&mut self) -> Result<Topology, StoreError> {
        let primary = match self.run(Command::Get {
            key: PRIMARY_KEY.into(),
        })? {
            Frame::Null => None,
            frame => match frame.as_str() {
                Some("") => None,
                Some(text) => Some(text.parse::<NodeAddress>()?),
                None => return Err(unexpected("GET", &frame)),
            },
        };

        let entries = match self.run(Command::LRange {
            key: REPLICAS_KEY.into(),
            start: 0,
            stop: -1,
        })? {
            Frame::Array(items) => items,
            Frame::NullArray => Vec::new(),
            other => return Err(unexpected("LRANGE", &other)),
        };

        let mut replicas = Vec::with_capacity(entries.len());
        for entry in &entries {
            let Some(text) = entry.as_str() else {
                return Err(unexpected("LRANGE", entry));
            };
            replicas.push(text.parse::<NodeAddress>()?);
        }
        Ok(Topology::from_parts(primary, replicas))
    }

    fn set_primary(&mut self, primary: Option<&NodeAddress>) -> Result<(), StoreError> {
        match primary {
            Some(addr) => self.expect_ok(Command::Set {
                key: PRIMARY_KEY.into(),
                value: addr.to_string(),
            }),
            None => self
                .expect_integer(Command::Del {
                    key: PRIMARY_KEY.into(),
                })
                .map(drop),
        }
    }

    fn push_replica(&mut self, addr: &NodeAddress) -> Result<(), StoreError> {
        self.expect_integer(Command::RPush {
            key: REPLICAS_KEY.into(),
            value: addr.to_string(),
        })
        .map(drop)
    }

    fn remove_replica(&mut self, addr: &NodeAddress) -> Result<(), StoreError> {
        self.expect_integer(Command::LRem {
            key: REPLICAS_KEY.into(),
            count: 0,
            value: addr.to_string(),
        })
        .map(drop)
    }

    fn clear_replicas(&mut self) -> Result<(), StoreError> {
        self.expect_integer(Command::Del {
            key: REPLICAS_KEY.into(),
        })
        .map(drop)
    }

    fn set_last_checked(&mut self, addr: &NodeAddress, at: SystemTime) -> Result<(), StoreError> {
        self.expect_ok(Command::Set {
            key: format!("{LAST_CHECKED_PREFIX}{addr}"),
            value: unix_millis(at).to_string(),
        })
    }

    fn publish(&mut self, channel: &str, message: &str) -> Result<(), StoreError> {
        self.expect_integer(Command::Publish {
            channel: channel.into(),
            message: message.into(),
        })
        .map(drop)
    }
}

/// One write applied to a [`MemoryStore`], in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreWrite {
    SetPrimary(Option<NodeAddress>),
    PushReplica(NodeAddress),
    RemoveReplica(NodeAddress),
    ClearReplicas,
    LastChecked(NodeAddress),
}

#[derive(Debug, Default)]
struct MemoryState {
    topology: Topology,
    last_checked: Vec<(NodeAddress, SystemTime)>,
    journal: Vec<StoreWrite>,
    events: Vec<(String, String)>,
    unavailable: bool,
}

/// In-process store. Clones share state, so a test can hand one handle
/// to the controller and inspect the journal through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Rc<RefCell<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with `topology`. Seeding is not journaled.
    pub fn with_topology(topology: Topology) -> Self {
        let store = Self::new();
        store.state.borrow_mut().topology = topology;
        store
    }

    pub fn topology(&self) -> Topology {
        self.state.borrow().topology.clone()
    }

    pub fn journal(&self) -> Vec<StoreWrite> {
        self.state.borrow().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.state.borrow_mut().journal.clear();
    }

    /// Published `(channel, message)` pairs.
    pub fn events(&self) -> Vec<(String, String)> {
        self.state.borrow().events.clone()
    }

    pub fn last_checked(&self, addr: &NodeAddress) -> Option<SystemTime> {
        self.state
            .borrow()
            .last_checked
            .iter()
            .find(|(a, _)| a == addr)
            .map(|(_, at)| *at)
    }

    /// Makes every subsequent operation fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.borrow_mut().unavailable = unavailable;
    }

    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut MemoryState) -> T,
    ) -> Result<T, StoreError> {
        let mut state = self.state.borrow_mut();
        if state.unavailable {
            return Err(StoreError::Unavailable);
        }
        Ok(f(&mut state))
    }
}

impl TopologyStore for MemoryStore {
    fn load(&mut self) -> Result<Topology, StoreError> {
        self.with_state(|s| s.topology.clone())
    }

    fn set_primary(&mut self, primary: Option<&NodeAddress>) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.journal.push(StoreWrite::SetPrimary(primary.cloned()));
            match primary {
                Some(addr) => s.topology.set_primary(addr.clone()),
                None => {
                    s.topology.clear_primary();
                }
            }
        })
    }

    fn push_replica(&mut self, addr: &NodeAddress) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.journal.push(StoreWrite::PushReplica(addr.clone()));
            s.topology.add_replica(addr.clone());
        })
    }

    fn remove_replica(&mut self, addr: &NodeAddress) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.journal.push(StoreWrite::RemoveReplica(addr.clone()));
            s.topology.remove_replica(addr);
        })
    }

    fn clear_replicas(&mut self) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.journal.push(StoreWrite::ClearReplicas);
            let primary = s.topology.primary().cloned();
            s.topology = Topology::from_parts(primary, Vec::new());
        })
    }

    fn set_last_checked(&mut self, addr: &NodeAddress, at: SystemTime) -> Result<(), StoreError> {
        self.with_state(|s| {
            s.journal.push(StoreWrite::LastChecked(addr.clone()));
            match s.last_checked.iter_mut().find(|(a, _)| a == addr) {
                Some(entry) => entry.1 = at,
                None => s.last_checked.push((addr.clone(), at)),
            }
        })
    }

    fn publish(&mut self, channel: &str, message: &str) -> Result<(), StoreError> {
        self.with_state(|s| s.events.push((channel.to_string(), message.to_string())))
    }
}
