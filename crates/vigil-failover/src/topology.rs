//! Replication topology.
//!
//! Defines node identity, roles, and the primary/replica layout the
//! controller maintains and mirrors into the topology store.

use std::fmt;
use std::str::FromStr;

/// Port assumed when an address is given without one.
pub const DEFAULT_PORT: u16 = 6379;

/// Network identity of a monitored node.
///
/// Immutable once created. The text form is `host:port`, which is also
/// how addresses are persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeAddress {
    host: String,
    port: u16,
}

impl NodeAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Error returned when a `host[:port]` string can't be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid node address '{input}': {reason}")]
pub struct AddressParseError {
    pub input: String,
    pub reason: &'static str,
}

impl FromStr for NodeAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let err = |reason| AddressParseError {
            input: s.to_string(),
            reason,
        };

        if input.is_empty() {
            return Err(err("empty address"));
        }

        let (host, port) = match input.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| err("invalid port"))?;
                (host, port)
            }
            None => (input, DEFAULT_PORT),
        };

        if host.is_empty() {
            return Err(err("missing host"));
        }
        if port == 0 {
            return Err(err("port must be non-zero"));
        }
        Ok(NodeAddress::new(host, port))
    }
}

/// The role a node reported during discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Writable node that replicas follow.
    Primary,
    /// Node replicating from a primary.
    Replica,
    /// Unreachable, or reported something we don't recognize.
    Unknown,
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Primary => write!(f, "primary"),
            NodeRole::Replica => write!(f, "replica"),
            NodeRole::Unknown => write!(f, "unknown"),
        }
    }
}

/// Current primary plus replicas in promotion order.
///
/// The primary never appears in the replica list and the replica list
/// holds no duplicates; every mutator preserves both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    primary: Option<NodeAddress>,
    replicas: Vec<NodeAddress>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a topology from persisted parts, dropping duplicates and
    /// any replica entry that names the primary.
    pub fn from_parts(primary: Option<NodeAddress>, replicas: Vec<NodeAddress>) -> Self {
        let mut topology = Topology {
            primary,
            replicas: Vec::with_capacity(replicas.len()),
        };
        for replica in replicas {
            topology.add_replica(replica);
        }
        topology
    }

    pub fn primary(&self) -> Option<&NodeAddress> {
        self.primary.as_ref()
    }

    pub fn replicas(&self) -> &[NodeAddress] {
        &self.replicas
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.replicas.is_empty()
    }

    pub fn is_primary(&self, addr: &NodeAddress) -> bool {
        self.primary.as_ref() == Some(addr)
    }

    pub fn contains_replica(&self, addr: &NodeAddress) -> bool {
        self.replicas.contains(addr)
    }

    /// True if `addr` is the primary or one of the replicas.
    pub fn contains(&self, addr: &NodeAddress) -> bool {
        self.is_primary(addr) || self.contains_replica(addr)
    }

    /// Makes `addr` the primary, removing it from the replica list.
    /// The previous primary, if any, is dropped from the topology.
    pub fn set_primary(&mut self, addr: NodeAddress) {
        self.replicas.retain(|r| r != &addr);
        self.primary = Some(addr);
    }

    pub fn clear_primary(&mut self) -> Option<NodeAddress> {
        self.primary.take()
    }

    /// Appends a replica. Returns `false` if it is the primary or already
    /// listed.
    pub fn add_replica(&mut self, addr: NodeAddress) -> bool {
        if self.is_primary(&addr) || self.replicas.contains(&addr) {
            return false;
        }
        self.replicas.push(addr);
        true
    }

    pub fn remove_replica(&mut self, addr: &NodeAddress) -> bool {
        let before = self.replicas.len();
        self.replicas.retain(|r| r != addr);
        self.replicas.len() != before
    }

    /// The replica that would be promoted next: the longest-standing one.
    pub fn promotion_candidate(&self) -> Option<&NodeAddress> {
        self.replicas.first()
    }

    /// Every node, primary first, then replicas in order.
    pub fn nodes(&self) -> Vec<NodeAddress> {
        self.primary
            .iter()
            .chain(self.replicas.iter())
            .cloned()
            .collect()
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.primary {
            Some(p) => write!(f, "primary={p}")?,
            None => write!(f, "primary=-")?,
        }
        let replicas: Vec<String> = self.replicas.iter().map(ToString::to_string).collect();
        write!(f, " replicas=[{}]", replicas.join(","))
    }
}
