//! Administrative alerting.

use std::fmt;

use tracing::warn;

use crate::topology::NodeAddress;

/// Something an operator should hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    /// A replica failed its health check.
    ReplicaDown(NodeAddress),
    /// A node couldn't be reached or classified during discovery.
    Unreachable { addr: NodeAddress, reason: String },
    /// A replica could not be pointed at the new primary.
    ReslaveFailed { addr: NodeAddress, reason: String },
    /// The cluster is running without a usable primary.
    Degraded(String),
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Alert::ReplicaDown(addr) => write!(f, "replica {addr} is down"),
            Alert::Unreachable { addr, reason } => write!(f, "node {addr} unreachable: {reason}"),
            Alert::ReslaveFailed { addr, reason } => {
                write!(f, "failed to reslave {addr}: {reason}")
            }
            Alert::Degraded(reason) => write!(f, "cluster degraded: {reason}"),
        }
    }
}

/// Receives alerts from the controller.
pub trait Alerter {
    fn alert(&self, alert: &Alert);
}

/// Default alerter: writes every alert to the log at warn level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlerter;

impl Alerter for LogAlerter {
    fn alert(&self, alert: &Alert) {
        warn!("alert: {alert}");
    }
}
