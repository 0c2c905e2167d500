//! The failover state machine.
//!
//! The controller discovers node roles, keeps one health monitor per node
//! in the topology, and when the primary stops answering promotes the
//! first replica and points the rest at it. Every topology change is
//! mirrored into the [`TopologyStore`].
//!
//! All state lives behind `Rc<RefCell<..>>` and runs on the reactor
//! thread. Reactor callbacks hold weak handles; no borrow is held across
//! a call back into the controller.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};
use vigil_protocol::{Command, Frame};

use crate::alert::{Alert, Alerter};
use crate::connection::{ConnectionConfig, NodeConnection};
use crate::error::{FailoverError, NodeError, StoreError};
use crate::info::parse_info;
use crate::monitor::{self, HealthMonitor, ProbeOutcome, DEFAULT_CHECK_INTERVAL};
use crate::reactor::{Reactor, ReaderHandle};
use crate::store::TopologyStore;
use crate::topology::{NodeAddress, NodeRole, Topology};

/// Controller settings.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Nodes to discover when the store holds no topology.
    pub seeds: Vec<NodeAddress>,
    pub check_interval: Duration,
    pub connection: ConnectionConfig,
    /// Channel operational events are published to.
    pub log_channel: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            check_interval: DEFAULT_CHECK_INTERVAL,
            connection: ConnectionConfig::default(),
            log_channel: "log".into(),
        }
    }
}

/// Lifecycle of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Init,
    Discovering,
    Steady,
    FailingOver,
    Shutdown,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ControllerState::Init => "init",
            ControllerState::Discovering => "discovering",
            ControllerState::Steady => "steady",
            ControllerState::FailingOver => "failing-over",
            ControllerState::Shutdown => "shutdown",
        };
        f.write_str(s)
    }
}

/// Everything the controller knows about one node.
#[derive(Debug)]
struct NodeRecord {
    address: NodeAddress,
    role: NodeRole,
    connection: NodeConnection,
    last_checked: Option<SystemTime>,
    consecutive_failures: u32,
    // set once a replica outage has been alerted, cleared on recovery
    reported_down: bool,
}

impl NodeRecord {
    fn new(address: NodeAddress, config: &ConnectionConfig) -> Self {
        Self {
            connection: NodeConnection::new(address.clone(), config.clone()),
            address,
            role: NodeRole::Unknown,
            last_checked: None,
            consecutive_failures: 0,
            reported_down: false,
        }
    }
}

/// Per-node entry of a [`ControllerStatus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    pub address: NodeAddress,
    pub role: NodeRole,
    pub connected: bool,
    pub monitored: bool,
    pub last_checked: Option<SystemTime>,
    pub consecutive_failures: u32,
}

/// Point-in-time view of the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerStatus {
    pub state: ControllerState,
    pub topology: Topology,
    pub nodes: Vec<NodeStatus>,
}

/// Result of pointing the remaining replicas at a new primary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReslaveReport {
    pub primary: NodeAddress,
    pub succeeded: Vec<NodeAddress>,
    pub failed: Vec<(NodeAddress, String)>,
}

impl ReslaveReport {
    fn new(primary: NodeAddress) -> Self {
        Self {
            primary,
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// What [`FailoverController::promote`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Promotion {
    /// The candidate already was the primary; nothing was sent.
    AlreadyPrimary,
    Promoted(ReslaveReport),
}

/// What a failure notification led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailoverOutcome {
    /// The controller was not in a state to act, or the node is not in
    /// the topology.
    Ignored,
    /// A replica failed; the topology was left alone.
    ReplicaDown(NodeAddress),
    /// The primary failed and a replica took over.
    Promoted {
        primary: NodeAddress,
        report: ReslaveReport,
    },
    /// The primary failed and nothing could replace it.
    Degraded { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("controller has been shut down")]
    ShutDown,
}

struct Inner {
    config: ControllerConfig,
    state: ControllerState,
    node_set: Vec<NodeAddress>,
    records: BTreeMap<NodeAddress, NodeRecord>,
    topology: Topology,
    /// Last topology read from or written to the store.
    persisted: Topology,
    monitors: BTreeMap<NodeAddress, HealthMonitor>,
    readers: Vec<ReaderHandle>,
    store: Box<dyn TopologyStore>,
    alerter: Rc<dyn Alerter>,
    // delivered by `flush_alerts` once no borrow is held
    pending_alerts: Vec<Alert>,
}

impl Inner {
    /// Logs an event and publishes it to the log channel.
    fn event(&mut self, message: String) {
        info!("{message}");
        self.publish(&message);
    }

    fn publish(&mut self, message: &str) {
        if let Err(e) = self.store.publish(&self.config.log_channel, message) {
            debug!("failed to publish event: {e}");
        }
    }

    fn alert(&mut self, alert: Alert) {
        self.pending_alerts.push(alert);
    }

    fn persist<F>(&mut self, what: &str, write: F)
    where
        F: FnOnce(&mut dyn TopologyStore) -> Result<(), StoreError>,
    {
        if let Err(e) = write(self.store.as_mut()) {
            warn!("failed to persist {what}: {e}");
        }
    }

    fn record(&mut self, addr: &NodeAddress) -> &mut NodeRecord {
        let config = &self.config.connection;
        self.records
            .entry(addr.clone())
            .or_insert_with(|| NodeRecord::new(addr.clone(), config))
    }
}

/// Handle to a failover controller. Clones share the same controller.
#[derive(Clone)]
pub struct FailoverController {
    inner: Rc<RefCell<Inner>>,
    reactor: Rc<dyn Reactor>,
}

#[derive(Clone)]
struct WeakController {
    inner: Weak<RefCell<Inner>>,
    reactor: Weak<dyn Reactor>,
}

impl WeakController {
    fn upgrade(&self) -> Option<FailoverController> {
        Some(FailoverController {
            inner: self.inner.upgrade()?,
            reactor: self.reactor.upgrade()?,
        })
    }
}

impl FailoverController {
    pub fn new(
        config: ControllerConfig,
        reactor: Rc<dyn Reactor>,
        store: Box<dyn TopologyStore>,
        alerter: Box<dyn Alerter>,
    ) -> Self {
        let inner = Inner {
            node_set: config.seeds.clone(),
            config,
            state: ControllerState::Init,
            records: BTreeMap::new(),
            topology: Topology::new(),
            persisted: Topology::new(),
            monitors: BTreeMap::new(),
            readers: Vec::new(),
            store,
            alerter: Rc::from(alerter),
            pending_alerts: Vec::new(),
        };
        Self {
            inner: Rc::new(RefCell::new(inner)),
            reactor,
        }
    }

    fn downgrade(&self) -> WeakController {
        WeakController {
            inner: Rc::downgrade(&self.inner),
            reactor: Rc::downgrade(&self.reactor),
        }
    }

    /// Hands queued alerts to the alerter. Called with no borrow held, so
    /// an alerter may call back into the controller.
    fn flush_alerts(&self) {
        let (alerter, alerts) = {
            let mut inner = self.inner.borrow_mut();
            (
                Rc::clone(&inner.alerter),
                std::mem::take(&mut inner.pending_alerts),
            )
        };
        for alert in &alerts {
            alerter.alert(alert);
        }
    }

    pub fn state(&self) -> ControllerState {
        self.inner.borrow().state
    }

    pub fn topology(&self) -> Topology {
        self.inner.borrow().topology.clone()
    }

    /// Snapshot of every known node, in address order.
    pub fn status(&self) -> ControllerStatus {
        let inner = self.inner.borrow();
        let nodes = inner
            .records
            .values()
            .map(|r| NodeStatus {
                address: r.address.clone(),
                role: r.role,
                connected: r.connection.is_connected(),
                monitored: inner.monitors.contains_key(&r.address),
                last_checked: r.last_checked,
                consecutive_failures: r.consecutive_failures,
            })
            .collect();
        ControllerStatus {
            state: inner.state,
            topology: inner.topology.clone(),
            nodes,
        }
    }

    /// Chooses the initial node set and runs discovery.
    ///
    /// With `fresh_start` the store is wiped and the configured seeds are
    /// used. Otherwise a topology held by the store wins over the seeds.
    /// Store failures here are returned; at startup they are fatal.
    pub fn start(&self, fresh_start: bool) -> Result<Topology, ControllerError> {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.state == ControllerState::Shutdown {
                return Err(ControllerError::ShutDown);
            }
            let seeds = inner.config.seeds.clone();
            let stored = if fresh_start {
                inner.store.reset()?;
                info!("fresh start, cleared stored topology");
                Topology::new()
            } else {
                inner.store.load()?
            };
            inner.node_set = if stored.is_empty() {
                seeds
            } else {
                info!(topology = %stored, "loaded topology from store");
                stored.nodes()
            };
            inner.persisted = stored;
        }
        self.discover()
    }

    /// Classifies every node in the node set, persists the resulting
    /// topology and starts monitoring it.
    ///
    /// A persisted replica that can't be classified right now stays in the
    /// topology; only nodes the store never listed are left out.
    pub fn discover(&self) -> Result<Topology, ControllerError> {
        if self.state() == ControllerState::Shutdown {
            return Err(ControllerError::ShutDown);
        }
        self.stop_monitoring();

        let topology = {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            inner.state = ControllerState::Discovering;

            let mut records = BTreeMap::new();
            let mut topology = Topology::new();
            for addr in inner.node_set.clone() {
                if records.contains_key(&addr) {
                    continue;
                }
                let mut record = inner
                    .records
                    .remove(&addr)
                    .unwrap_or_else(|| NodeRecord::new(addr.clone(), &inner.config.connection));

                record.role = match classify(&mut record.connection) {
                    Ok(NodeRole::Unknown) => {
                        inner.alert(Alert::Unreachable {
                            addr: addr.clone(),
                            reason: "unrecognized replication role".into(),
                        });
                        NodeRole::Unknown
                    }
                    Ok(role) => role,
                    Err(e) => {
                        warn!(%addr, "discovery failed: {e}");
                        inner.alert(Alert::Unreachable {
                            addr: addr.clone(),
                            reason: e.to_string(),
                        });
                        record.connection.disconnect();
                        NodeRole::Unknown
                    }
                };

                match record.role {
                    NodeRole::Primary => {
                        if let Some(existing) = topology.primary() {
                            warn!(%addr, primary = %existing, "conflicting primary, leaving it out of the topology");
                        } else {
                            topology.set_primary(addr.clone());
                        }
                    }
                    NodeRole::Replica => {
                        topology.add_replica(addr.clone());
                    }
                    NodeRole::Unknown if inner.persisted.contains_replica(&addr) => {
                        info!(%addr, "keeping persisted replica in the topology");
                        // already reported as unreachable above
                        record.reported_down = true;
                        topology.add_replica(addr.clone());
                    }
                    NodeRole::Unknown => {}
                }
                records.insert(addr, record);
            }

            // anything left over is no longer part of the node set
            inner.records = records;
            inner.topology = topology.clone();
            inner.persisted = topology.clone();
            inner.persist("topology", |store| store.save(&topology));
            topology
        };

        self.start_monitoring();

        {
            let mut inner = self.inner.borrow_mut();
            inner.state = ControllerState::Steady;
            inner.event(format!("discovered {topology}"));
        }
        self.flush_alerts();
        Ok(topology)
    }

    fn start_monitoring(&self) {
        let weak = self.downgrade();
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let interval = inner.config.check_interval;

        for addr in inner.topology.nodes() {
            let Some(record) = inner.records.get(&addr) else {
                continue;
            };

            if let Some(fd) = record.connection.as_fd() {
                let w = weak.clone();
                let a = addr.clone();
                let handle = self.reactor.add_reader(
                    fd,
                    Box::new(move || {
                        if let Some(controller) = w.upgrade() {
                            controller.on_readable(&a);
                        }
                    }),
                );
                inner.readers.push(handle);
            }

            let mut monitor = HealthMonitor::new(addr.clone(), interval);
            let (check_weak, check_addr) = (weak.clone(), addr.clone());
            let (report_weak, report_addr) = (weak.clone(), addr.clone());
            monitor.start(
                self.reactor.as_ref(),
                move || check_weak.upgrade()?.check_node(&check_addr),
                move |outcome| {
                    if let Some(controller) = report_weak.upgrade() {
                        controller.record_outcome(&report_addr, outcome);
                    }
                },
            );
            inner.monitors.insert(addr, monitor);
        }
    }

    /// Cancels every monitor and unregisters every reader.
    fn stop_monitoring(&self) {
        let (mut monitors, readers) = {
            let mut inner = self.inner.borrow_mut();
            (
                std::mem::take(&mut inner.monitors),
                std::mem::take(&mut inner.readers),
            )
        };
        for monitor in monitors.values_mut() {
            monitor.stop(self.reactor.as_ref());
        }
        for handle in readers {
            self.reactor.remove_reader(handle);
        }
    }

    /// Runs one health probe. `None` when there is nothing to check.
    pub fn check_node(&self, addr: &NodeAddress) -> Option<ProbeOutcome> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        if inner.state != ControllerState::Steady {
            return None;
        }
        let record = inner.records.get_mut(addr)?;
        let outcome = monitor::probe(&mut record.connection);
        inner.publish(&format!("pinging {addr}"));
        Some(outcome)
    }

    /// Applies a probe outcome: success refreshes the timestamp, failure
    /// counts and hands over to [`FailoverController::handle_failure`].
    pub fn record_outcome(&self, addr: &NodeAddress, outcome: ProbeOutcome) {
        {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            if inner.state != ControllerState::Steady {
                return;
            }
            let Some(record) = inner.records.get_mut(addr) else {
                return;
            };
            match outcome {
                ProbeOutcome::Healthy => {
                    let now = SystemTime::now();
                    let recovered = record.consecutive_failures > 0 || record.reported_down;
                    record.last_checked = Some(now);
                    record.consecutive_failures = 0;
                    record.reported_down = false;
                    inner.persist("last-checked time", |store| {
                        store.set_last_checked(addr, now)
                    });
                    if recovered {
                        inner.event(format!("{addr} is answering again"));
                    }
                    return;
                }
                ProbeOutcome::Failed(reason) => {
                    record.consecutive_failures += 1;
                    warn!(%addr, failures = record.consecutive_failures, "health check failed: {reason}");
                }
            }
        }
        let outcome = self.handle_failure(addr);
        debug!(%addr, ?outcome, "failure handled");
    }

    /// Reactor callback for a readable node socket. Between probes the
    /// only thing a node should send is EOF.
    pub fn on_readable(&self, addr: &NodeAddress) {
        let closed = {
            let mut inner = self.inner.borrow_mut();
            if inner.state != ControllerState::Steady {
                return;
            }
            match inner.records.get_mut(addr) {
                Some(record) if record.connection.peer_closed() => {
                    record.consecutive_failures += 1;
                    true
                }
                _ => false,
            }
        };
        if closed {
            warn!(%addr, "connection closed by peer");
            self.handle_failure(addr);
        }
    }

    /// Reacts to a node failing its health check.
    ///
    /// Only acts in `Steady`. All monitoring is halted first. A failed
    /// replica leaves the topology alone and monitoring resumes over it.
    /// It is reported once per outage; later failures change nothing. A failed
    /// primary is replaced, then the topology is reloaded from the store
    /// and discovery runs again.
    pub fn handle_failure(&self, addr: &NodeAddress) -> FailoverOutcome {
        {
            let inner = self.inner.borrow();
            if inner.state != ControllerState::Steady {
                debug!(%addr, state = %inner.state, "ignoring failure");
                return FailoverOutcome::Ignored;
            }
            if !inner.topology.contains(addr) {
                debug!(%addr, "ignoring failure of node outside the topology");
                return FailoverOutcome::Ignored;
            }
            // monitors keep running over a replica whose outage is known
            if !inner.topology.is_primary(addr)
                && inner.records.get(addr).is_some_and(|r| r.reported_down)
            {
                debug!(%addr, "replica still down");
                return FailoverOutcome::ReplicaDown(addr.clone());
            }
        }

        self.stop_monitoring();

        let is_primary = {
            let mut inner = self.inner.borrow_mut();
            if let Some(record) = inner.records.get_mut(addr) {
                record.connection.disconnect();
            }
            inner.topology.is_primary(addr)
        };

        let outcome = if is_primary {
            let outcome = self.fail_over(addr);
            self.complete_cycle();
            outcome
        } else {
            {
                let mut inner = self.inner.borrow_mut();
                if let Some(record) = inner.records.get_mut(addr) {
                    record.reported_down = true;
                }
                inner.alert(Alert::ReplicaDown(addr.clone()));
                inner.event(format!("replica {addr} is down"));
            }
            self.start_monitoring();
            FailoverOutcome::ReplicaDown(addr.clone())
        };

        self.flush_alerts();
        outcome
    }

    fn fail_over(&self, failed: &NodeAddress) -> FailoverOutcome {
        let candidate = {
            let mut inner = self.inner.borrow_mut();
            inner.state = ControllerState::FailingOver;
            inner.event(format!("primary {failed} is down"));
            inner.topology.promotion_candidate().cloned()
        };

        let Some(candidate) = candidate else {
            let mut inner = self.inner.borrow_mut();
            let reason = FailoverError::NoReplicaAvailable.to_string();
            warn!(%failed, "{reason}, running without a primary");
            inner.topology.clear_primary();
            inner.persist("primary", |store| store.set_primary(None));
            inner.alert(Alert::Degraded(reason.clone()));
            return FailoverOutcome::Degraded { reason };
        };

        match self.promote(&candidate) {
            Ok(Promotion::Promoted(report)) => FailoverOutcome::Promoted {
                primary: candidate,
                report,
            },
            Ok(Promotion::AlreadyPrimary) => FailoverOutcome::Promoted {
                report: ReslaveReport::new(candidate.clone()),
                primary: candidate,
            },
            Err(e) => {
                let reason = e.to_string();
                warn!("{reason}");
                self.inner
                    .borrow_mut()
                    .alert(Alert::Degraded(reason.clone()));
                FailoverOutcome::Degraded { reason }
            }
        }
    }

    /// Turns `candidate` into the primary and points the remaining
    /// replicas at it.
    ///
    /// The new primary is persisted before the replica list is touched.
    /// If the candidate refuses, the topology is left without a primary
    /// and the candidate stays a replica. Addresses the controller has
    /// never seen are rejected with [`FailoverError::UnknownNode`].
    pub fn promote(&self, candidate: &NodeAddress) -> Result<Promotion, FailoverError> {
        let remaining = {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            if inner.topology.is_primary(candidate) {
                return Ok(Promotion::AlreadyPrimary);
            }
            if !inner.topology.contains_replica(candidate) {
                return Err(if inner.records.contains_key(candidate) {
                    FailoverError::NotAReplica(candidate.clone())
                } else {
                    FailoverError::UnknownNode(candidate.clone())
                });
            }

            inner.event(format!("promoting {candidate}"));
            let reply = inner
                .record(candidate)
                .connection
                .execute(&Command::ReplicaOf { primary: None });
            let failure = match reply {
                Ok(reply) if reply.is_status("OK") => None,
                Ok(other) => Some(format!("unexpected reply {other:?}")),
                Err(e) => Some(e.to_string()),
            };
            if let Some(reason) = failure {
                inner.topology.clear_primary();
                inner.persist("primary", |store| store.set_primary(None));
                return Err(FailoverError::PromotionFailed {
                    addr: candidate.clone(),
                    reason,
                });
            }

            inner.topology.set_primary(candidate.clone());
            inner.record(candidate).role = NodeRole::Primary;
            inner.persist("primary", |store| store.set_primary(Some(candidate)));
            inner.persist("replica list", |store| store.remove_replica(candidate));
            inner.event(format!("{candidate} is now the primary"));

            let remaining = inner.topology.replicas().to_vec();
            if remaining.is_empty() {
                warn!(primary = %candidate, "no remaining replicas to reconfigure");
                inner.event("no remaining replicas".to_string());
                return Ok(Promotion::Promoted(ReslaveReport::new(candidate.clone())));
            }
            remaining
        };

        Ok(Promotion::Promoted(self.reslave_all(&remaining, candidate)))
    }

    /// Points every node in `remaining` at `new_primary`, in order.
    ///
    /// The persisted replica list is rebuilt from the nodes that accept.
    /// A node that refuses is dropped from the topology and reported;
    /// the rest carry on regardless.
    pub fn reslave_all(&self, remaining: &[NodeAddress], new_primary: &NodeAddress) -> ReslaveReport {
        let report = self.reslave_each(remaining, new_primary);
        self.flush_alerts();
        report
    }

    fn reslave_each(&self, remaining: &[NodeAddress], new_primary: &NodeAddress) -> ReslaveReport {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let mut report = ReslaveReport::new(new_primary.clone());
        inner.persist("replica list", |store| store.clear_replicas());

        let target = Some((new_primary.host().to_string(), new_primary.port()));
        for addr in remaining {
            let record = inner.record(addr);
            let reply = record.connection.execute(&Command::ReplicaOf {
                primary: target.clone(),
            });
            let failure = match reply {
                Ok(reply) if reply.is_status("OK") => None,
                Ok(other) => Some(format!("unexpected reply {other:?}")),
                Err(e) => Some(e.to_string()),
            };
            match failure {
                None => {
                    record.role = NodeRole::Replica;
                    inner.topology.add_replica(addr.clone());
                    inner.persist("replica list", |store| store.push_replica(addr));
                    inner.event(format!("{addr} now replicates {new_primary}"));
                    report.succeeded.push(addr.clone());
                }
                Some(reason) => {
                    inner.topology.remove_replica(addr);
                    inner.alert(Alert::ReslaveFailed {
                        addr: addr.clone(),
                        reason: reason.clone(),
                    });
                    report.failed.push((addr.clone(), reason));
                }
            }
        }

        if !report.is_complete() {
            warn!(
                primary = %new_primary,
                failed = report.failed.len(),
                "some replicas could not be reconfigured"
            );
        }
        report
    }

    /// Reloads the topology from the store, falling back to what is in
    /// memory, and rediscovers from scratch.
    fn complete_cycle(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.state == ControllerState::Shutdown {
                return;
            }
            let topology = match inner.store.load() {
                Ok(topology) => topology,
                Err(e) => {
                    warn!("failed to reload topology, using in-memory copy: {e}");
                    inner.topology.clone()
                }
            };
            inner.node_set = topology.nodes();
            inner.persisted = topology;
            inner.records.clear();
        }
        if let Err(e) = self.discover() {
            warn!("rediscovery failed: {e}");
        }
    }

    /// Stops monitoring, disconnects every node and stops the reactor.
    pub fn shutdown(&self) {
        if self.state() == ControllerState::Shutdown {
            return;
        }
        self.stop_monitoring();
        {
            let mut inner = self.inner.borrow_mut();
            for record in inner.records.values_mut() {
                record.connection.disconnect();
            }
            inner.state = ControllerState::Shutdown;
        }
        info!("controller shut down");
        self.reactor.stop();
    }
}

/// Asks a node for its replication role.
fn classify(conn: &mut NodeConnection) -> Result<NodeRole, NodeError> {
    let reply = conn.execute(&Command::Info {
        section: Some("replication".into()),
    })?;
    let text = match &reply {
        Frame::Bulk(_) | Frame::Simple(_) => reply.as_str(),
        _ => None,
    };
    match text {
        Some(text) => Ok(parse_info(text).role()),
        None => Err(NodeError::UnexpectedReply {
            command: "INFO",
            reply: format!("{reply:?}"),
        }),
    }
}
