//! Periodic health checks.
//!
//! A [`HealthMonitor`] owns one periodic reactor task for one node. The
//! probe itself and what happens with its outcome are supplied by the
//! controller; the monitor only guarantees that firings for a node never
//! overlap and that results arriving after `stop` are dropped.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use tracing::debug;
use vigil_protocol::Command;

use crate::connection::NodeConnection;
use crate::reactor::{Reactor, TaskHandle};
use crate::topology::NodeAddress;

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(1000);

/// Result of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Healthy,
    Failed(String),
}

/// Sends PING and expects `+PONG`. Any other reply, and any error, is a
/// failure.
pub fn probe(conn: &mut NodeConnection) -> ProbeOutcome {
    debug!(addr = %conn.address(), "pinging");
    match conn.execute(&Command::Ping) {
        Ok(reply) if reply.is_status("PONG") => ProbeOutcome::Healthy,
        Ok(other) => ProbeOutcome::Failed(format!("unexpected reply to PING: {other:?}")),
        Err(e) => ProbeOutcome::Failed(e.to_string()),
    }
}

#[derive(Debug, Default)]
struct Flags {
    active: Cell<bool>,
    in_flight: Cell<bool>,
}

/// Health check schedule for one node.
#[derive(Debug)]
pub struct HealthMonitor {
    addr: NodeAddress,
    interval: Duration,
    task: Option<TaskHandle>,
    flags: Rc<Flags>,
}

impl HealthMonitor {
    pub fn new(addr: NodeAddress, interval: Duration) -> Self {
        Self {
            addr,
            interval,
            task: None,
            flags: Rc::new(Flags::default()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.flags.active.get()
    }

    /// True while a probe for this node is running.
    pub fn is_probing(&self) -> bool {
        self.flags.in_flight.get()
    }

    /// Schedules the periodic check. `check` runs the probe, returning
    /// `None` when there was nothing to probe; `report` receives each
    /// outcome unless the monitor was stopped in the meantime.
    ///
    /// Starting an active monitor does nothing.
    pub fn start<C, R>(&mut self, reactor: &dyn Reactor, mut check: C, mut report: R)
    where
        C: FnMut() -> Option<ProbeOutcome> + 'static,
        R: FnMut(ProbeOutcome) + 'static,
    {
        if self.is_active() {
            return;
        }
        // a fresh set of flags detaches any callback left over from an
        // earlier start
        self.flags = Rc::new(Flags::default());
        self.flags.active.set(true);

        let flags = Rc::clone(&self.flags);
        let addr = self.addr.clone();
        let task = reactor.schedule_periodic(
            self.interval,
            Box::new(move || {
                if !flags.active.get() || flags.in_flight.get() {
                    return;
                }
                flags.in_flight.set(true);
                let outcome = check();
                flags.in_flight.set(false);

                let Some(outcome) = outcome else {
                    return;
                };
                if !flags.active.get() {
                    debug!(%addr, "monitor stopped during probe, discarding result");
                    return;
                }
                report(outcome);
            }),
        );
        self.task = Some(task);
        debug!(addr = %self.addr, interval_ms = self.interval.as_millis() as u64, "monitor started");
    }

    /// Cancels the periodic task. Safe to call when not running.
    pub fn stop(&mut self, reactor: &dyn Reactor) {
        self.flags.active.set(false);
        if let Some(task) = self.task.take() {
            reactor.cancel(task);
            debug!(addr = %self.addr, "monitor stopped");
        }
    }
}
