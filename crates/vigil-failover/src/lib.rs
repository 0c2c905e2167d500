//! vigil-failover: health checks and automatic failover for a
//! primary/replica fleet.
//!
//! # Architecture
//!
//! - **Connections**: one blocking RESP connection per node, bounded by
//!   connect/read/write timeouts
//! - **Reactor**: a small single-threaded event loop trait, backed by
//!   tokio in production and driven by hand in tests
//! - **Monitoring**: one periodic PING per node
//! - **Failover**: promote the first replica, repoint the others
//! - **Persistence**: topology mirrored into a [`TopologyStore`]
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::rc::Rc;
//! use vigil_failover::{
//!     ControllerConfig, FailoverController, LogAlerter, MemoryStore, TokioReactor,
//! };
//!
//! let reactor = Rc::new(TokioReactor::new()?);
//! let config = ControllerConfig {
//!     seeds: vec!["10.0.0.1:6379".parse()?, "10.0.0.2:6379".parse()?],
//!     ..Default::default()
//! };
//! let controller = FailoverController::new(
//!     config,
//!     reactor.clone(),
//!     Box::new(MemoryStore::new()),
//!     Box::new(LogAlerter),
//! );
//! controller.start(false)?;
//! reactor.run();
//! ```

#[cfg(not(unix))]
compile_error!("vigil-failover registers raw socket descriptors and requires a unix target");

mod alert;
pub mod connection;
pub mod controller;
mod error;
pub mod info;
pub mod monitor;
pub mod reactor;
pub mod store;
mod topology;

pub use alert::{Alert, Alerter, LogAlerter};
pub use connection::{ConnectionConfig, NodeConnection};
pub use controller::{
    ControllerConfig, ControllerError, ControllerState, ControllerStatus, FailoverController,
    FailoverOutcome, NodeStatus, Promotion, ReslaveReport,
};
pub use error::{ConnectionError, FailoverError, NodeError, StoreError};
pub use info::{parse_info, NodeInfo};
pub use monitor::{HealthMonitor, ProbeOutcome, DEFAULT_CHECK_INTERVAL};
pub use reactor::{ManualReactor, Reactor, ReaderHandle, TaskHandle, TokioReactor};
pub use store::{MemoryStore, RespTopologyStore, StoreWrite, TopologyStore};
pub use topology::{AddressParseError, NodeAddress, NodeRole, Topology, DEFAULT_PORT};
