//! Single-threaded event reactor abstraction.
//!
//! The controller only ever talks to a `dyn Reactor`, so the same code
//! runs on tokio in production and on [`ManualReactor`] in tests, where
//! time advances only when the test says so.

mod manual;
mod runtime;

use std::os::unix::io::BorrowedFd;
use std::time::Duration;

pub use self::manual::ManualReactor;
pub use self::runtime::TokioReactor;

/// Work the reactor invokes: a readiness or timer callback.
pub type Callback = Box<dyn FnMut()>;

/// Identifies a periodic task registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

impl TaskHandle {
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Identifies a readable-descriptor registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReaderHandle(u64);

impl ReaderHandle {
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// The operations the failover core needs from an event loop.
///
/// Every method takes `&self`; implementations are single-threaded and
/// keep their registrations behind interior mutability so callbacks may
/// register or cancel work while the reactor is dispatching.
pub trait Reactor {
    /// Invokes `callback` whenever `fd` becomes readable. The descriptor
    /// is only borrowed; implementations that need it beyond this call
    /// duplicate it.
    fn add_reader(&self, fd: BorrowedFd<'_>, callback: Callback) -> ReaderHandle;

    /// Unregisters a reader. Unknown handles are ignored.
    fn remove_reader(&self, handle: ReaderHandle);

    /// Invokes `task` every `interval`, first firing one interval from now.
    fn schedule_periodic(&self, interval: Duration, task: Callback) -> TaskHandle;

    /// Cancels a periodic task. Takes effect immediately: the task does not
    /// fire again, even if it was due in the current dispatch round.
    fn cancel(&self, handle: TaskHandle);

    /// Dispatches events until [`Reactor::stop`] is called.
    fn run(&self);

    /// Makes `run` return after the current callback completes.
    fn stop(&self);
}
