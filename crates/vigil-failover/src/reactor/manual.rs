//! Caller-driven reactor.
//!
//! Nothing happens until the owner calls [`ManualReactor::tick`] or
//! [`ManualReactor::fire_readable`]. Tests use it to step health checks
//! one round at a time; `run` gives a crude sleep-and-tick loop for dry
//! runs without tokio.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::os::unix::io::{AsRawFd, BorrowedFd, RawFd};
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use super::{Callback, Reactor, ReaderHandle, TaskHandle};

type Shared = Rc<RefCell<Callback>>;

struct Periodic {
    interval: Duration,
    callback: Shared,
}

struct Reader {
    fd: RawFd,
    callback: Shared,
}

/// A deterministic reactor for tests.
#[derive(Default)]
pub struct ManualReactor {
    next_id: Cell<u64>,
    tasks: RefCell<BTreeMap<u64, Periodic>>,
    readers: RefCell<BTreeMap<u64, Reader>>,
    stopped: Cell<bool>,
    ticks: Cell<u64>,
}

impl ManualReactor {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }

    /// Fires every periodic task registered before this call, once, in
    /// registration order. A task cancelled by an earlier callback in the
    /// same round is skipped; tasks registered during the round wait for
    /// the next one. Returns how many tasks fired.
    pub fn tick(&self) -> usize {
        self.ticks.set(self.ticks.get() + 1);
        let ids: Vec<u64> = self.tasks.borrow().keys().copied().collect();
        let mut fired = 0;
        for id in ids {
            let callback = match self.tasks.borrow().get(&id) {
                Some(task) => Rc::clone(&task.callback),
                None => continue,
            };
            (callback.borrow_mut())();
            fired += 1;
        }
        fired
    }

    /// Runs `n` ticks, returning the total number of firings.
    pub fn tick_n(&self, n: usize) -> usize {
        (0..n).map(|_| self.tick()).sum()
    }

    /// Invokes every reader callback registered for `fd`. Returns how
    /// many ran.
    pub fn fire_readable(&self, fd: RawFd) -> usize {
        let ids: Vec<u64> = self
            .readers
            .borrow()
            .iter()
            .filter(|(_, r)| r.fd == fd)
            .map(|(id, _)| *id)
            .collect();
        let mut fired = 0;
        for id in ids {
            let callback = match self.readers.borrow().get(&id) {
                Some(reader) => Rc::clone(&reader.callback),
                None => continue,
            };
            (callback.borrow_mut())();
            fired += 1;
        }
        fired
    }

    pub fn task_count(&self) -> usize {
        self.tasks.borrow().len()
    }

    pub fn reader_count(&self) -> usize {
        self.readers.borrow().len()
    }

    /// Descriptors with a registered reader, in registration order.
    pub fn reader_fds(&self) -> Vec<RawFd> {
        self.readers.borrow().values().map(|r| r.fd).collect()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.get()
    }

    /// Number of ticks so far, including those driven by `run`.
    pub fn ticks(&self) -> u64 {
        self.ticks.get()
    }
}

impl Reactor for ManualReactor {
    fn add_reader(&self, fd: BorrowedFd<'_>, callback: Callback) -> ReaderHandle {
        let id = self.next_id();
        self.readers.borrow_mut().insert(
            id,
            Reader {
                fd: fd.as_raw_fd(),
                callback: Rc::new(RefCell::new(callback)),
            },
        );
        ReaderHandle::from_raw(id)
    }

    fn remove_reader(&self, handle: ReaderHandle) {
        self.readers.borrow_mut().remove(&handle.id());
    }

    fn schedule_periodic(&self, interval: Duration, task: Callback) -> TaskHandle {
        let id = self.next_id();
        self.tasks.borrow_mut().insert(
            id,
            Periodic {
                interval,
                callback: Rc::new(RefCell::new(task)),
            },
        );
        TaskHandle::from_raw(id)
    }

    fn cancel(&self, handle: TaskHandle) {
        self.tasks.borrow_mut().remove(&handle.id());
    }

    /// Sleeps for the shortest registered interval and ticks, until
    /// stopped or nothing is left to run. Readers are only dispatched
    /// through `fire_readable`.
    fn run(&self) {
        loop {
            if self.stopped.get() {
                break;
            }
            let next = self.tasks.borrow().values().map(|t| t.interval).min();
            let Some(interval) = next else {
                break;
            };
            thread::sleep(interval);
            if self.stopped.get() {
                break;
            }
            self.tick();
        }
    }

    fn stop(&self) {
        self.stopped.set(true);
    }
}
