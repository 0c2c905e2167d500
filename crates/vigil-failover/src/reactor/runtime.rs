//! Production reactor on a current-thread tokio runtime.
//!
//! Periodic tasks and readers are `spawn_local` tasks on a [`LocalSet`],
//! so callbacks can hold `Rc` state. Callbacks run synchronously; a
//! periodic task's next tick is only awaited once its callback returns.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io;
use std::os::unix::io::{AsRawFd, BorrowedFd};
use std::rc::Rc;
use std::time::Duration;

use tokio::io::unix::AsyncFd;
use tokio::io::Interest;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::Notify;
use tokio::task::{JoinHandle, LocalSet};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::warn;

use super::{Callback, Reactor, ReaderHandle, TaskHandle};

pub struct TokioReactor {
    // dropped before the runtime so spawned tasks release their
    // registrations while the driver still exists
    local: LocalSet,
    runtime: Runtime,
    next_id: Cell<u64>,
    tasks: RefCell<HashMap<u64, JoinHandle<()>>>,
    readers: RefCell<HashMap<u64, JoinHandle<()>>>,
    stop: Rc<Notify>,
}

impl TokioReactor {
    pub fn new() -> io::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            local: LocalSet::new(),
            runtime,
            next_id: Cell::new(0),
            tasks: RefCell::new(HashMap::new()),
            readers: RefCell::new(HashMap::new()),
            stop: Rc::new(Notify::new()),
        })
    }

    fn next_id(&self) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }
}

impl Reactor for TokioReactor {
    fn add_reader(&self, fd: BorrowedFd<'_>, mut callback: Callback) -> ReaderHandle {
        let id = self.next_id();
        let raw = fd.as_raw_fd();
        // register a duplicate we own: the caller may close its descriptor
        // and have the number reused before this task is torn down
        let owned = match fd.try_clone_to_owned() {
            Ok(owned) => owned,
            Err(e) => {
                warn!(fd = raw, "failed to duplicate descriptor: {e}");
                return ReaderHandle::from_raw(id);
            }
        };
        let handle = self.local.spawn_local(async move {
            let async_fd = match AsyncFd::with_interest(owned, Interest::READABLE) {
                Ok(async_fd) => async_fd,
                Err(e) => {
                    warn!(fd = raw, "failed to register reader: {e}");
                    return;
                }
            };
            loop {
                let mut guard = match async_fd.readable().await {
                    Ok(guard) => guard,
                    Err(e) => {
                        warn!(fd = raw, "reader readiness error: {e}");
                        return;
                    }
                };
                callback();
                guard.clear_ready();
            }
        });
        self.readers.borrow_mut().insert(id, handle);
        ReaderHandle::from_raw(id)
    }

    fn remove_reader(&self, handle: ReaderHandle) {
        if let Some(task) = self.readers.borrow_mut().remove(&handle.id()) {
            task.abort();
        }
    }

    fn schedule_periodic(&self, interval: Duration, mut task: Callback) -> TaskHandle {
        let id = self.next_id();
        let handle = self.local.spawn_local(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                task();
            }
        });
        self.tasks.borrow_mut().insert(id, handle);
        TaskHandle::from_raw(id)
    }

    fn cancel(&self, handle: TaskHandle) {
        if let Some(task) = self.tasks.borrow_mut().remove(&handle.id()) {
            task.abort();
        }
    }

    fn run(&self) {
        let stop = Rc::clone(&self.stop);
        self.local
            .block_on(&self.runtime, async move { stop.notified().await });
    }

    fn stop(&self) {
        // notify_one keeps a permit, so a stop issued before run still counts
        self.stop.notify_one();
    }
}

impl Drop for TokioReactor {
    fn drop(&mut self) {
        for (_, task) in self.tasks.get_mut().drain() {
            task.abort();
        }
        for (_, task) in self.readers.get_mut().drain() {
            task.abort();
        }
    }
}
