//! State shared between the pool handle and its workers
//!
//! The pending queue, the name registry and the stop flag live behind one
//! pool-wide lock. Nothing outside this module sees the collections; callers
//! go through `submit`, `dequeue_blocking`, `take_by_name` and friends.

use crate::task::{TaskCell, TaskState};
use crate::{PoolError, PoolResult};
use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Everything guarded by the pool lock
struct Inner {
    /// Tasks submitted but not yet started, oldest first
    queue: VecDeque<Arc<TaskCell>>,

    /// Name -> task, from submission until a waiter takes it
    registry: FxHashMap<String, Arc<TaskCell>>,

    /// Set once by `signal_stop`
    stopped: bool,
}

impl Inner {
    fn enqueue(&mut self, cell: Arc<TaskCell>) {
        self.queue.push_back(cell);
    }

    /// Register `cell` under `name` unless the name is already live
    fn register_name(&mut self, name: String, cell: Arc<TaskCell>) -> bool {
        match self.registry.entry(name) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(cell);
                true
            }
        }
    }
}

/// Lifetime counters, updated outside the pool lock
#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
}

/// Shared pool state
pub(crate) struct SharedState {
    inner: Mutex<Inner>,

    /// Signalled when work is enqueued or the pool stops
    work_available: Condvar,

    counters: Counters,
}

impl SharedState {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                registry: FxHashMap::default(),
                stopped: false,
            }),
            work_available: Condvar::new(),
            counters: Counters::default(),
        }
    }

    /// Queue a task and register it under `name`
    ///
    /// Returns `Ok(false)` when the name was already registered: the task is
    /// still queued and will run, but the registry keeps the earlier task.
    pub(crate) fn submit(&self, name: String, cell: Arc<TaskCell>) -> PoolResult<bool> {
        let mut inner = self.inner.lock();
        if inner.stopped {
            return Err(PoolError::Stopped);
        }

        inner.enqueue(cell.clone());
        let registered = inner.register_name(name, cell);
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);

        self.work_available.notify_one();
        Ok(registered)
    }

    /// Block until a task is available, or the pool is stopped and drained
    ///
    /// Returns `None` only once the stop flag is set and the queue is empty.
    pub(crate) fn dequeue_blocking(&self) -> Option<Arc<TaskCell>> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(cell) = inner.queue.pop_front() {
                return Some(cell);
            }
            if inner.stopped {
                return None;
            }
            self.work_available.wait(&mut inner);
        }
    }

    /// Remove and return the task registered under `name`
    pub(crate) fn take_by_name(&self, name: &str) -> PoolResult<Arc<TaskCell>> {
        let mut inner = self.inner.lock();
        if inner.stopped {
            return Err(PoolError::Stopped);
        }
        inner
            .registry
            .remove(name)
            .ok_or_else(|| PoolError::NoSuchTask(name.to_string()))
    }

    /// Look up the task registered under `name` without removing it
    pub(crate) fn peek_by_name(&self, name: &str) -> Option<Arc<TaskCell>> {
        self.inner.lock().registry.get(name).cloned()
    }

    /// Set the stop flag and wake every idle worker
    ///
    /// Returns `false` if the pool was already stopped.
    pub(crate) fn signal_stop(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.stopped {
            return false;
        }
        inner.stopped = true;
        self.work_available.notify_all();
        true
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.inner.lock().stopped
    }

    /// Count a finished task
    pub(crate) fn record_finished(&self, outcome: &TaskState) {
        match outcome {
            TaskState::Panicked(_) => self.counters.panicked.fetch_add(1, Ordering::Relaxed),
            _ => self.counters.completed.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// (pending, registered) lengths
    pub(crate) fn lengths(&self) -> (usize, usize) {
        let inner = self.inner.lock();
        (inner.queue.len(), inner.registry.len())
    }

    pub(crate) fn submitted(&self) -> u64 {
        self.counters.submitted.load(Ordering::Relaxed)
    }

    pub(crate) fn completed(&self) -> u64 {
        self.counters.completed.load(Ordering::Relaxed)
    }

    pub(crate) fn panicked(&self) -> u64 {
        self.counters.panicked.load(Ordering::Relaxed)
    }
}
