//! Thread pool handle: construction, submission, waiting and shutdown

use crate::config::PoolConfig;
use crate::pool::shared::SharedState;
use crate::pool::worker::Worker;
use crate::task::{Task, TaskCell, TaskState};
use crate::{PoolError, PoolResult};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Pool statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of worker threads the pool was built with
    pub workers: usize,

    /// Total tasks submitted
    pub tasks_submitted: u64,

    /// Total tasks whose `run` returned normally
    pub tasks_completed: u64,

    /// Total tasks whose `run` panicked
    pub tasks_panicked: u64,

    /// Tasks queued and not yet started
    pub pending: usize,

    /// Names currently registered (submitted, not yet waited for)
    pub registered: usize,
}

/// Fixed-size worker pool with name-addressed tasks
///
/// Share it through an `Arc` when tasks need to submit or wait themselves.
/// The pool lock is never held while a task runs or while a caller waits,
/// so both are safe from inside a task (with the single-worker caveat that a
/// task must not wait on one that is still queued behind it).
pub struct ThreadPool {
    /// Queue, registry and stop flag
    shared: Arc<SharedState>,

    /// Worker threads; emptied by `stop`
    workers: Mutex<Vec<Worker>>,

    /// Thread IDs of the workers, fixed at construction
    worker_threads: Vec<ThreadId>,

    /// Number of workers started
    worker_count: usize,
}

impl ThreadPool {
    /// Create a pool and start `worker_count` workers
    pub fn new(worker_count: usize) -> PoolResult<Self> {
        Self::with_config(PoolConfig::new(worker_count))
    }

    /// Create a pool from a configuration
    ///
    /// The configuration is validated first. If any worker fails to start,
    /// the ones already running are stopped and joined before the error is
    /// returned.
    pub fn with_config(config: PoolConfig) -> PoolResult<Self> {
        config.validate()?;

        let shared = Arc::new(SharedState::new());
        let mut workers = Vec::with_capacity(config.worker_count);

        for id in 0..config.worker_count {
            match Worker::spawn(id, &config, shared.clone()) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    tracing::error!(worker = id, error = %e, "failed to start worker");
                    shared.signal_stop();
                    for worker in &mut workers {
                        if worker.join().is_err() {
                            tracing::error!(worker = worker.id(), "worker did not exit cleanly");
                        }
                    }
                    return Err(e);
                }
            }
        }

        tracing::debug!(workers = config.worker_count, "thread pool started");

        let worker_threads = workers.iter().filter_map(Worker::thread_id).collect();
        Ok(Self {
            shared,
            workers: Mutex::new(workers),
            worker_threads,
            worker_count: config.worker_count,
        })
    }

    /// Submit a task under `name`
    ///
    /// The pool owns the task from here on. If `name` is still registered from
    /// an earlier submission, the new task is queued and runs, but the name
    /// keeps referring to the earlier task and the new one cannot be waited
    /// for; it is dropped by its worker once it has run.
    pub fn submit_task<T: Task>(&self, name: impl Into<String>, task: T) -> PoolResult<()> {
        let name = name.into();
        let cell = Arc::new(TaskCell::new(Box::new(task)));

        if !self.shared.submit(name.clone(), cell)? {
            tracing::warn!(task = %name, "task name already registered; new task is not waitable");
        }
        Ok(())
    }

    /// Block until the task registered under `name` has finished, then drop it
    ///
    /// The name is unregistered before blocking, so only one caller can ever
    /// wait for a given submission.
    ///
    /// # Errors
    ///
    /// - `NoSuchTask` if nothing is registered under `name`
    /// - `TaskPanicked` if the task's `run` panicked (the task is still dropped)
    /// - `Stopped` if the pool has been stopped
    pub fn wait_for_task(&self, name: &str) -> PoolResult<()> {
        let cell = self.shared.take_by_name(name)?;

        let outcome = cell.completion().wait();
        cell.reclaim();
        tracing::trace!(task = name, "task reclaimed");

        match outcome {
            TaskState::Panicked(message) => Err(PoolError::TaskPanicked {
                name: name.to_string(),
                message,
            }),
            _ => Ok(()),
        }
    }

    /// Current state of the task registered under `name`, if any
    pub fn task_state(&self, name: &str) -> Option<TaskState> {
        self.shared
            .peek_by_name(name)
            .map(|cell| cell.completion().state())
    }

    /// Stop all workers and join them
    ///
    /// Every submitted task should have been waited for first. Workers finish
    /// whatever is still queued before exiting. The pool cannot be used
    /// afterwards.
    ///
    /// # Errors
    ///
    /// - `StopFromWorker` if called from one of this pool's workers
    /// - `Stopped` if the pool was already stopped
    /// - `JoinFailed` if a worker thread terminated abnormally
    pub fn stop(&self) -> PoolResult<()> {
        if self.on_worker_thread() {
            return Err(PoolError::StopFromWorker);
        }

        let mut workers = self.workers.lock();
        if !self.shared.signal_stop() {
            return Err(PoolError::Stopped);
        }

        let mut result = Ok(());
        for worker in workers.iter_mut() {
            if let Err(e) = worker.join() {
                tracing::error!(worker = worker.id(), "worker did not exit cleanly");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        workers.clear();

        tracing::debug!(workers = self.worker_count, "thread pool stopped");
        result
    }

    /// Whether the calling thread is one of this pool's workers
    fn on_worker_thread(&self) -> bool {
        let current = thread::current().id();
        self.worker_threads.contains(&current)
    }

    /// Whether `stop` has been called
    pub fn is_stopped(&self) -> bool {
        self.shared.is_stopped()
    }

    /// Number of workers the pool was started with
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Snapshot of pool statistics
    pub fn stats(&self) -> PoolStats {
        let (pending, registered) = self.shared.lengths();
        PoolStats {
            workers: self.worker_count,
            tasks_submitted: self.shared.submitted(),
            tasks_completed: self.shared.completed(),
            tasks_panicked: self.shared.panicked(),
            pending,
            registered,
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shared.signal_stop();

        // The last handle can be dropped by a task running on a worker;
        // that thread cannot join itself, so every worker is left to exit
        // on its own.
        let detach = self.on_worker_thread();
        let workers = self.workers.get_mut();
        if detach {
            workers.iter_mut().for_each(Worker::detach);
            return;
        }

        for worker in workers.iter_mut() {
            if worker.join().is_err() {
                tracing::error!(worker = worker.id(), "worker did not exit cleanly");
            }
        }
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("worker_count", &self.worker_count)
            .field("stopped", &self.shared.is_stopped())
            .finish()
    }
}
