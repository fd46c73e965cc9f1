//! Worker thread that executes queued tasks

use crate::config::PoolConfig;
use crate::pool::shared::SharedState;
use crate::task::{TaskCell, TaskState};
use crate::{PoolError, PoolResult};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

/// Worker thread that executes tasks
pub(crate) struct Worker {
    /// Worker ID
    id: usize,

    /// Worker thread handle
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Start a worker thread
    pub(crate) fn spawn(
        id: usize,
        config: &PoolConfig,
        shared: Arc<SharedState>,
    ) -> PoolResult<Self> {
        let mut builder = thread::Builder::new().name(config.worker_name(id));
        if let Some(size) = config.stack_size {
            builder = builder.stack_size(size);
        }

        let handle = builder
            .spawn(move || Worker::run_loop(id, shared))
            .map_err(PoolError::Spawn)?;

        Ok(Self {
            id,
            handle: Some(handle),
        })
    }

    /// Worker thread main loop
    ///
    /// Exits once the pool is stopped and no queued task is left.
    fn run_loop(id: usize, shared: Arc<SharedState>) {
        tracing::debug!(worker = id, "worker started");

        while let Some(cell) = shared.dequeue_blocking() {
            Self::execute(id, &shared, &cell);
        }

        tracing::debug!(worker = id, "worker shutting down");
    }

    /// Run one task and publish its outcome
    fn execute(id: usize, shared: &SharedState, cell: &TaskCell) {
        tracing::trace!(worker = id, "task started");
        cell.completion().mark_running();

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| cell.run())) {
            Ok(()) => TaskState::Completed,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(worker = id, %message, "task panicked");
                TaskState::Panicked(message)
            }
        };

        shared.record_finished(&outcome);
        cell.completion().finish(outcome);
        tracing::trace!(worker = id, "task finished");
    }

    /// Wait for the thread to exit
    pub(crate) fn join(&mut self) -> PoolResult<()> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| PoolError::JoinFailed(self.id)),
            None => Ok(()),
        }
    }

    /// Give up the thread without joining it
    pub(crate) fn detach(&mut self) {
        self.handle.take();
    }

    /// OS thread ID, while the thread has not been joined
    pub(crate) fn thread_id(&self) -> Option<ThreadId> {
        self.handle.as_ref().map(|handle| handle.thread().id())
    }

    /// Get the worker ID
    pub(crate) fn id(&self) -> usize {
        self.id
    }
}

/// Extract a readable message from a panic payload
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
