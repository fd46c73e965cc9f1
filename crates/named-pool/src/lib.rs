//! Named Task Pool
//!
//! This crate provides a fixed-size pool of worker threads that run
//! caller-supplied tasks. Every task is submitted under a name, and any
//! thread (a worker running another task included) can block until the
//! task registered under that name has finished:
//! - [`ThreadPool`]: workers, the pending queue and the name registry
//! - [`Task`]: the unit of work, with its own [`Completion`] signal
//! - [`PoolConfig`]: worker count, thread naming and stack size
//!
//! A submitted task is owned by the pool until the first successful
//! [`ThreadPool::wait_for_task`] for its name, which drops it.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod pool;
pub mod task;

pub use config::PoolConfig;
pub use pool::{PoolStats, ThreadPool};
pub use task::{Completion, Task, TaskState};

/// Pool errors
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// Negative worker count
    #[error("Invalid worker count: {0} (must not be negative)")]
    InvalidWorkerCount(i64),

    /// Unparseable configuration value
    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidConfig {
        /// Configuration key (environment variable name)
        key: String,
        /// Why the value was rejected
        reason: String,
    },

    /// Worker thread could not be started
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// No task is registered under the name
    #[error("No such task: {0}")]
    NoSuchTask(String),

    /// The awaited task panicked while running
    #[error("Task '{name}' panicked: {message}")]
    TaskPanicked {
        /// Name the task was waited for under
        name: String,
        /// Panic payload, if it was a string
        message: String,
    },

    /// The pool has already been stopped
    #[error("Thread pool is stopped")]
    Stopped,

    /// `stop()` was called from one of the pool's own workers
    #[error("Cannot stop the pool from one of its worker threads")]
    StopFromWorker,

    /// A worker thread terminated abnormally
    #[error("Failed to join worker thread {0}")]
    JoinFailed(usize),
}

/// Pool operation result
pub type PoolResult<T> = Result<T, PoolError>;
