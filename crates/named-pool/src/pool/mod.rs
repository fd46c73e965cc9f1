//! Worker Pool
//!
//! Fixed set of worker threads pulling from one FIFO queue, with a name
//! registry that lets any thread block on a specific task.

#[allow(clippy::module_inception)]
mod pool;
mod shared;
mod worker;

pub use pool::{PoolStats, ThreadPool};
