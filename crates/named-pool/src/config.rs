//! Pool configuration

use crate::{PoolError, PoolResult};

/// Default prefix for worker thread names
pub const DEFAULT_THREAD_NAME: &str = "named-pool-worker";

/// Environment variable holding the worker count
pub const ENV_WORKERS: &str = "NAMED_POOL_WORKERS";

/// Environment variable holding the worker thread name prefix
pub const ENV_THREAD_NAME: &str = "NAMED_POOL_THREAD_NAME";

/// Environment variable holding the worker stack size in bytes
pub const ENV_STACK_SIZE: &str = "NAMED_POOL_STACK_SIZE";

/// Worker pool configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker threads (0 is allowed; nothing will ever run)
    pub worker_count: usize,

    /// Worker thread name prefix; threads are named `{thread_name}-{id}`
    pub thread_name: String,

    /// Stack size for worker threads (None = platform default)
    pub stack_size: Option<usize>,
}

impl PoolConfig {
    /// Create a configuration with an explicit worker count
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Self::default()
        }
    }

    /// Create a configuration from a signed worker count, rejecting negatives
    pub fn with_worker_count(worker_count: i64) -> PoolResult<Self> {
        if worker_count < 0 {
            return Err(PoolError::InvalidWorkerCount(worker_count));
        }
        let count = usize::try_from(worker_count).map_err(|_| PoolError::InvalidConfig {
            key: ENV_WORKERS.to_string(),
            reason: format!("{} exceeds the platform limit of {}", worker_count, usize::MAX),
        })?;
        Ok(Self::new(count))
    }

    /// Check values that the OS would otherwise reject when starting workers
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidConfig` if the thread name contains a NUL byte.
    pub fn validate(&self) -> PoolResult<()> {
        if self.thread_name.contains('\0') {
            return Err(PoolError::InvalidConfig {
                key: ENV_THREAD_NAME.to_string(),
                reason: "thread name may not contain NUL bytes".to_string(),
            });
        }
        Ok(())
    }

    /// Load configuration from environment variables
    ///
    /// Unset variables fall back to [`PoolConfig::default`].
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidWorkerCount` for a negative `NAMED_POOL_WORKERS`
    /// and `PoolError::InvalidConfig` for any value that does not parse or that
    /// fails [`PoolConfig::validate`].
    pub fn from_env() -> PoolResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub(crate) fn from_lookup<F>(lookup: F) -> PoolResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(ENV_WORKERS) {
            Some(raw) => {
                let count: i64 = raw.trim().parse().map_err(|e| PoolError::InvalidConfig {
                    key: ENV_WORKERS.to_string(),
                    reason: format!("{}", e),
                })?;
                Self::with_worker_count(count)?
            }
            None => Self::default(),
        };

        if let Some(name) = lookup(ENV_THREAD_NAME) {
            config = config.thread_name(name);
        }

        if let Some(raw) = lookup(ENV_STACK_SIZE) {
            let size: usize = raw.trim().parse().map_err(|e| PoolError::InvalidConfig {
                key: ENV_STACK_SIZE.to_string(),
                reason: format!("{}", e),
            })?;
            config = config.stack_size(size);
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the worker thread name prefix
    pub fn thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }

    /// Set the worker thread stack size
    pub fn stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    /// Name for the worker with the given index
    pub(crate) fn worker_name(&self, id: usize) -> String {
        format!("{}-{}", self.thread_name, id)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            stack_size: None,
        }
    }
}
