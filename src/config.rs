//! Configuration for a [`WorkerPool`](crate::WorkerPool).
//!
//! ```
//! use std::time::Duration;
//! use workpool::PoolConfig;
//!
//! let config = PoolConfig::builder()
//!     .workers(4)
//!     .job_timeout(Duration::from_secs(2))
//!     .build();
//! assert_eq!(config.workers, 4);
//! ```

use std::time::Duration;

/// Settings for a worker pool.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of workers. Also the capacity of both queues.
    pub workers: u32,
    /// Deadline for each process and post-process call. `None` waits forever.
    ///
    /// Calls still never overlap: each worker and the collector run their
    /// calls on one helper thread. While an overrunning call is still
    /// running, later calls from the same stage fail with `TimedOut`
    /// without being made.
    pub job_timeout: Option<Duration>,
    /// Prefix for the names of spawned threads.
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get() as u32,
            job_timeout: None,
            thread_name: "workpool".to_owned(),
        }
    }
}

impl PoolConfig {
    /// Starts a builder from the defaults.
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }
}

/// Builder for [`PoolConfig`] with method chaining.
#[derive(Debug, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    /// Sets the number of workers.
    pub fn workers(mut self, workers: u32) -> Self {
        self.config.workers = workers;
        self
    }

    /// Sets the per-call deadline.
    pub fn job_timeout(mut self, timeout: Duration) -> Self {
        self.config.job_timeout = Some(timeout);
        self
    }

    /// Sets the thread name prefix.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    /// Finishes the builder. Validation happens when the pool is created.
    pub fn build(self) -> PoolConfig {
        self.config
    }
}
