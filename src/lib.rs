#![deny(missing_docs)]

//! A bounded fan-out/fan-in worker pool.
//!
//! A batch of resources flows through three concurrent stages: an
//! allocator that turns resources into numbered jobs, a fixed number of
//! workers that process jobs in parallel, and a collector that
//! post-processes results one at a time. Stages are connected by bounded
//! queues sized to the worker count, which gives natural backpressure.

mod cancel;
mod config;
pub mod demo;
mod error;
mod job;
mod pool;

pub use cancel::CancelToken;
pub use config::{PoolConfig, PoolConfigBuilder};
pub use error::{JobError, PoolError, Result};
pub use job::{Job, JobResult, PostProcessFn, ProcessFn, Resource};
pub use pool::{Report, Summary, WorkerPool};
