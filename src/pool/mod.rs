use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam::channel;
use log::{error, info};

use self::stages::StageContext;
use crate::cancel::CancelToken;
use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::job::{JobResult, PostProcessFn, ProcessFn, Resource};
use crate::Result;

mod guard;
mod report;
mod stages;

pub use self::report::{Report, Summary};

/// A bounded worker pool running one batch at a time.
///
/// Each call to [`begin_work`](Self::begin_work) wires three stages
/// together with two queues of capacity `workers`:
///
/// - the allocator turns resources into jobs, in order;
/// - `workers` threads process jobs concurrently;
/// - the collector post-processes results one at a time.
///
/// Full queues block the stage feeding them, so at most `workers` jobs
/// and `workers` results are buffered at any time.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    config: PoolConfig,
}

impl WorkerPool {
    /// Creates a pool with the given number of workers.
    ///
    /// # Errors
    ///
    /// Returns an error if `workers` is zero.
    pub fn new(workers: u32) -> Result<Self> {
        Self::with_config(PoolConfig::builder().workers(workers).build())
    }

    /// Creates a pool from a full configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker count or the job timeout is zero.
    pub fn with_config(config: PoolConfig) -> Result<Self> {
        if config.workers == 0 {
            return Err(PoolError::InvalidWorkerCount);
        }
        if config.job_timeout.is_some_and(|t| t.is_zero()) {
            return Err(PoolError::InvalidTimeout);
        }
        Ok(WorkerPool { config })
    }

    /// Number of workers, and capacity of each queue.
    pub fn workers(&self) -> u32 {
        self.config.workers
    }

    /// Processes `resources` and blocks until every result is collected.
    ///
    /// Failures of individual jobs do not stop the run; they are recorded
    /// on the results and counted in the returned [`Report`].
    ///
    /// # Errors
    ///
    /// Returns an error only if the pool itself fails: a thread cannot be
    /// spawned or a stage thread panics.
    pub fn begin_work<R, P, Q>(
        &self,
        resources: Vec<R>,
        process: P,
        post_process: Q,
    ) -> Result<Report<R>>
    where
        R: Resource,
        P: ProcessFn<R>,
        Q: PostProcessFn<R>,
    {
        self.begin_work_with_cancel(resources, process, post_process, &CancelToken::new())
    }

    /// Like [`begin_work`](Self::begin_work), but stops early once `cancel` fires.
    ///
    /// After cancellation no new jobs are allocated, and jobs already
    /// queued are collected with [`JobError::Cancelled`](crate::JobError::Cancelled)
    /// instead of being processed.
    pub fn begin_work_with_cancel<R, P, Q>(
        &self,
        resources: Vec<R>,
        process: P,
        post_process: Q,
        cancel: &CancelToken,
    ) -> Result<Report<R>>
    where
        R: Resource,
        P: ProcessFn<R>,
        Q: PostProcessFn<R>,
    {
        let start = Instant::now();
        let workers = self.config.workers;
        let capacity = workers as usize;
        let ctx = StageContext {
            thread_name: self.config.thread_name.clone(),
            job_timeout: self.config.job_timeout,
            cancel: cancel.clone(),
        };

        let (job_tx, job_rx) = channel::bounded(capacity);
        let (result_tx, result_rx) = channel::bounded::<JobResult<R>>(capacity);
        let (done_tx, done_rx) = channel::bounded(1);

        let allocator = {
            let cancel = cancel.clone();
            self.spawn_stage("allocator", move || {
                stages::allocate(resources, job_tx, &cancel)
            })?
        };
        let processor = {
            let ctx = ctx.clone();
            self.spawn_stage("processor", move || {
                stages::process_jobs(workers, job_rx, result_tx, process, &ctx)
            })?
        };
        let collector = self.spawn_stage("collector", move || {
            let collected = stages::collect(result_rx, post_process, &ctx);
            // The caller may have given up already.
            let _ = done_tx.send(collected);
        })?;

        // Block until the collector signals that everything is drained.
        let collected = done_rx.recv();

        let unallocated = join_stage(allocator, "allocation")?;
        join_stage(processor, "work")??;
        join_stage(collector, "collection")?;
        let results = collected.map_err(|_| PoolError::Disconnected)?;

        let elapsed = start.elapsed();
        info!("ALL PHASES DONE");
        info!("TOTAL TIME TAKEN: {}ms", elapsed.as_millis());

        Ok(Report::new(
            results,
            unallocated,
            cancel.is_cancelled(),
            elapsed,
            workers,
        ))
    }

    fn spawn_stage<T, F>(&self, stage: &str, f: F) -> Result<JoinHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(format!("{}-{stage}", self.config.thread_name))
            .spawn(f)?;
        Ok(handle)
    }
}

fn join_stage<T>(handle: JoinHandle<T>, stage: &'static str) -> Result<T> {
    handle.join().map_err(|_| {
        error!("{} stage panicked", stage);
        PoolError::StagePanicked(stage)
    })
}
