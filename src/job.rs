use std::fmt::Debug;

use crate::error::JobError;

/// An opaque, immutable unit of input data.
///
/// Implemented for every type that can be cloned, logged and shared
/// across threads. The reference scenario uses `String`.
pub trait Resource: Clone + Debug + Send + Sync + 'static {}

impl<T> Resource for T where T: Clone + Debug + Send + Sync + 'static {}

/// A resource tagged with its position in the input batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job<R> {
    /// Zero-based position of the resource in the batch.
    pub id: u64,
    /// The resource to process.
    pub resource: R,
}

/// The outcome of processing a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult<R> {
    /// The job this result belongs to.
    pub job: Job<R>,
    /// Value produced by processing.
    pub value: u32,
    /// Set if processing or post-processing failed.
    pub err: Option<JobError>,
}

impl<R> JobResult<R> {
    /// Builds a result from the output of a process function.
    pub fn new(job: Job<R>, output: std::result::Result<u32, JobError>) -> Self {
        match output {
            Ok(value) => JobResult {
                job,
                value,
                err: None,
            },
            Err(err) => JobResult {
                job,
                value: 0,
                err: Some(err),
            },
        }
    }

    /// Returns `true` if no error is recorded.
    pub fn is_ok(&self) -> bool {
        self.err.is_none()
    }

    /// Converts into the job and its outcome.
    pub fn into_parts(self) -> (Job<R>, std::result::Result<u32, JobError>) {
        match self.err {
            Some(err) => (self.job, Err(err)),
            None => (self.job, Ok(self.value)),
        }
    }
}

/// Processes a resource into a value.
///
/// Implemented for every matching closure. Implementors must eventually
/// return; use a job timeout if that cannot be guaranteed.
pub trait ProcessFn<R>: Send + Sync + 'static {
    /// Processes one resource.
    fn process(&self, resource: &R) -> std::result::Result<u32, JobError>;
}

impl<R, F> ProcessFn<R> for F
where
    F: Fn(&R) -> std::result::Result<u32, JobError> + Send + Sync + 'static,
{
    fn process(&self, resource: &R) -> std::result::Result<u32, JobError> {
        self(resource)
    }
}

/// Transforms a collected result.
///
/// Applied exactly once per result, sequentially, by the collector.
pub trait PostProcessFn<R>: Send + Sync + 'static {
    /// Post-processes one result.
    fn post_process(&self, result: JobResult<R>) -> JobResult<R>;
}

impl<R, F> PostProcessFn<R> for F
where
    F: Fn(JobResult<R>) -> JobResult<R> + Send + Sync + 'static,
{
    fn post_process(&self, result: JobResult<R>) -> JobResult<R> {
        self(result)
    }
}
