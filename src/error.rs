use std::io;
use std::time::Duration;

use thiserror::Error;

/// Error type for pool operations.
///
/// These only cover failures of the pool itself. Failures of individual
/// jobs are carried on their results as a [`JobError`].
#[derive(Error, Debug)]
pub enum PoolError {
    /// A pool needs at least one worker.
    #[error("Worker count must be at least 1")]
    InvalidWorkerCount,

    /// A job timeout of zero would fail every job.
    #[error("Job timeout must be greater than zero")]
    InvalidTimeout,

    /// IO error, e.g. when spawning a stage thread.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error.
    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A stage thread panicked outside of the caller-supplied functions.
    #[error("{0} stage panicked")]
    StagePanicked(&'static str),

    /// The collector went away without signalling completion.
    #[error("Completion channel disconnected")]
    Disconnected,
}

/// Result type alias for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;

/// Failure of a single job, recorded on its result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// The process function reported a failure.
    #[error("process failed: {0}")]
    Process(String),

    /// The post-process function reported a failure.
    #[error("post-process failed: {0}")]
    PostProcess(String),

    /// The call did not return within the configured job timeout.
    #[error("timed out after {}ms", .0.as_millis())]
    TimedOut(Duration),

    /// No thread could be spawned to run the call under its deadline.
    #[error("failed to spawn call thread: {0}")]
    Spawn(String),

    /// The call panicked.
    #[error("panicked: {0}")]
    Panicked(String),

    /// The run was cancelled before the job was processed.
    #[error("cancelled")]
    Cancelled,
}
