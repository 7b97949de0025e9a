use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::job::JobResult;

/// Everything a finished run produced.
///
/// Results are in collection order, which depends on worker scheduling
/// and is not the order of job IDs.
#[derive(Debug, Clone)]
pub struct Report<R> {
    /// Post-processed results, one per allocated job.
    pub results: Vec<JobResult<R>>,
    /// Number of results carrying an error.
    pub failures: usize,
    /// Resources never turned into jobs because the run was cancelled.
    pub unallocated: usize,
    /// Whether cancellation was requested during the run.
    pub cancelled: bool,
    /// Wall-clock time of the whole run.
    pub elapsed: Duration,
    /// Worker count the run used.
    pub workers: u32,
}

impl<R> Report<R> {
    pub(crate) fn new(
        results: Vec<JobResult<R>>,
        unallocated: usize,
        cancelled: bool,
        elapsed: Duration,
        workers: u32,
    ) -> Self {
        let failures = results.iter().filter(|r| !r.is_ok()).count();
        Report {
            results,
            failures,
            unallocated,
            cancelled,
            elapsed,
            workers,
        }
    }

    /// Returns `true` if every allocated job succeeded and nothing was left unallocated.
    pub fn is_success(&self) -> bool {
        self.failures == 0 && self.unallocated == 0
    }

    /// IDs of all collected jobs.
    pub fn job_ids(&self) -> BTreeSet<u64> {
        self.results.iter().map(|r| r.job.id).collect()
    }

    /// Results that carry an error.
    pub fn failed(&self) -> impl Iterator<Item = &JobResult<R>> {
        self.results.iter().filter(|r| !r.is_ok())
    }

    /// Returns the results sorted by job ID.
    pub fn into_sorted(mut self) -> Vec<JobResult<R>> {
        self.results.sort_by_key(|r| r.job.id);
        self.results
    }

    /// Condenses the report into counts.
    pub fn summary(&self) -> Summary {
        Summary {
            workers: self.workers,
            jobs: self.results.len(),
            succeeded: self.results.len() - self.failures,
            failed: self.failures,
            unallocated: self.unallocated,
            cancelled: self.cancelled,
            elapsed_ms: self.elapsed.as_millis() as u64,
        }
    }
}

/// Serializable digest of a [`Report`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Worker count.
    pub workers: u32,
    /// Number of collected results.
    pub jobs: usize,
    /// Results without an error.
    pub succeeded: usize,
    /// Results with an error.
    pub failed: usize,
    /// Resources never allocated.
    pub unallocated: usize,
    /// Whether the run was cancelled.
    pub cancelled: bool,
    /// Wall-clock time in milliseconds.
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JobError;
    use crate::job::Job;

    fn result(id: u64, err: Option<JobError>) -> JobResult<&'static str> {
        JobResult {
            job: Job { id, resource: "x" },
            value: 1,
            err,
        }
    }

    #[test]
    fn counts_failures() {
        let report = Report::new(
            vec![
                result(2, None),
                result(0, Some(JobError::Cancelled)),
                result(1, None),
            ],
            0,
            true,
            Duration::from_millis(12),
            2,
        );
        assert_eq!(report.failures, 1);
        assert!(!report.is_success());
        assert_eq!(report.failed().map(|r| r.job.id).collect::<Vec<_>>(), vec![0]);

        let summary = report.summary();
        assert_eq!(summary.jobs, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.elapsed_ms, 12);

        let ids: Vec<u64> = report.into_sorted().iter().map(|r| r.job.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }
}
