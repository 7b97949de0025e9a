use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{Receiver, Sender};
use log::{debug, error, info, warn};

use super::guard::{self, Deadline};
use crate::cancel::CancelToken;
use crate::error::{JobError, PoolError};
use crate::job::{Job, JobResult, PostProcessFn, ProcessFn, Resource};
use crate::Result;

/// Settings shared by every stage of one run.
#[derive(Clone)]
pub(crate) struct StageContext {
    pub(crate) thread_name: String,
    pub(crate) job_timeout: Option<Duration>,
    pub(crate) cancel: CancelToken,
}

/// Turns resources into jobs, in input order.
///
/// Returns the number of resources left unallocated. Dropping `jobs` on
/// return tells the workers no more jobs will come.
pub(crate) fn allocate<R: Resource>(
    resources: Vec<R>,
    jobs: Sender<Job<R>>,
    cancel: &CancelToken,
) -> usize {
    let total = resources.len();
    let mut allocated = 0;

    for (id, resource) in resources.into_iter().enumerate() {
        if cancel.is_cancelled() {
            info!("Allocation cancelled after {} of {} jobs", allocated, total);
            break;
        }
        let job = Job {
            id: id as u64,
            resource,
        };
        if jobs.send(job).is_err() {
            warn!("Job queue closed after {} of {} jobs", allocated, total);
            break;
        }
        allocated += 1;
    }

    drop(jobs);
    info!("ALLOCATION PHASE DONE ({} jobs)", allocated);
    total - allocated
}

/// Fans jobs out to `workers` threads and waits for all of them.
///
/// The result queue is closed only after every worker has been joined,
/// so the collector cannot observe the end of the stream early.
pub(crate) fn process_jobs<R, P>(
    workers: u32,
    jobs: Receiver<Job<R>>,
    results: Sender<JobResult<R>>,
    process: P,
    ctx: &StageContext,
) -> Result<()>
where
    R: Resource,
    P: ProcessFn<R>,
{
    info!("SPAWNING {} WORKERS", workers);

    let process = Arc::new(process);
    let mut handles = Vec::with_capacity(workers as usize);
    let mut spawn_err = None;

    for id in 0..workers {
        let jobs = jobs.clone();
        let results = results.clone();
        let process = Arc::clone(&process);
        let ctx = ctx.clone();
        let spawned = thread::Builder::new()
            .name(format!("{}-worker-{id}", ctx.thread_name))
            .spawn(move || do_work(id, jobs, results, process, ctx));
        match spawned {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                error!("Failed to spawn worker {id}: {}", e);
                spawn_err = Some(e);
                break;
            }
        }
    }
    drop(jobs);

    let mut panicked = false;
    for handle in handles {
        if handle.join().is_err() {
            error!("Worker thread panicked");
            panicked = true;
        }
    }

    drop(results);
    info!("WORK PHASE DONE");

    if let Some(e) = spawn_err {
        return Err(PoolError::Io(e));
    }
    if panicked {
        return Err(PoolError::StagePanicked("worker"));
    }
    Ok(())
}

fn do_work<R, P>(
    id: u32,
    jobs: Receiver<Job<R>>,
    results: Sender<JobResult<R>>,
    process: Arc<P>,
    ctx: StageContext,
) where
    R: Resource,
    P: ProcessFn<R>,
{
    let mut deadline = ctx.job_timeout.map(|limit| {
        let process = Arc::clone(&process);
        let name = format!("{}-worker-{id}-call", ctx.thread_name);
        Deadline::new(name, limit, move |resource: R| process.process(&resource))
    });

    for job in jobs.iter() {
        let output = if ctx.cancel.is_cancelled() {
            Err(JobError::Cancelled)
        } else {
            match deadline.as_mut() {
                Some(deadline) => deadline.call(job.resource.clone()).and_then(|out| out),
                None => guard::catch(|| process.process(&job.resource)).and_then(|out| out),
            }
        };
        let res = JobResult::new(job, output);

        match &res.err {
            Some(e) => warn!("Error processing job ID [{}]: {}", res.job.id, e),
            None => info!(
                "Processed job ID [{}] with resource: {:?} and output: {}",
                res.job.id, res.job.resource, res.value
            ),
        }

        if results.send(res).is_err() {
            debug!("Worker {id}: result queue closed, shutting down");
            return;
        }
    }
    debug!("Worker {id}: job queue closed, shutting down");
}

/// Drains results one at a time, post-processing each exactly once.
///
/// Returns every collected result once the result queue is closed and empty.
pub(crate) fn collect<R, Q>(
    results: Receiver<JobResult<R>>,
    post_process: Q,
    ctx: &StageContext,
) -> Vec<JobResult<R>>
where
    R: Resource,
    Q: PostProcessFn<R>,
{
    let post_process = Arc::new(post_process);
    let mut deadline = ctx.job_timeout.map(|limit| {
        let post_process = Arc::clone(&post_process);
        let name = format!("{}-collector-call", ctx.thread_name);
        Deadline::new(name, limit, move |res: JobResult<R>| post_process.post_process(res))
    });
    let mut collected = Vec::new();

    for res in results.iter() {
        let fallback = res.clone();
        let output = match deadline.as_mut() {
            Some(deadline) => deadline.call(res),
            None => guard::catch(|| post_process.post_process(res)),
        };
        let res = output.unwrap_or_else(|err| keep_first_error(fallback, err));

        match &res.err {
            Some(e) => warn!(
                "Error post-processing result with job ID [{}]: {}",
                res.job.id, e
            ),
            None => info!(
                "Completed job ID [{}] with resource: {:?} and final output: {}",
                res.job.id, res.job.resource, res.value
            ),
        }

        collected.push(res);
    }

    info!("COLLECTION PHASE DONE ({} results)", collected.len());
    collected
}

/// Records a post-processing failure without hiding an earlier processing error.
fn keep_first_error<R>(res: JobResult<R>, err: JobError) -> JobResult<R> {
    let JobResult {
        job,
        value,
        err: first,
    } = res;
    let err = match first {
        Some(first) => {
            warn!(
                "Job ID [{}] also failed while post-processing: {}",
                job.id, err
            );
            first
        }
        None => err,
    };
    JobResult {
        job,
        value,
        err: Some(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel;

    fn ctx() -> StageContext {
        StageContext {
            thread_name: "test".to_owned(),
            job_timeout: None,
            cancel: CancelToken::new(),
        }
    }

    #[test]
    fn allocate_assigns_ids_in_input_order() {
        let (tx, rx) = channel::unbounded();
        let left = allocate(vec!["a", "b", "c"], tx, &CancelToken::new());
        assert_eq!(left, 0);

        let jobs: Vec<Job<&str>> = rx.iter().collect();
        assert_eq!(
            jobs,
            vec![
                Job { id: 0, resource: "a" },
                Job { id: 1, resource: "b" },
                Job { id: 2, resource: "c" },
            ]
        );
    }

    #[test]
    fn allocate_stops_when_cancelled() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let (tx, rx) = channel::unbounded();
        let left = allocate(vec![1, 2, 3, 4], tx, &cancel);
        assert_eq!(left, 4);
        assert!(rx.iter().next().is_none());
    }

    #[test]
    fn cancelled_workers_skip_processing() {
        let ctx = ctx();
        ctx.cancel.cancel();
        let (job_tx, job_rx) = channel::unbounded();
        let (res_tx, res_rx) = channel::unbounded();
        job_tx.send(Job { id: 0, resource: 5u32 }).unwrap();
        drop(job_tx);

        let process = |_: &u32| -> std::result::Result<u32, JobError> {
            panic!("must not be called after cancellation")
        };
        process_jobs(1, job_rx, res_tx, process, &ctx).unwrap();

        let res: Vec<JobResult<u32>> = res_rx.iter().collect();
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].err, Some(JobError::Cancelled));
    }

    #[test]
    fn post_process_panic_keeps_the_result() {
        let (tx, rx) = channel::unbounded();
        tx.send(JobResult {
            job: Job { id: 4, resource: "e" },
            value: 9,
            err: None,
        })
        .unwrap();
        drop(tx);

        let post = |_: JobResult<&'static str>| -> JobResult<&'static str> { panic!("post") };
        let collected = collect(rx, post, &ctx());
        assert_eq!(collected.len(), 1);
        assert_eq!(collected[0].job.id, 4);
        assert_eq!(collected[0].value, 9);
        assert_eq!(collected[0].err, Some(JobError::Panicked("post".to_owned())));
    }

    #[test]
    fn post_process_failure_keeps_process_error() {
        let (tx, rx) = channel::unbounded();
        tx.send(JobResult {
            job: Job { id: 1, resource: "b" },
            value: 0,
            err: Some(JobError::Process("bad input".to_owned())),
        })
        .unwrap();
        drop(tx);

        let post = |_: JobResult<&'static str>| -> JobResult<&'static str> { panic!("post") };
        let collected = collect(rx, post, &ctx());
        assert_eq!(
            collected[0].err,
            Some(JobError::Process("bad input".to_owned()))
        );
    }

    #[test]
    fn post_process_timeout_keeps_process_error() {
        let limit = Duration::from_millis(20);
        let ctx = StageContext {
            job_timeout: Some(limit),
            ..ctx()
        };
        let (tx, rx) = channel::unbounded();
        tx.send(JobResult {
            job: Job { id: 0, resource: "a" },
            value: 0,
            err: Some(JobError::Process("bad input".to_owned())),
        })
        .unwrap();
        tx.send(JobResult {
            job: Job { id: 1, resource: "b" },
            value: 0,
            err: None,
        })
        .unwrap();
        drop(tx);

        let post = |res: JobResult<&'static str>| {
            thread::sleep(Duration::from_millis(100));
            res
        };
        let collected = collect(rx, post, &ctx);
        assert_eq!(
            collected[0].err,
            Some(JobError::Process("bad input".to_owned()))
        );
        assert_eq!(collected[1].err, Some(JobError::TimedOut(limit)));
    }
}
