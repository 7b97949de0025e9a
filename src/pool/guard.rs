use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::debug;

use crate::error::JobError;

/// Runs `f`, turning a panic into `JobError::Panicked`.
pub(crate) fn catch<O>(f: impl FnOnce() -> O) -> Result<O, JobError> {
    panic::catch_unwind(AssertUnwindSafe(f))
        .map_err(|payload| JobError::Panicked(panic_message(payload.as_ref())))
}

/// Runs calls on one long-lived helper thread, waiting at most `limit` for each.
///
/// Calls never overlap. Once a call overruns, every later call fails with
/// `JobError::TimedOut` without running until the overrunning call returns.
pub(crate) struct Deadline<I, O> {
    name: String,
    limit: Duration,
    call: Arc<dyn Fn(I) -> O + Send + Sync>,
    helper: Option<Helper<I, O>>,
}

struct Helper<I, O> {
    input: Sender<I>,
    output: Receiver<Result<O, JobError>>,
    busy: bool,
}

impl<I, O> Deadline<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    pub(crate) fn new<F>(name: String, limit: Duration, call: F) -> Self
    where
        F: Fn(I) -> O + Send + Sync + 'static,
    {
        Deadline {
            name,
            limit,
            call: Arc::new(call),
            helper: None,
        }
    }

    /// Runs `call(input)` on the helper thread, spawning it on first use.
    pub(crate) fn call(&mut self, input: I) -> Result<O, JobError> {
        let mut helper = match self.helper.take() {
            Some(helper) => helper,
            None => self.spawn()?,
        };

        if helper.busy {
            match helper.output.try_recv() {
                // The overrunning call finished; its output is stale.
                Ok(_) => helper.busy = false,
                Err(TryRecvError::Empty) => {
                    self.helper = Some(helper);
                    return Err(JobError::TimedOut(self.limit));
                }
                Err(TryRecvError::Disconnected) => return Err(exited()),
            }
        }

        if helper.input.send(input).is_err() {
            return Err(exited());
        }
        match helper.output.recv_timeout(self.limit) {
            Ok(out) => {
                self.helper = Some(helper);
                out
            }
            Err(RecvTimeoutError::Timeout) => {
                debug!("{}: call overran {}ms", self.name, self.limit.as_millis());
                helper.busy = true;
                self.helper = Some(helper);
                Err(JobError::TimedOut(self.limit))
            }
            Err(RecvTimeoutError::Disconnected) => Err(exited()),
        }
    }

    fn spawn(&self) -> Result<Helper<I, O>, JobError> {
        let (input_tx, input_rx) = channel::bounded::<I>(1);
        let (output_tx, output_rx) = channel::bounded(1);
        let call = Arc::clone(&self.call);

        thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                for input in input_rx.iter() {
                    if output_tx.send(catch(|| (*call)(input))).is_err() {
                        return;
                    }
                }
            })
            .map_err(|e| JobError::Spawn(e.to_string()))?;

        Ok(Helper {
            input: input_tx,
            output: output_rx,
            busy: false,
        })
    }
}

fn exited() -> JobError {
    JobError::Panicked("call thread exited without a result".to_owned())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn catch_keeps_panic_message() {
        let out = catch(|| -> u32 { panic!("bad resource") });
        assert_eq!(out, Err(JobError::Panicked("bad resource".to_owned())));

        let out = catch(|| -> u32 { panic!("job {}", 7) });
        assert_eq!(out, Err(JobError::Panicked("job 7".to_owned())));
    }

    #[test]
    fn deadline_passes_through_fast_calls() {
        let mut deadline = Deadline::new("test-call".to_owned(), Duration::from_secs(5), |x: u32| x * 2);
        assert_eq!(deadline.call(21), Ok(42));
        assert_eq!(deadline.call(4), Ok(8));
    }

    #[test]
    fn deadline_catches_panics() {
        let mut deadline = Deadline::new("test-call".to_owned(), Duration::from_secs(5), |x: u32| {
            if x == 0 {
                panic!("zero");
            }
            x
        });
        assert_eq!(deadline.call(0), Err(JobError::Panicked("zero".to_owned())));
        assert_eq!(deadline.call(3), Ok(3));
    }

    #[test]
    fn overrun_blocks_later_calls_until_it_returns() {
        let limit = Duration::from_millis(20);
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let mut deadline = Deadline::new("test-call".to_owned(), limit, move |slow: bool| {
            counted.fetch_add(1, Ordering::SeqCst);
            if slow {
                thread::sleep(Duration::from_millis(150));
            }
            1u32
        });

        assert_eq!(deadline.call(true), Err(JobError::TimedOut(limit)));
        // The helper is still busy, so this call never runs.
        assert_eq!(deadline.call(false), Err(JobError::TimedOut(limit)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        thread::sleep(Duration::from_millis(300));
        assert_eq!(deadline.call(false), Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
