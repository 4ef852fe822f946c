/*!
 * Preemptive Timeouts
 *
 * Separate-thread execution with an enforced deadline.
 *
 * ## Race Resolution
 *
 * The caller waits on the worker's result channel until the deadline:
 *
 * 1. A result (value, `Err`, or panic) that arrives first is surfaced exactly
 *    as in cooperative mode. The worker exits on its own; it is not interrupted.
 * 2. If the deadline passes first, the outcome is a timeout no matter what
 *    the worker does afterwards. The caller snapshots the worker's frames,
 *    interrupts it and returns without waiting for it.
 *
 * A worker that reports a failure whose text looks like a timeout is still
 * case 1: only the deadline decides classification.
 */

use super::worker::{WorkerHandle, WorkerReport};
use super::{ExecutionOutcome, ThreadMode, TimedOut, TimeoutStrategy, WorkFailure};
use crate::core::TimeBudget;
use crate::errors::{TimeoutError, TimeoutResult};
use crate::failure::Message;
use std::time::Instant;

/// Runs work on a dedicated, interruptible worker thread
#[derive(Debug, Clone, Copy, Default)]
pub struct PreemptiveTimeout {
    stack_size: Option<usize>,
}

impl PreemptiveTimeout {
    pub const fn new() -> Self {
        Self { stack_size: None }
    }

    /// Stack size of spawned workers, in bytes
    pub const fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Run `work` on a worker, failing if it has not finished within `budget`
    pub fn run<T, F>(&self, budget: TimeBudget, work: F) -> TimeoutResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.run_with_message(budget, work, Message::None)
    }

    /// Like [`PreemptiveTimeout::run`], prefixing any failure with `message`
    pub fn run_with_message<'m, T, F>(
        &self,
        budget: TimeBudget,
        work: F,
        message: impl Into<Message<'m>>,
    ) -> TimeoutResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.try_run_with_message(budget, move || Ok::<T, TimeoutError>(work()), message)
    }

    /// Run fallible `work`; an `Err` reported before the deadline is returned unchanged
    pub fn try_run<T, E, F>(&self, budget: TimeBudget, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<TimeoutError> + Send + 'static,
    {
        self.try_run_with_message(budget, work, Message::None)
    }

    /// Like [`PreemptiveTimeout::try_run`], prefixing any failure with `message`
    pub fn try_run_with_message<'m, T, E, F>(
        &self,
        budget: TimeBudget,
        work: F,
        message: impl Into<Message<'m>>,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<TimeoutError> + Send + 'static,
    {
        self.execute(budget, work)?.resolve(message)
    }
}

impl TimeoutStrategy for PreemptiveTimeout {
    fn thread_mode(&self) -> ThreadMode {
        ThreadMode::SeparateThread
    }

    fn execute<T, E, F>(&self, budget: TimeBudget, work: F) -> TimeoutResult<ExecutionOutcome<T, E>>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let start = Instant::now();
        let deadline = budget.deadline_from(start);
        let mut worker = WorkerHandle::spawn(work, self.stack_size)?;

        let outcome = match worker.wait_until(deadline) {
            WorkerReport::Finished(Ok(value)) => ExecutionOutcome::Completed(value),
            WorkerReport::Finished(Err(err)) => ExecutionOutcome::Failed(WorkFailure::Error(err)),
            WorkerReport::Panicked(payload) => ExecutionOutcome::Failed(WorkFailure::Panic(payload)),
            WorkerReport::Pending => {
                let elapsed = start.elapsed();
                let state = worker.abandon();
                ExecutionOutcome::TimedOut(TimedOut::abandoned(budget, elapsed, state))
            }
            WorkerReport::Lost => {
                return Err(TimeoutError::WorkerLost {
                    worker: worker.name().to_string(),
                })
            }
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sync::Latch;
    use crate::core::WORKER_NAME_PREFIX;
    use std::thread;
    use std::time::Duration;

    fn millis(value: u64) -> TimeBudget {
        TimeBudget::from_millis(value).unwrap()
    }

    #[test]
    fn test_value_returned_from_worker_thread() {
        let caller = thread::current().id();
        let (value, name, same_thread) = PreemptiveTimeout::new()
            .run(millis(500), move || {
                let current = thread::current();
                ("Tempus Fugit", current.name().map(str::to_string), current.id() == caller)
            })
            .unwrap();

        assert_eq!(value, "Tempus Fugit");
        assert!(!same_thread, "should have executed in a different thread");
        assert!(name.unwrap().starts_with(WORKER_NAME_PREFIX));
    }

    #[test]
    fn test_blocked_worker_times_out_with_snapshot() {
        let start = Instant::now();
        let outcome: ExecutionOutcome<(), ()> = PreemptiveTimeout::new()
            .execute(millis(100), || {
                let _ = Latch::new(1).wait();
                Ok(())
            })
            .unwrap();

        assert!(start.elapsed() < Duration::from_secs(5), "caller must not wait on the worker");
        match outcome {
            ExecutionOutcome::TimedOut(timed_out) => {
                assert_eq!(timed_out.body(), "execution timed out after 100 ms");
                assert!(timed_out.elapsed() >= Duration::from_millis(100));
                let worker = timed_out.worker().unwrap();
                assert!(worker.snapshot.contains("Latch", "wait"));
            }
            other => panic!("expected a timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_err_before_deadline_is_not_reclassified() {
        let outcome: ExecutionOutcome<(), String> = PreemptiveTimeout::new()
            .execute(millis(500), || Err("execution timed out after 1 ms".to_string()))
            .unwrap();
        assert!(matches!(
            outcome,
            ExecutionOutcome::Failed(WorkFailure::Error(ref msg)) if msg == "execution timed out after 1 ms"
        ));
    }

    #[test]
    fn test_custom_stack_size() {
        let timeout = PreemptiveTimeout::new().with_stack_size(256 * 1024);
        assert_eq!(timeout.run(millis(500), || 21 * 2).unwrap(), 42);
        assert_eq!(timeout.thread_mode(), ThreadMode::SeparateThread);
    }
}
