/*!
 * Cooperative Timeouts
 *
 * Same-thread execution with an after-the-fact deadline check.
 *
 * The work runs inline and is never cancelled: a unit of work that takes ten
 * times its budget still runs to the end, and only then is the overrun
 * reported. Use [`super::PreemptiveTimeout`] when the caller must regain
 * control at the deadline.
 */

use super::{ExecutionOutcome, ThreadMode, TimedOut, TimeoutStrategy, WorkFailure};
use crate::core::TimeBudget;
use crate::errors::{TimeoutError, TimeoutResult};
use crate::failure::Message;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

/// Measures work run on the calling thread
///
/// Needs nothing but a monotonic clock, so the work may borrow from the
/// caller and need not be `Send`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CooperativeTimeout;

impl CooperativeTimeout {
    /// Run `work` inline and classify the result against `budget`
    ///
    /// A failure raised by the work wins over an overrun: it is reported as
    /// [`ExecutionOutcome::Failed`] however long the work took.
    pub fn measure<T, E, F>(&self, budget: TimeBudget, work: F) -> ExecutionOutcome<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let start = Instant::now();
        // The payload is resumed unchanged by `resolve`, so no broken state is observed here
        let result = panic::catch_unwind(AssertUnwindSafe(work));
        let elapsed = start.elapsed();

        match result {
            Err(payload) => ExecutionOutcome::Failed(WorkFailure::Panic(payload)),
            Ok(Err(err)) => ExecutionOutcome::Failed(WorkFailure::Error(err)),
            Ok(Ok(_)) if elapsed >= budget.duration() => {
                ExecutionOutcome::TimedOut(TimedOut::overrun(budget, elapsed))
            }
            Ok(Ok(value)) => ExecutionOutcome::Completed(value),
        }
    }

    /// Run `work`, failing if it took `budget` or longer
    pub fn run<T>(&self, budget: TimeBudget, work: impl FnOnce() -> T) -> TimeoutResult<T> {
        self.run_with_message(budget, work, Message::None)
    }

    /// Like [`CooperativeTimeout::run`], prefixing any failure with `message`
    pub fn run_with_message<'m, T>(
        &self,
        budget: TimeBudget,
        work: impl FnOnce() -> T,
        message: impl Into<Message<'m>>,
    ) -> TimeoutResult<T> {
        self.try_run_with_message(budget, || Ok::<T, TimeoutError>(work()), message)
    }

    /// Run fallible `work`; its `Err` is returned unchanged
    pub fn try_run<T, E>(&self, budget: TimeBudget, work: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<TimeoutError>,
    {
        self.try_run_with_message(budget, work, Message::None)
    }

    /// Like [`CooperativeTimeout::try_run`], prefixing any failure with `message`
    pub fn try_run_with_message<'m, T, E>(
        &self,
        budget: TimeBudget,
        work: impl FnOnce() -> Result<T, E>,
        message: impl Into<Message<'m>>,
    ) -> Result<T, E>
    where
        E: From<TimeoutError>,
    {
        self.measure(budget, work).resolve(message)
    }
}

impl TimeoutStrategy for CooperativeTimeout {
    fn thread_mode(&self) -> ThreadMode {
        ThreadMode::SameThread
    }

    fn execute<T, E, F>(&self, budget: TimeBudget, work: F) -> TimeoutResult<ExecutionOutcome<T, E>>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        Ok(self.measure(budget, work))
    }
}
