/*!
 * Deadline-Bounded Execution
 *
 * Runs a unit of work under a [`TimeBudget`] in one of two disciplines:
 *
 * - **Cooperative** ([`ThreadMode::SameThread`]): the work runs inline on the
 *   calling thread and the deadline is checked only after it returns. A slow
 *   unit of work always runs to completion; this mode measures, it never
 *   enforces.
 * - **Preemptive** ([`ThreadMode::SeparateThread`]): the work runs on a fresh
 *   worker thread while the caller waits at most the budget. On expiry the
 *   caller captures the worker's diagnostic frames, interrupts it and returns
 *   immediately without waiting for it to exit.
 *
 * ## Outcomes
 *
 * Every invocation yields exactly one [`ExecutionOutcome`]:
 * the value, the work's own failure, or a missed deadline. Failures raised
 * by the work are surfaced unchanged: panics are resumed verbatim and `Err`
 * values from fallible work are returned as-is.
 *
 * ## Abandoned Workers
 *
 * Interruption is a request. A worker that never blocks in an interruptible
 * primitive and never calls [`crate::core::sync::check`] keeps running after
 * its caller has moved on, and whatever it holds (locks, files, scoped
 * guards) is released only when it eventually unwinds or returns, which
 * may be never. Each preemptive call owns its own worker, so such a leak
 * cannot starve later calls.
 *
 * ## Example
 *
 * ```
 * use assert_timeout::{TimeBudget, Timeout};
 *
 * let budget = TimeBudget::from_millis(500).unwrap();
 * let value = Timeout::preemptive(budget).run(|| "Tempus Fugit").unwrap();
 * assert_eq!(value, "Tempus Fugit");
 * ```
 */

pub mod config;
pub mod cooperative;
pub mod preemptive;
pub mod worker;

pub use config::{TimeoutConfig, TimeoutDeclaration, TimeoutMode};
pub use cooperative::CooperativeTimeout;
pub use preemptive::PreemptiveTimeout;
pub use worker::WorkerHandle;

use crate::core::TimeBudget;
use crate::diagnostics::StackSnapshot;
use crate::errors::{TimeoutError, TimeoutResult};
use crate::failure::{self, AssertionFailure, ExecutionTimeout, Message};
use crate::monitoring;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic;
use std::str::FromStr;
use std::time::Duration;

/// Execution discipline of a timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadMode {
    /// Run inline; check the deadline after completion
    #[default]
    SameThread,
    /// Run on a dedicated worker; interrupt it on expiry
    SeparateThread,
}

impl ThreadMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SameThread => "same_thread",
            Self::SeparateThread => "separate_thread",
        }
    }
}

impl fmt::Display for ThreadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreadMode {
    type Err = TimeoutError;

    fn from_str(text: &str) -> TimeoutResult<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "same_thread" => Ok(Self::SameThread),
            "separate_thread" => Ok(Self::SeparateThread),
            other => Err(TimeoutError::InvalidConfig(format!(
                "unknown thread mode '{other}', expected 'same_thread' or 'separate_thread'"
            ))),
        }
    }
}

/// Failure raised by the unit of work itself
pub enum WorkFailure<E> {
    /// Fallible work returned `Err`
    Error(E),
    /// The work panicked; carries the original payload
    Panic(Box<dyn Any + Send + 'static>),
}

impl<E: fmt::Debug> fmt::Debug for WorkFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(err) => f.debug_tuple("Error").field(err).finish(),
            Self::Panic(_) => f.write_str("Panic(..)"),
        }
    }
}

/// Diagnostic state of an abandoned worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerState {
    pub name: String,
    pub snapshot: StackSnapshot,
}

/// A missed deadline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedOut {
    budget: TimeBudget,
    elapsed: Duration,
    worker: Option<WorkerState>,
}

impl TimedOut {
    /// Work finished, but only after the budget ran out
    pub(crate) fn overrun(budget: TimeBudget, elapsed: Duration) -> Self {
        Self {
            budget,
            elapsed,
            worker: None,
        }
    }

    /// Worker was still running when the budget ran out
    pub(crate) fn abandoned(budget: TimeBudget, elapsed: Duration, worker: WorkerState) -> Self {
        Self {
            budget,
            elapsed,
            worker: Some(worker),
        }
    }

    pub fn budget(&self) -> TimeBudget {
        self.budget
    }

    /// Time from the start of the call until the miss was detected
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Elapsed time beyond the budget
    pub fn overrun_by(&self) -> Duration {
        self.elapsed.saturating_sub(self.budget.duration())
    }

    /// Abandoned worker, for preemptive timeouts
    pub fn worker(&self) -> Option<&WorkerState> {
        self.worker.as_ref()
    }

    /// Failure body, without any caller prefix
    pub fn body(&self) -> String {
        match self.worker {
            Some(_) => format!("execution timed out after {} ms", self.budget.as_millis()),
            None => format!(
                "execution exceeded timeout of {} ms by {} ms",
                self.budget.as_millis(),
                self.overrun_by().as_millis()
            ),
        }
    }

    /// Compose the structured failure for this miss
    pub fn into_failure(self, prefix: Option<&str>) -> AssertionFailure {
        let body = self.body();
        let cause = self.worker.map(|worker| {
            Box::new(ExecutionTimeout::new(worker.name, worker.snapshot)) as failure::Cause
        });
        failure::compose(prefix, body, cause)
    }
}

/// Result of one deadline-bounded invocation
#[derive(Debug)]
pub enum ExecutionOutcome<T, E> {
    Completed(T),
    Failed(WorkFailure<E>),
    TimedOut(TimedOut),
}

impl<T, E> ExecutionOutcome<T, E> {
    #[inline]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    #[inline]
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }

    /// Short name of the variant, for logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Failed(_) => "failed",
            Self::TimedOut(_) => "timed_out",
        }
    }

    /// Turn the outcome into the caller-facing result
    ///
    /// The message is resolved only for a missed deadline. A work panic is
    /// resumed on the calling thread with its original payload.
    pub fn resolve<'m>(self, message: impl Into<Message<'m>>) -> Result<T, E>
    where
        E: From<TimeoutError>,
    {
        match self {
            Self::Completed(value) => Ok(value),
            Self::Failed(WorkFailure::Error(err)) => Err(err),
            Self::Failed(WorkFailure::Panic(payload)) => panic::resume_unwind(payload),
            Self::TimedOut(timed_out) => {
                let prefix = message.into().resolve();
                let failure = timed_out.into_failure(prefix.as_deref());
                Err(E::from(TimeoutError::Failed(failure)))
            }
        }
    }
}

/// One execution discipline
///
/// Work is fallible (`Result<T, E>`); infallible work is wrapped by the
/// callers in [`Timeout`] and the strategy types.
pub trait TimeoutStrategy {
    /// Discipline implemented by this strategy
    fn thread_mode(&self) -> ThreadMode;

    /// Run `work` under `budget`
    ///
    /// Errors only when the invocation could not be carried out at all
    /// (for example, no worker thread could be spawned).
    fn execute<T, E, F>(&self, budget: TimeBudget, work: F) -> TimeoutResult<ExecutionOutcome<T, E>>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static;
}

/// Budget plus an explicitly chosen discipline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeout {
    budget: TimeBudget,
    thread_mode: ThreadMode,
}

impl Timeout {
    pub fn new(budget: TimeBudget, thread_mode: ThreadMode) -> Self {
        Self {
            budget,
            thread_mode,
        }
    }

    pub fn cooperative(budget: TimeBudget) -> Self {
        Self::new(budget, ThreadMode::SameThread)
    }

    pub fn preemptive(budget: TimeBudget) -> Self {
        Self::new(budget, ThreadMode::SeparateThread)
    }

    pub fn budget(&self) -> TimeBudget {
        self.budget
    }

    pub fn thread_mode(&self) -> ThreadMode {
        self.thread_mode
    }

    /// Run fallible `work` with the strategy for this timeout's mode
    pub fn execute<T, E, F>(&self, work: F) -> TimeoutResult<ExecutionOutcome<T, E>>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let span = monitoring::span_invocation(self.thread_mode, self.budget);
        let outcome = {
            let _entered = span.enter();
            match self.thread_mode {
                ThreadMode::SameThread => CooperativeTimeout.execute(self.budget, work),
                ThreadMode::SeparateThread => PreemptiveTimeout::new().execute(self.budget, work),
            }
        };

        if let Ok(outcome) = &outcome {
            span.record_outcome(outcome.label());
        }
        outcome
    }

    /// Run `work`, returning its value or the timeout failure
    pub fn run<T, F>(&self, work: F) -> TimeoutResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.run_with_message(work, Message::None)
    }

    /// Like [`Timeout::run`], prefixing any timeout failure with `message`
    pub fn run_with_message<'m, T, F>(&self, work: F, message: impl Into<Message<'m>>) -> TimeoutResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.try_run_with_message(move || Ok::<T, TimeoutError>(work()), message)
    }

    /// Run fallible `work`; its `Err` is returned unchanged
    pub fn try_run<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<TimeoutError> + Send + 'static,
    {
        self.try_run_with_message(work, Message::None)
    }

    /// Like [`Timeout::try_run`], prefixing any timeout failure with `message`
    pub fn try_run_with_message<'m, T, E, F>(&self, work: F, message: impl Into<Message<'m>>) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<TimeoutError> + Send + 'static,
    {
        self.execute(work)?.resolve(message)
    }
}
