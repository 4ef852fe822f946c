/*!
 * Timeout Assertions
 *
 * Panicking entry points for test code. Each returns the work's value, or
 * panics with the full failure report when the deadline is missed.
 *
 * Panics raised by the work itself propagate with their original payload.
 */

use crate::core::TimeBudget;
use crate::errors::{TimeoutError, TimeoutResult};
use crate::failure::Message;
use crate::timeout::{CooperativeTimeout, PreemptiveTimeout};
use std::time::Duration;

/// Assert that `work` completes within `timeout`, running it on the calling thread
///
/// The work always runs to completion; the deadline is checked afterwards.
///
/// ```
/// use assert_timeout::assert_timeout;
/// use std::time::Duration;
///
/// let greeting = assert_timeout(Duration::from_millis(500), || "Tempus Fugit");
/// assert_eq!(greeting, "Tempus Fugit");
/// ```
#[track_caller]
pub fn assert_timeout<T>(timeout: Duration, work: impl FnOnce() -> T) -> T {
    assert_timeout_with_message(timeout, work, Message::None)
}

/// Like [`assert_timeout`], prefixing the failure with `message`
///
/// A [`Message::Supplier`] is only called when the assertion fails.
#[track_caller]
pub fn assert_timeout_with_message<'m, T>(
    timeout: Duration,
    work: impl FnOnce() -> T,
    message: impl Into<Message<'m>>,
) -> T {
    let outcome = budget(timeout)
        .and_then(|budget| CooperativeTimeout.run_with_message(budget, work, message));
    settle(outcome)
}

/// Assert that `work` completes within `timeout`, running it on a worker thread
///
/// If the deadline passes first, the worker is interrupted and abandoned and
/// this call panics right away.
#[track_caller]
pub fn assert_timeout_preemptively<T, F>(timeout: Duration, work: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    assert_timeout_preemptively_with_message(timeout, work, Message::None)
}

/// Like [`assert_timeout_preemptively`], prefixing the failure with `message`
#[track_caller]
pub fn assert_timeout_preemptively_with_message<'m, T, F>(
    timeout: Duration,
    work: F,
    message: impl Into<Message<'m>>,
) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let outcome = budget(timeout)
        .and_then(|budget| PreemptiveTimeout::new().run_with_message(budget, work, message));
    settle(outcome)
}

fn budget(timeout: Duration) -> TimeoutResult<TimeBudget> {
    TimeBudget::try_from(timeout)
}

#[track_caller]
fn settle<T>(outcome: TimeoutResult<T>) -> T {
    match outcome {
        Ok(value) => value,
        Err(TimeoutError::Failed(failure)) => panic!("{}", failure.report()),
        Err(err) => panic!("{err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;

    fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
        payload
            .downcast_ref::<String>()
            .cloned()
            .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
            .unwrap_or_default()
    }

    #[test]
    fn test_returns_value_within_budget() {
        assert_eq!(assert_timeout(Duration::from_millis(500), || 7), 7);
        assert_eq!(assert_timeout_preemptively(Duration::from_millis(500), || 8), 8);
    }

    #[test]
    fn test_zero_timeout_is_a_caller_error() {
        let payload = panic::catch_unwind(|| assert_timeout(Duration::ZERO, || ())).unwrap_err();
        assert!(panic_message(payload).starts_with("Invalid timeout budget"));
    }
}
