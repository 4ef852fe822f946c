/*!
 * Failure Reporting
 *
 * Composes the structured failure raised when a deadline is missed:
 * an optional caller prefix, a body describing the miss, and an optional
 * chained cause.
 *
 * ## Message Format
 *
 * - `<prefix> ==> <body>` when a non-blank prefix is supplied
 * - `<body>` otherwise
 *
 * Composition is pure: no I/O and no shared state.
 */

mod message;

pub use message::Message;

use crate::diagnostics::StackSnapshot;
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Separator between a caller prefix and the failure body
pub const PREFIX_SEPARATOR: &str = " ==> ";

/// Boxed error usable as a failure cause
pub type Cause = Box<dyn StdError + Send + Sync + 'static>;

/// Structured assertion failure with an optional cause
#[derive(Debug)]
pub struct AssertionFailure {
    message: String,
    cause: Option<Cause>,
}

impl AssertionFailure {
    /// Final failure message, prefix included
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Chained cause, preserved for inspection
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Chained cause as an [`ExecutionTimeout`], when a preemptive worker was abandoned
    pub fn execution_timeout(&self) -> Option<&ExecutionTimeout> {
        self.cause()?.downcast_ref::<ExecutionTimeout>()
    }

    /// Render the message followed by the whole cause chain
    ///
    /// Causes carrying a [`StackSnapshot`] are followed by its frames:
    ///
    /// ```text
    /// execution timed out after 100 ms
    /// Caused by: Execution timed out in thread assert-timeout-worker-3
    ///     at Latch::wait
    ///     at PreemptiveTimeout::worker
    /// ```
    pub fn report(&self) -> String {
        let mut report = self.message.clone();
        let mut next: Option<&(dyn StdError + 'static)> = self.source();
        while let Some(cause) = next {
            report.push_str("\nCaused by: ");
            report.push_str(&cause.to_string());
            if let Some(timeout) = cause.downcast_ref::<ExecutionTimeout>() {
                if !timeout.snapshot().is_empty() {
                    report.push('\n');
                    report.push_str(&timeout.snapshot().to_string());
                }
            }
            next = cause.source();
        }
        report
    }
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for AssertionFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_deref().map(|cause| cause as &(dyn StdError + 'static))
    }
}

/// Cause of a preemptive timeout: the abandoned worker and where it was
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Execution timed out in thread {worker}")]
pub struct ExecutionTimeout {
    worker: String,
    snapshot: StackSnapshot,
}

impl ExecutionTimeout {
    pub fn new(worker: impl Into<String>, snapshot: StackSnapshot) -> Self {
        Self {
            worker: worker.into(),
            snapshot,
        }
    }

    /// Name of the abandoned worker thread
    pub fn worker(&self) -> &str {
        &self.worker
    }

    /// Worker frames captured when the deadline was detected
    pub fn snapshot(&self) -> &StackSnapshot {
        &self.snapshot
    }
}

/// Compose a failure from an optional prefix, a body and an optional cause
pub fn compose(prefix: Option<&str>, body: impl Into<String>, cause: Option<Cause>) -> AssertionFailure {
    let body = body.into();
    let message = match prefix.filter(|p| !p.trim().is_empty()) {
        Some(prefix) => format!("{prefix}{PREFIX_SEPARATOR}{body}"),
        None => body,
    };
    AssertionFailure { message, cause }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::FrameRecorder;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_compose_without_prefix() {
        let failure = compose(None, "execution timed out after 100 ms", None);
        assert_eq!(failure.message(), "execution timed out after 100 ms");
        assert!(failure.cause().is_none());
        assert!(failure.source().is_none());
    }

    #[test]
    fn test_compose_with_prefix() {
        let failure = compose(
            Some("Tempus Fugit"),
            "execution exceeded timeout of 10 ms by 90 ms",
            None,
        );
        assert_eq!(
            failure.to_string(),
            "Tempus Fugit ==> execution exceeded timeout of 10 ms by 90 ms"
        );
    }

    #[test]
    fn test_blank_prefix_is_ignored() {
        assert_eq!(compose(Some("   "), "body", None).message(), "body");
    }

    #[test]
    fn test_cause_is_preserved_and_reported() {
        let recorder = FrameRecorder::new();
        let cause = ExecutionTimeout::new("assert-timeout-worker-3", recorder.snapshot());
        let failure = compose(None, "execution timed out after 100 ms", Some(Box::new(cause.clone())));

        assert_eq!(failure.execution_timeout(), Some(&cause));
        assert_eq!(
            failure.source().map(ToString::to_string).as_deref(),
            Some("Execution timed out in thread assert-timeout-worker-3")
        );
        assert_eq!(
            failure.report(),
            "execution timed out after 100 ms\nCaused by: Execution timed out in thread assert-timeout-worker-3"
        );
    }

    #[test]
    fn test_foreign_cause_is_reported() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let failure = compose(Some("setup"), "fixture failed", Some(Box::new(io)));
        assert!(failure.execution_timeout().is_none());
        assert_eq!(failure.report(), "setup ==> fixture failed\nCaused by: disk on fire");
    }
}
