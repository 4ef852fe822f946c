/*!
 * Error Types
 * Centralized error handling with thiserror and miette
 */

use crate::failure::AssertionFailure;
use miette::Diagnostic;
use thiserror::Error;

/// Errors surfaced by a timeout-bounded invocation
///
/// Errors raised by the unit of work itself are never wrapped in this type:
/// panics are resumed verbatim and `Err` values from fallible work are
/// returned as-is.
#[derive(Error, Debug, Diagnostic)]
pub enum TimeoutError {
    #[error("Invalid timeout budget: {0}")]
    #[diagnostic(
        code(timeout::invalid_budget),
        help("Timeouts must be strictly positive.")
    )]
    InvalidBudget(String),

    #[error("Invalid timeout configuration: {0}")]
    #[diagnostic(
        code(timeout::invalid_config),
        help("Check the ASSERT_TIMEOUT_* environment variables or the JSON configuration.")
    )]
    InvalidConfig(String),

    #[error("Failed to spawn timeout worker thread: {0}")]
    #[diagnostic(
        code(timeout::spawn_failed),
        help("The system may be out of threads or memory for new stacks.")
    )]
    Spawn(#[source] std::io::Error),

    #[error("Timeout worker {worker} exited without reporting a result")]
    #[diagnostic(code(timeout::worker_lost))]
    WorkerLost { worker: String },

    /// The deadline was missed
    #[error(transparent)]
    Failed(#[from] AssertionFailure),
}

impl TimeoutError {
    /// Check if this error reports a missed deadline
    #[inline(always)]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Check if this error was caused by the caller (budget or configuration)
    #[inline(always)]
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::InvalidBudget(_) | Self::InvalidConfig(_))
    }

    /// Borrow the timeout failure, if this is one
    pub fn failure(&self) -> Option<&AssertionFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    /// Convert into the timeout failure, if this is one
    pub fn into_failure(self) -> Option<AssertionFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Result alias for timeout operations
pub type TimeoutResult<T> = Result<T, TimeoutError>;
