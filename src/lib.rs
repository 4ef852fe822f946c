/*!
 * Assert Timeout
 * Deadline-bounded execution of test work, in the calling thread or on an
 * interruptible worker thread
 *
 * ```
 * use assert_timeout::{assert_timeout_preemptively, Latch};
 * use std::panic;
 * use std::time::Duration;
 *
 * let failed = panic::catch_unwind(|| {
 *     assert_timeout_preemptively(Duration::from_millis(10), || {
 *         let _ = Latch::new(1).wait();
 *     })
 * });
 * assert!(failed.is_err());
 * ```
 */

pub mod assertions;
pub mod core;
pub mod diagnostics;
pub mod errors;
pub mod failure;
pub mod monitoring;
pub mod timeout;

// Re-exports
pub use assertions::{
    assert_timeout, assert_timeout_preemptively, assert_timeout_preemptively_with_message,
    assert_timeout_with_message,
};
pub use crate::core::sync::{check, is_interrupted, sleep, Interrupt, Interrupted, Latch};
pub use crate::core::{TimeBudget, TimeUnit, WorkerName, WORKER_NAME_PREFIX};
pub use diagnostics::{enter_frame, Frame, StackSnapshot};
pub use errors::{TimeoutError, TimeoutResult};
pub use failure::{compose, AssertionFailure, ExecutionTimeout, Message};
pub use timeout::{
    CooperativeTimeout, ExecutionOutcome, PreemptiveTimeout, ThreadMode, TimedOut, Timeout,
    TimeoutConfig, TimeoutDeclaration, TimeoutMode, TimeoutStrategy, WorkFailure,
};
