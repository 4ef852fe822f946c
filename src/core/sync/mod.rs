/*!
 * Synchronization Primitives
 *
 * Interruptible blocking primitives for code running under a preemptive
 * timeout:
 * - Interrupt: per-thread cooperative cancellation flag
 * - Latch: count-down barrier whose waits end early on interrupt
 * - sleep: interruptible sleep
 *
 * # Architecture
 *
 * Each thread owns an [`Interrupt`]. A primitive about to block registers a
 * waker on the current thread's interrupt, so raising the flag from another
 * thread wakes the blocked thread, which then returns [`Interrupted`].
 * Blocking primitives also record a diagnostic frame while they wait.
 */

mod interrupt;
mod latch;

pub use interrupt::{check, is_interrupted, Interrupt, Interrupted};
pub use latch::{sleep, Latch};

pub(crate) use interrupt::install as install_interrupt;
