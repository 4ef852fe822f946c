/*!
 * Count-Down Latch
 *
 * Interruptible one-shot barrier built on parking_lot::Condvar.
 */

use super::interrupt::{Interrupt, Interrupted};
use crate::diagnostics::enter_frame;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct LatchState {
    count: Mutex<usize>,
    condvar: Condvar,
}

impl LatchState {
    fn wake_all(&self) {
        // Taking the lock orders the wake-up after a waiter's last check
        let _count = self.count.lock();
        self.condvar.notify_all();
    }
}

/// Releases waiters once counted down to zero
///
/// Waiting is interruptible: if the waiting thread's [`Interrupt`] is raised,
/// [`Latch::wait`] returns [`Interrupted`] and consumes the interrupt.
/// Waiting records a `Latch::wait` diagnostic frame on the current thread.
#[derive(Clone)]
pub struct Latch {
    state: Arc<LatchState>,
}

impl Latch {
    pub fn new(count: usize) -> Self {
        Self {
            state: Arc::new(LatchState {
                count: Mutex::new(count),
                condvar: Condvar::new(),
            }),
        }
    }

    /// Decrement the count, releasing all waiters when it reaches zero
    pub fn count_down(&self) {
        let mut count = self.state.count.lock();
        if *count == 0 {
            return;
        }
        *count -= 1;
        if *count == 0 {
            self.state.condvar.notify_all();
        }
    }

    /// Current count
    pub fn count(&self) -> usize {
        *self.state.count.lock()
    }

    /// Block until the count reaches zero
    pub fn wait(&self) -> Result<(), Interrupted> {
        self.wait_until(None).map(|_| ())
    }

    /// Block until the count reaches zero or `timeout` passes
    ///
    /// Returns `Ok(true)` if released, `Ok(false)` on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<bool, Interrupted> {
        self.wait_until(Instant::now().checked_add(timeout))
    }

    fn wait_until(&self, deadline: Option<Instant>) -> Result<bool, Interrupted> {
        let _frame = enter_frame("Latch", "wait");
        let interrupt = Interrupt::current();

        let state = Arc::clone(&self.state);
        let _registration = interrupt.register_waker(Arc::new(move || state.wake_all()));

        let mut count = self.state.count.lock();
        loop {
            if *count == 0 {
                return Ok(true);
            }
            if interrupt.take() {
                return Err(Interrupted);
            }
            match deadline {
                Some(deadline) => {
                    if self.state.condvar.wait_until(&mut count, deadline).timed_out() {
                        return Ok(*count == 0);
                    }
                }
                None => self.state.condvar.wait(&mut count),
            }
        }
    }
}

impl std::fmt::Debug for Latch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Latch").field("count", &self.count()).finish()
    }
}

/// Sleep for `duration` unless the calling thread is interrupted first
///
/// Records a `sync::sleep` diagnostic frame while sleeping.
pub fn sleep(duration: Duration) -> Result<(), Interrupted> {
    let _frame = enter_frame("sync", "sleep");
    // Nobody counts this latch down; only the deadline or an interrupt ends the wait
    Latch::new(1).wait_timeout(duration).map(|_| ())
}
