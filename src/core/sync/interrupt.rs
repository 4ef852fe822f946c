/*!
 * Thread Interrupts
 *
 * Cooperative cancellation flag owned by every thread.
 *
 * An interrupt is a request, never a forced stop: the target thread observes
 * it by calling [`check`] or by blocking in an interruptible primitive
 * ([`super::Latch`], [`super::sleep`]), which returns [`Interrupted`] promptly
 * once the flag is raised. Code that never does either runs to completion.
 */

use parking_lot::Mutex;
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// A blocking operation was cut short by an interrupt
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Thread was interrupted")]
pub struct Interrupted;

type Waker = Arc<dyn Fn() + Send + Sync>;

struct InterruptState {
    requested: AtomicBool,
    waker: Mutex<Option<Waker>>,
}

/// Interrupt flag of one thread
///
/// Clones share the same flag; a preemptive worker's flag is cloned into the
/// handle its caller keeps.
#[derive(Clone)]
pub struct Interrupt {
    state: Arc<InterruptState>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self {
            state: Arc::new(InterruptState {
                requested: AtomicBool::new(false),
                waker: Mutex::new(None),
            }),
        }
    }

    /// Interrupt flag of the calling thread
    pub fn current() -> Self {
        CURRENT.with(|slot| slot.borrow_mut().get_or_insert_with(Interrupt::new).clone())
    }

    /// Raise the flag and wake the primitive the thread is blocked in, if any
    pub fn request(&self) {
        self.state.requested.store(true, Ordering::SeqCst);
        // Never call the waker under the slot lock: it takes the primitive's lock
        let waker = self.state.waker.lock().clone();
        if let Some(wake) = waker {
            wake();
        }
    }

    /// Check the flag without clearing it
    #[inline]
    pub fn is_requested(&self) -> bool {
        self.state.requested.load(Ordering::SeqCst)
    }

    /// Clear the flag, returning whether it was raised
    #[inline]
    pub fn take(&self) -> bool {
        self.state.requested.swap(false, Ordering::SeqCst)
    }

    /// Register the wake-up hook of the primitive about to block
    ///
    /// Register before the final flag check: a request racing with the
    /// registration is then either seen by the check or delivered to the hook.
    pub(crate) fn register_waker(&self, waker: Waker) -> WakerRegistration<'_> {
        *self.state.waker.lock() = Some(waker);
        WakerRegistration { interrupt: self }
    }

    /// Check whether two handles refer to the same thread's flag
    pub fn same_as(&self, other: &Interrupt) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interrupt")
            .field("requested", &self.is_requested())
            .finish()
    }
}

/// Clears the waker slot on drop
pub(crate) struct WakerRegistration<'a> {
    interrupt: &'a Interrupt,
}

impl Drop for WakerRegistration<'_> {
    fn drop(&mut self) {
        *self.interrupt.state.waker.lock() = None;
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Interrupt>> = const { RefCell::new(None) };
}

/// Make `interrupt` the calling thread's flag
pub(crate) fn install(interrupt: Interrupt) {
    CURRENT.with(|slot| *slot.borrow_mut() = Some(interrupt));
}

/// Check whether the calling thread has a pending interrupt
pub fn is_interrupted() -> bool {
    Interrupt::current().is_requested()
}

/// Consume a pending interrupt of the calling thread as an error
///
/// Long-running work that never blocks calls this at convenient points to
/// honor preemptive timeouts.
pub fn check() -> Result<(), Interrupted> {
    if Interrupt::current().take() {
        Err(Interrupted)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn test_request_and_take() {
        let interrupt = Interrupt::new();
        assert!(!interrupt.is_requested());

        interrupt.request();
        assert!(interrupt.is_requested());
        assert!(interrupt.take());
        assert!(!interrupt.take());
    }

    #[test]
    fn test_current_is_per_thread() {
        let main = Interrupt::current();
        assert!(main.same_as(&Interrupt::current()));

        let other = thread::spawn(Interrupt::current).join().unwrap();
        assert!(!main.same_as(&other));
    }

    #[test]
    fn test_installed_flag_is_shared_with_the_installer() {
        let interrupt = Interrupt::new();
        let worker = interrupt.clone();

        let observed = thread::spawn(move || {
            install(worker);
            while !is_interrupted() {
                thread::yield_now();
            }
            check()
        });

        interrupt.request();
        assert_eq!(observed.join().unwrap(), Err(Interrupted));
        assert!(!interrupt.is_requested(), "check() consumes the interrupt");
    }

    #[test]
    fn test_request_invokes_registered_waker_once() {
        let interrupt = Interrupt::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        {
            let _registration = interrupt.register_waker(Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
            interrupt.request();
        }
        interrupt.request();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
