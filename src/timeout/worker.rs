/*!
 * Timeout Workers
 *
 * Lifecycle of the dedicated thread behind one preemptive invocation:
 * spawn, bounded wait, and either natural completion or abandonment.
 *
 * ## Lifecycle
 *
 * 1. `spawn`: a fresh, uniquely named thread installs its own interrupt flag
 *    and frame recorder (shared with the handle), then runs the work under a
 *    `PreemptiveTimeout::worker` frame.
 * 2. `wait_until`: the caller blocks on a one-slot channel until the result
 *    arrives or the deadline passes, whichever the channel observes first.
 * 3. `abandon`: on expiry the caller snapshots the worker's frames, raises
 *    its interrupt and lets go of the thread without joining it.
 *
 * Workers are never pooled or reused.
 */

use crate::core::sync::{install_interrupt, Interrupt};
use crate::core::WorkerName;
use crate::diagnostics::{self, enter_frame, FrameRecorder, StackSnapshot};
use crate::errors::{TimeoutError, TimeoutResult};
use crate::timeout::WorkerState;
use flume::{Receiver, RecvTimeoutError};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, trace};

/// What a bounded wait on a worker observed
pub enum WorkerReport<R> {
    /// The work returned
    Finished(R),
    /// The work panicked; carries the original payload
    Panicked(Box<dyn Any + Send + 'static>),
    /// The deadline passed first
    Pending,
    /// The worker exited without reporting
    Lost,
}

/// Owns one worker thread for the duration of one invocation
///
/// Dropping a handle whose worker has not reported raises the worker's
/// interrupt, so a worker is never left running uninterrupted.
pub struct WorkerHandle<R> {
    name: WorkerName,
    interrupt: Interrupt,
    recorder: FrameRecorder,
    receiver: Receiver<thread::Result<R>>,
    settled: bool,
    // Dropped without joining; the thread detaches
    _thread: JoinHandle<()>,
}

impl<R: Send + 'static> WorkerHandle<R> {
    /// Start `work` on a new worker thread
    pub fn spawn<F>(work: F, stack_size: Option<usize>) -> TimeoutResult<Self>
    where
        F: FnOnce() -> R + Send + 'static,
    {
        let name = WorkerName::next();
        let interrupt = Interrupt::new();
        let recorder = FrameRecorder::new();
        let (sender, receiver) = flume::bounded(1);

        let mut builder = thread::Builder::new().name(name.to_string());
        if let Some(bytes) = stack_size {
            builder = builder.stack_size(bytes);
        }

        let worker_interrupt = interrupt.clone();
        let worker_recorder = recorder.clone();
        let worker_name = name.clone();
        let thread = builder
            .spawn(move || {
                install_interrupt(worker_interrupt);
                diagnostics::install(worker_recorder);

                let result = {
                    let _frame = enter_frame("PreemptiveTimeout", "worker");
                    // Payloads cross to the caller and are resumed there unchanged
                    panic::catch_unwind(AssertUnwindSafe(work))
                };

                if sender.send(result).is_err() {
                    trace!(worker = %worker_name, "worker finished after its caller stopped waiting");
                }
            })
            .map_err(TimeoutError::Spawn)?;

        debug!(worker = %name, "spawned timeout worker");

        Ok(Self {
            name,
            interrupt,
            recorder,
            receiver,
            settled: false,
            _thread: thread,
        })
    }
}

impl<R> WorkerHandle<R> {
    pub fn name(&self) -> &WorkerName {
        &self.name
    }

    /// Block until the worker reports or `deadline` passes
    ///
    /// Without a deadline, blocks until the worker reports.
    pub fn wait_until(&mut self, deadline: Option<Instant>) -> WorkerReport<R> {
        let received = match deadline {
            Some(deadline) => self.receiver.recv_deadline(deadline),
            None => self
                .receiver
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected),
        };

        let report = match received {
            Ok(Ok(value)) => WorkerReport::Finished(value),
            Ok(Err(payload)) => WorkerReport::Panicked(payload),
            Err(RecvTimeoutError::Timeout) => return WorkerReport::Pending,
            Err(RecvTimeoutError::Disconnected) => WorkerReport::Lost,
        };
        self.settled = true;
        trace!(worker = %self.name, "timeout worker reported");
        report
    }

    /// Current frames of the worker, innermost first
    pub fn snapshot(&self) -> StackSnapshot {
        self.recorder.snapshot()
    }

    /// Give up on a worker that missed its deadline
    ///
    /// Captures the worker's frames, then raises its interrupt. Returns at
    /// once; the worker unwinds (or not) on its own.
    pub fn abandon(mut self) -> WorkerState {
        let snapshot = self.snapshot();
        self.interrupt.request();
        self.settled = true;
        trace!(worker = %self.name, frames = snapshot.len(), "abandoned timeout worker");

        WorkerState {
            name: self.name.to_string(),
            snapshot,
        }
    }
}

impl<R> Drop for WorkerHandle<R> {
    fn drop(&mut self) {
        if !self.settled {
            self.interrupt.request();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sync::{self, Latch};
    use crate::core::WORKER_NAME_PREFIX;
    use std::time::Duration;

    fn deadline_in(millis: u64) -> Option<Instant> {
        Some(Instant::now() + Duration::from_millis(millis))
    }

    #[test]
    fn test_worker_runs_on_named_thread() {
        let mut worker =
            WorkerHandle::spawn(|| thread::current().name().map(str::to_string), None).unwrap();
        let expected = worker.name().to_string();

        match worker.wait_until(deadline_in(1_000)) {
            WorkerReport::Finished(name) => {
                assert_eq!(name.as_deref(), Some(expected.as_str()));
                assert!(expected.starts_with(WORKER_NAME_PREFIX));
            }
            _ => panic!("worker should have finished"),
        }
    }

    #[test]
    fn test_worker_panic_payload_is_reported() {
        let mut worker = WorkerHandle::spawn(|| -> () { panic!("enigma") }, None).unwrap();
        match worker.wait_until(None) {
            WorkerReport::Panicked(payload) => {
                assert_eq!(payload.downcast_ref::<&str>(), Some(&"enigma"));
            }
            _ => panic!("worker should have panicked"),
        }
    }

    #[test]
    fn test_abandon_captures_frames_then_interrupts() {
        let (done_tx, done_rx) = flume::bounded(1);
        let mut worker = WorkerHandle::spawn(
            move || {
                let result = Latch::new(1).wait();
                let _ = done_tx.send(result);
            },
            None,
        )
        .unwrap();

        assert!(matches!(worker.wait_until(deadline_in(50)), WorkerReport::Pending));
        let state = worker.abandon();

        assert_eq!(state.snapshot.innermost().map(ToString::to_string).as_deref(), Some("Latch::wait"));
        assert!(state.snapshot.contains("PreemptiveTimeout", "worker"));
        assert_eq!(
            done_rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            Err(sync::Interrupted)
        );
    }

    #[test]
    fn test_dropping_unsettled_handle_interrupts_worker() {
        let (done_tx, done_rx) = flume::bounded(1);
        let worker = WorkerHandle::spawn(
            move || {
                let _ = done_tx.send(sync::sleep(Duration::from_secs(30)));
            },
            None,
        )
        .unwrap();

        drop(worker);
        assert_eq!(
            done_rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            Err(sync::Interrupted)
        );
    }

    #[test]
    fn test_each_worker_gets_a_fresh_sequence_number() {
        let first = WorkerHandle::spawn(|| (), None).unwrap();
        let second = WorkerHandle::spawn(|| (), None).unwrap();
        assert!(second.name().sequence() > first.name().sequence());
    }
}
