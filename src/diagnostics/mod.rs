/*!
 * Execution Diagnostics
 *
 * Per-thread frame recording used to describe where a worker was when its
 * deadline passed.
 *
 * Rust cannot walk another thread's stack, so threads describe themselves:
 * blocking primitives and instrumented code push a [`Frame`] while they run
 * and pop it on exit. A preemptive worker's [`FrameRecorder`] is shared with
 * the thread waiting on it, which captures a [`StackSnapshot`] when the
 * deadline is missed.
 *
 * ## Example
 *
 * ```
 * use assert_timeout::diagnostics::{current_snapshot, enter_frame};
 *
 * let _frame = enter_frame("fixtures", "load");
 * assert_eq!(current_snapshot().innermost().unwrap().to_string(), "fixtures::load");
 * ```
 *
 * Snapshots are for failure reporting only; nothing branches on them.
 */

use parking_lot::Mutex;
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// One described execution location
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frame {
    pub component: &'static str,
    pub operation: &'static str,
}

impl Frame {
    pub const fn new(component: &'static str, operation: &'static str) -> Self {
        Self {
            component,
            operation,
        }
    }

    /// Check whether this frame was recorded by `component::operation`
    pub fn is(&self, component: &str, operation: &str) -> bool {
        self.component == component && self.operation == operation
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.component, self.operation)
    }
}

/// Frames captured from a thread, innermost first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackSnapshot {
    frames: Vec<Frame>,
}

impl StackSnapshot {
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn innermost(&self) -> Option<&Frame> {
        self.frames.first()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check whether any frame was recorded by `component::operation`
    pub fn contains(&self, component: &str, operation: &str) -> bool {
        self.frames.iter().any(|frame| frame.is(component, operation))
    }
}

impl fmt::Display for StackSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, frame) in self.frames.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "    at {frame}")?;
        }
        Ok(())
    }
}

/// Shared, ordered record of a thread's active frames (outermost first)
#[derive(Debug, Clone, Default)]
pub struct FrameRecorder {
    frames: Arc<Mutex<Vec<Frame>>>,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, frame: Frame) {
        self.frames.lock().push(frame);
    }

    fn pop(&self, frame: Frame) {
        let mut frames = self.frames.lock();
        // Guards drop in reverse order, so the frame is normally on top
        if let Some(index) = frames.iter().rposition(|f| *f == frame) {
            frames.remove(index);
        }
    }

    /// Capture the currently active frames, innermost first
    pub fn snapshot(&self) -> StackSnapshot {
        let frames = self.frames.lock();
        StackSnapshot {
            frames: frames.iter().rev().copied().collect(),
        }
    }

    /// Number of active frames
    pub fn depth(&self) -> usize {
        self.frames.lock().len()
    }
}

thread_local! {
    static RECORDER: RefCell<Option<FrameRecorder>> = const { RefCell::new(None) };
}

/// Recorder of the current thread, created on first use
pub fn current_recorder() -> FrameRecorder {
    RECORDER.with(|slot| slot.borrow_mut().get_or_insert_with(FrameRecorder::new).clone())
}

/// Make `recorder` the current thread's recorder
///
/// Called by a preemptive worker before it runs any work, so that its
/// caller observes the frames it records.
pub(crate) fn install(recorder: FrameRecorder) {
    RECORDER.with(|slot| *slot.borrow_mut() = Some(recorder));
}

/// Snapshot of the current thread's active frames
pub fn current_snapshot() -> StackSnapshot {
    current_recorder().snapshot()
}

/// Record `component::operation` on the current thread until the guard drops
#[must_use = "the frame is popped as soon as the guard is dropped"]
pub fn enter_frame(component: &'static str, operation: &'static str) -> FrameGuard {
    let frame = Frame::new(component, operation);
    let recorder = current_recorder();
    recorder.push(frame);
    FrameGuard {
        recorder,
        frame,
        _not_send: PhantomData,
    }
}

/// Active frame; pops itself on drop
pub struct FrameGuard {
    recorder: FrameRecorder,
    frame: Frame,
    // Frames describe the thread that entered them
    _not_send: PhantomData<*const ()>,
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        self.recorder.pop(self.frame);
    }
}
