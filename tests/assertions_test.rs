/*!
 * Timeout Assertion Integration Tests
 *
 * Panicking assertion surface: values, failure messages, causes and
 * pass-through of failures raised by the work
 */

use assert_timeout::{
    assert_timeout, assert_timeout_preemptively, assert_timeout_preemptively_with_message,
    assert_timeout_with_message, Latch, Message, WORKER_NAME_PREFIX,
};
use pretty_assertions::assert_eq;
use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn payload_text(payload: Box<dyn Any + Send>) -> String {
    if let Some(text) = payload.downcast_ref::<String>() {
        return text.clone();
    }
    payload
        .downcast_ref::<&str>()
        .map(|text| text.to_string())
        .unwrap_or_default()
}

fn panic_text<R>(work: impl FnOnce() -> R) -> String {
    match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(_) => panic!("expected the assertion to fail"),
        Err(payload) => payload_text(payload),
    }
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn nap() {
    thread::sleep(ms(100));
}

fn wait_forever() {
    let _ = Latch::new(1).wait();
}

// -- same thread --------------------------------------------------------------

#[test]
fn test_assert_timeout_with_success() {
    let ran_here = Cell::new(false);
    assert_timeout(ms(500), || ran_here.set(true));
    assert!(ran_here.get());

    let greeting = assert_timeout_with_message(ms(500), || "Tempus Fugit", "message");
    assert_eq!(greeting, "Tempus Fugit");
}

#[test]
fn test_assert_timeout_runs_in_calling_thread() {
    let caller = thread::current().id();
    let worker = assert_timeout(ms(500), || thread::current().id());
    assert_eq!(worker, caller);
}

#[test]
fn test_assert_timeout_with_work_panic() {
    let text = panic_text(|| assert_timeout(ms(500), || -> () { panic!("not this time") }));
    assert_eq!(text, "not this time");
}

#[test]
fn test_assert_timeout_that_completes_after_timeout() {
    let text = panic_text(|| assert_timeout(ms(10), nap));
    assert!(
        text.starts_with("execution exceeded timeout of 10 ms by"),
        "unexpected message: {text}"
    );
}

#[test]
fn test_assert_timeout_that_completes_after_timeout_with_message() {
    let text = panic_text(|| assert_timeout_with_message(ms(10), nap, "Tempus Fugit"));
    assert!(
        text.starts_with("Tempus Fugit ==> execution exceeded timeout of 10 ms by"),
        "unexpected message: {text}"
    );
}

#[test]
fn test_assert_timeout_with_message_supplier() {
    let text = panic_text(|| {
        assert_timeout_with_message(ms(10), nap, Message::supplier(|| "Tempus".to_string() + " Fugit"))
    });
    assert!(text.starts_with("Tempus Fugit ==> execution exceeded timeout of 10 ms by"));
}

#[test]
fn test_assert_timeout_with_blank_message() {
    let text = panic_text(|| assert_timeout_with_message(ms(10), nap, "  "));
    assert!(text.starts_with("execution exceeded timeout of 10 ms by"));
}

#[test]
fn test_assert_timeout_message_supplier_is_lazy() {
    let calls = Cell::new(0);
    assert_timeout_with_message(
        ms(500),
        || (),
        Message::supplier(|| {
            calls.set(calls.get() + 1);
            "never".to_string()
        }),
    );
    assert_eq!(calls.get(), 0);
}

// -- separate thread ----------------------------------------------------------

#[test]
fn test_assert_timeout_preemptively_with_success() {
    let caller = thread::current().id();
    let (worker, name) = assert_timeout_preemptively(ms(500), || {
        let current = thread::current();
        (current.id(), current.name().map(str::to_string))
    });

    assert!(worker != caller, "should have executed in a different thread");
    assert!(name.unwrap().starts_with(WORKER_NAME_PREFIX));
}

#[test]
fn test_assert_timeout_preemptively_with_work_panic() {
    let text = panic_text(|| assert_timeout_preemptively(ms(500), || -> () { panic!("enigma") }));
    assert_eq!(text, "enigma");
}

#[test]
fn test_assert_timeout_preemptively_that_blocks_past_timeout() {
    let start = Instant::now();
    let text = panic_text(|| assert_timeout_preemptively(ms(10), wait_forever));

    assert!(start.elapsed() < Duration::from_secs(5));
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("execution timed out after 10 ms"));
    let cause = lines.next().unwrap_or_default();
    assert!(
        cause.starts_with(&format!("Caused by: Execution timed out in thread {WORKER_NAME_PREFIX}-")),
        "unexpected cause: {cause}"
    );
    assert!(text.contains("at Latch::wait"), "missing frame in: {text}");
}

#[test]
fn test_assert_timeout_preemptively_with_message() {
    let text = panic_text(|| assert_timeout_preemptively_with_message(ms(10), wait_forever, "Tempus Fugit"));
    assert!(text.starts_with("Tempus Fugit ==> execution timed out after 10 ms"));
}

#[test]
fn test_assert_timeout_preemptively_message_supplier_is_lazy() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    assert_timeout_preemptively_with_message(
        ms(500),
        || (),
        Message::supplier(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            "never".to_string()
        }),
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_timeout_looking_panic_is_not_reclassified() {
    let text = panic_text(|| {
        assert_timeout_preemptively(ms(500), || -> () { panic!("execution timed out after 1 ms") })
    });
    assert_eq!(text, "execution timed out after 1 ms");
}

#[test]
fn test_unbounded_timeout_is_accepted_in_both_modes() {
    assert_eq!(assert_timeout(Duration::MAX, || 1), 1);
    assert_eq!(assert_timeout_preemptively(Duration::MAX, || 2), 2);
}
