/*!
 * Timeout Benchmarks
 *
 * Measures the overhead each discipline adds to a unit of work that finishes
 * well within its budget, and the cost of the interrupt path.
 */

use assert_timeout::core::sync::{check, Interrupt, Latch};
use assert_timeout::{CooperativeTimeout, Message, PreemptiveTimeout, TimeBudget, Timeout, TimeoutStrategy};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;

fn generous() -> TimeBudget {
    TimeBudget::new(10, assert_timeout::TimeUnit::Seconds).unwrap()
}

/// Benchmark: Cooperative run of trivial work
fn bench_cooperative_overhead(c: &mut Criterion) {
    let budget = generous();

    c.bench_function("timeout/cooperative_immediate", |b| {
        b.iter(|| {
            let result = CooperativeTimeout.run(budget, || black_box(42));
            black_box(result)
        })
    });

    c.bench_function("timeout/cooperative_measure", |b| {
        b.iter(|| black_box(CooperativeTimeout.measure(budget, || Ok::<_, ()>(black_box(42)))))
    });
}

/// Benchmark: Preemptive round-trip (spawn, report, settle)
fn bench_preemptive_round_trip(c: &mut Criterion) {
    let budget = generous();
    let mut group = c.benchmark_group("timeout/preemptive_round_trip");

    for stack_kib in [64_usize, 256, 2048].iter() {
        let strategy = PreemptiveTimeout::new().with_stack_size(stack_kib * 1024);
        group.bench_with_input(BenchmarkId::from_parameter(stack_kib), stack_kib, |b, _| {
            b.iter(|| {
                let outcome = strategy.execute(budget, || Ok::<_, ()>(black_box(42)));
                black_box(outcome)
            })
        });
    }

    group.finish();
}

/// Benchmark: Facade dispatch with a lazy message that is never evaluated
fn bench_facade_with_message(c: &mut Criterion) {
    let cooperative = Timeout::cooperative(generous());

    c.bench_function("timeout/facade_lazy_message", |b| {
        b.iter(|| {
            let result = cooperative.run_with_message(
                || black_box(7),
                Message::supplier(|| "never evaluated".to_string()),
            );
            black_box(result)
        })
    });
}

/// Benchmark: Polling for interrupts from a busy loop
fn bench_interrupt_check(c: &mut Criterion) {
    c.bench_function("timeout/interrupt_check", |b| b.iter(|| black_box(check())));

    c.bench_function("timeout/interrupt_request_and_take", |b| {
        let interrupt = Interrupt::new();
        b.iter(|| {
            interrupt.request();
            black_box(interrupt.take())
        })
    });
}

/// Benchmark: Latch that is already released
fn bench_released_latch(c: &mut Criterion) {
    let latch = Latch::new(0);

    c.bench_function("timeout/latch_released_wait", |b| {
        b.iter(|| black_box(latch.wait_timeout(Duration::from_millis(1))))
    });
}

criterion_group!(
    benches,
    bench_cooperative_overhead,
    bench_preemptive_round_trip,
    bench_facade_with_message,
    bench_interrupt_check,
    bench_released_latch
);
criterion_main!(benches);
