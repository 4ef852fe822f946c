/*!
 * Invocation Tracing
 * Structured tracing for timeout-bounded invocations using the tracing crate
 *
 * Events are emitted at `debug` and `trace` level only, and are silent unless
 * the host installs a subscriber.
 */

use crate::core::id::SequenceGenerator;
use crate::core::TimeBudget;
use crate::timeout::ThreadMode;
use std::time::Instant;
use tracing::{debug, info, span, trace, Level, Span};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Enables JSON output in [`init_tracing`] when set to `1` or `true`
pub const ENV_TRACE_JSON: &str = "ASSERT_TIMEOUT_TRACE_JSON";

static INVOCATION_SEQUENCE: SequenceGenerator = SequenceGenerator::new(1);

/// Install a global subscriber for this crate's events
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - ASSERT_TIMEOUT_TRACE_JSON: Enable JSON output (default: false)
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing() -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var(ENV_TRACE_JSON)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "timeout tracing initialized");
    }
    installed
}

/// Span covering one timeout-bounded invocation
pub struct InvocationSpan {
    span: Span,
    start: Instant,
    invocation: u64,
}

impl InvocationSpan {
    pub fn new(thread_mode: ThreadMode, budget: TimeBudget) -> Self {
        let invocation = INVOCATION_SEQUENCE.next();

        let span = span!(
            Level::DEBUG,
            "timeout",
            invocation = invocation,
            thread_mode = %thread_mode,
            budget = %budget,
            outcome = tracing::field::Empty,
            duration_us = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            invocation,
        }
    }

    /// Sequence number of this invocation within the process
    pub fn invocation(&self) -> u64 {
        self.invocation
    }

    /// Record how the invocation ended: `completed`, `failed` or `timed_out`
    pub fn record_outcome(&self, outcome: &'static str) {
        self.span.record("outcome", outcome);
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for InvocationSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_us", duration.as_micros());
        trace!(invocation = self.invocation, duration_us = duration.as_micros(), "invocation finished");
    }
}

/// Open a span for one invocation
pub fn span_invocation(thread_mode: ThreadMode, budget: TimeBudget) -> InvocationSpan {
    let span = InvocationSpan::new(thread_mode, budget);
    let _entered = span.enter();
    debug!(invocation = span.invocation(), "invocation started");
    drop(_entered);
    span
}
