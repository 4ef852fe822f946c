/*!
 * Monitoring
 * Structured tracing for timeout invocations and worker lifecycles
 */

mod tracer;

pub use tracer::{init_tracing, span_invocation, InvocationSpan, ENV_TRACE_JSON};
