/*!
 * Tracing
 * Structured tracing for dispatched operations and scenario runs
 *
 * Features:
 * - Trace ID per span for correlating submission and completion logs
 * - JSON-formatted logs for structured parsing
 * - Latency recorded on span close, with slow-path warnings
 */

use crate::core::limits::{SLOW_DISPATCH_THRESHOLD, SLOW_SCENARIO_THRESHOLD};
use std::time::Instant;
use tracing::{debug, span, warn, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use uuid::Uuid;

/// Set to `1` or `true` for JSON log lines
pub const ENV_TRACE_JSON: &str = "IO_DISPATCH_TRACE_JSON";

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - IO_DISPATCH_TRACE_JSON: Enable JSON output (default: false)
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing() -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var(ENV_TRACE_JSON)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_line_number(true)
                    .with_file(true)
                    .compact(),
            )
            .try_init()
    }
}

/// Generate a unique trace ID for request correlation
pub fn generate_trace_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span around one dispatched operation
pub struct DispatchSpan {
    span: tracing::Span,
    start: Instant,
    op: &'static str,
    trace_id: String,
}

impl DispatchSpan {
    pub fn new(op: &'static str, backend: &str, addressing: &str) -> Self {
        let trace_id = generate_trace_id();

        let span = span!(
            Level::DEBUG,
            "dispatch",
            trace_id = %trace_id,
            op = op,
            backend = backend,
            addressing = addressing,
            duration_us = tracing::field::Empty,
            result = tracing::field::Empty,
            status = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            op,
            trace_id,
        }
    }

    /// Get the trace ID for this operation
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Record the kernel status the operation finished with
    pub fn record_status(&self, status: i32) {
        self.span.record("status", status);
        self.span
            .record("result", if status >= 0 { "success" } else { "error" });
    }

    /// Record a dispatch fault
    pub fn record_fault(&self) {
        self.span.record("result", "fault");
    }

    /// Enter the span context
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for DispatchSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_us", duration.as_micros() as u64);

        if duration > SLOW_DISPATCH_THRESHOLD {
            warn!(
                trace_id = %self.trace_id,
                op = self.op,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow operation detected"
            );
        } else {
            debug!(
                trace_id = %self.trace_id,
                op = self.op,
                duration_us = duration.as_micros() as u64,
                "operation completed"
            );
        }
    }
}

/// Span around a multi-step operation such as a scenario
pub struct OperationSpan {
    span: tracing::Span,
    start: Instant,
    trace_id: String,
}

impl OperationSpan {
    pub fn new(operation: &str) -> Self {
        let trace_id = generate_trace_id();

        let span = span!(
            Level::INFO,
            "operation",
            trace_id = %trace_id,
            operation = operation,
            duration_us = tracing::field::Empty,
            result = tracing::field::Empty,
            error = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            trace_id,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    /// Record the operation result
    pub fn record_result(&self, success: bool) {
        self.span
            .record("result", if success { "success" } else { "error" });
    }

    /// Record an error
    pub fn record_error(&self, error: &str) {
        self.span.record("error", error);
        self.span.record("result", "error");
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for OperationSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_us", duration.as_micros() as u64);

        if duration > SLOW_SCENARIO_THRESHOLD {
            warn!(
                trace_id = %self.trace_id,
                duration_ms = duration.as_millis() as u64,
                slow = true,
                "slow operation detected"
            );
        }
    }
}

/// Helper to create a dispatch span
#[inline]
pub fn span_dispatch(op: &'static str, backend: &str, addressing: &str) -> DispatchSpan {
    DispatchSpan::new(op, backend, addressing)
}

/// Helper to create an operation span
#[inline]
pub fn span_operation(name: &str) -> OperationSpan {
    OperationSpan::new(name)
}
