/*!
 * Monitoring
 * Tracing setup and spans for dispatched operations
 */

mod tracer;

pub use tracer::{
    generate_trace_id, init_tracing, span_dispatch, span_operation, DispatchSpan, OperationSpan,
    ENV_TRACE_JSON,
};
