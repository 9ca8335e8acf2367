//! Observability utilities.

mod tracing;

pub use tracing::{init_tracing, process_span, SpanTimer};
