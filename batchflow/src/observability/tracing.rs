//! Tracing subscriber setup and span helpers for the volume engine.

use crate::config::TracingConfig;
use std::time::Instant;
use tracing::Span;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

/// Installs a global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over [`TracingConfig::log_level`]. Returns
/// `false` when a global subscriber was already installed.
pub fn init_tracing(config: &TracingConfig) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if config.json_format {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    installed.is_ok()
}

/// Creates the span attached to a process execution.
#[must_use]
pub fn process_span(process_id: i64, process_key: i32, correlation_id: Uuid) -> Span {
    tracing::info_span!(
        "process_execution",
        process_id,
        process_key,
        correlation_id = %correlation_id,
    )
}

/// Simple span timing helper.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts a new span timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finishes the span and returns the duration.
    #[must_use]
    pub fn finish(self) -> f64 {
        self.elapsed_ms()
    }
}
