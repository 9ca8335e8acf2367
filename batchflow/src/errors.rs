//! Error types for the batchflow engine.
//!
//! Business code returns [`anyhow::Result`]; the engine wraps those failures
//! in [`EngineError::Process`] so decorators and the dispatch boundary can
//! treat every stage failure uniformly.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type EngineResult<T> = Result<T, EngineError>;

/// The main error type for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No business process or task handler is registered for a process key.
    #[error("Volume handler not found for process key {process_key}")]
    HandlerNotFound {
        /// The process key that was looked up.
        process_key: i32,
    },

    /// The state manager has no record of a process.
    #[error("Process {process_id} not found")]
    ProcessNotFound {
        /// The process id that was looked up.
        process_id: i64,
    },

    /// A decorator was registered after the pipeline started serving calls.
    #[error("Pipeline '{pipeline}' is sealed; decorators must be registered before the first invoke")]
    PipelineSealed {
        /// The pipeline name.
        pipeline: String,
    },

    /// The throttling decorator rejected a call because no permit was free.
    #[error("Throttled: all {permits} permit(s) of '{scope}' are in use")]
    Throttled {
        /// The throttle scope.
        scope: String,
        /// The configured permit count.
        permits: usize,
    },

    /// A saga context referenced a state that is not in the table.
    #[error("Unknown saga state '{0}'")]
    UnknownSagaState(String),

    /// A failure raised by business code.
    #[error(transparent)]
    Process(#[from] anyhow::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Returns true if retrying the failed call could succeed.
    ///
    /// Lookup and wiring failures are permanent; everything raised while a
    /// stage runs is considered transient.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        !matches!(
            self,
            Self::HandlerNotFound { .. } | Self::PipelineSealed { .. } | Self::Configuration(_)
        )
    }
}
