//! # Batchflow
//!
//! A resilient execution engine for batch business processes.
//!
//! Batchflow turns volume requests into units of work through composable
//! per-process pipelines, with support for:
//!
//! - **Decorated pipelines**: duplicate suppression, bounded retry and
//!   concurrency throttling around a terminal stage
//! - **Pipeline caching**: one pipeline per process key, built on first use
//! - **Pause control**: hold and release incoming requests
//! - **Saga tasks**: ordered state tables with explicit transitions
//! - **Best-effort side work**: retrying safe calls that log and drop failures
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use batchflow::prelude::*;
//!
//! let repository = Arc::new(ProcessRepository::new());
//! repository.register_process(Arc::new(MyProcess));
//!
//! let handler = ProcessVolumeRequestHandler::new(EngineServices {
//!     registry: repository,
//!     state_manager,
//!     configuration,
//!     events,
//!     volume_handler,
//! });
//!
//! let ctx = ProcessExecutionContext::new(ProcessState::new(100, MY_PROCESS_KEY));
//! handler.handle(&ctx).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod filters;
pub mod observability;
pub mod pipeline;
pub mod process;
pub mod saga;
pub mod task;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        ConfigurationCache, EngineConfig, InMemoryConfigurationCache, ProcessConfiguration,
        TracingConfig,
    };
    pub use crate::engine::{EngineServices, PauseGate, ProcessVolumeRequestHandler};
    pub use crate::errors::{EngineError, EngineResult};
    pub use crate::events::{EventAggregator, ProcessGroupRemoved, SubscriptionId};
    pub use crate::filters::{
        DuplicateCheckFilter, OverflowPolicy, RetryFeatureHandler, ThrottlingFilter,
    };
    pub use crate::observability::init_tracing;
    pub use crate::pipeline::{
        safe_call, safe_call_with_retry, safe_invoke, FnHandler, Handler, MaxRetries, Pipeline,
        SafeCallOptions,
    };
    pub use crate::process::{
        BaseProcess, InMemoryStateManager, InMemoryVolumeHandler, MasterSlaveObserver,
        ProcessExecutionContext, ProcessRegistry, ProcessRepository, ProcessState,
        ProcessStatus, ProcessTask, StateManager, SupportingData, TaskStatus, VolumeHandler,
    };
    pub use crate::saga::{SagaStateTable, SagaTask};
    pub use crate::task::{SagaTaskContext, TaskContext, TaskExecutionContext, TaskListener};
}
