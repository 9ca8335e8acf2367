//! Task execution contexts and listeners.

mod context;
mod listener;

pub use context::{SagaTaskContext, TaskContext, TaskExecutionContext};
pub use listener::TaskListener;
