//! Saga-style task execution over an ordered table of named states.
//!
//! A saga task registers its states in order with
//! [`SagaStateTable::define_state`]. After a state's action runs, the next
//! state is the one the task explicitly requested, or otherwise the state
//! defined right after the current one.

mod table;
mod task;

pub use table::{SagaAction, SagaStateTable};
pub use task::SagaTask;

pub use crate::task::SagaTaskContext;
