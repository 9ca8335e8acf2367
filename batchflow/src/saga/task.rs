//! Saga task contract.

use super::SagaStateTable;
use crate::errors::EngineResult;
use crate::task::SagaTaskContext;

/// A task executed as a sequence of saga states.
pub trait SagaTask<T>: Send + Sync {
    /// Returns the state table of this task.
    fn states(&self) -> &SagaStateTable<T>;

    /// Resolves the state following the current one.
    fn next_state(&self, ctx: &dyn SagaTaskContext<T>) -> Option<String> {
        self.states().next_state(ctx)
    }

    /// Runs the action of the current state.
    fn execute_state(&self, ctx: &dyn SagaTaskContext<T>) -> EngineResult<()> {
        self.states().execute(ctx)
    }

    /// Called before the first state runs.
    fn started(&self, _ctx: &dyn SagaTaskContext<T>) {}

    /// Called after the last state completed.
    fn completed(&self, _ctx: &dyn SagaTaskContext<T>) {}
}
