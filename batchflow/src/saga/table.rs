//! Ordered state table.

use crate::errors::{EngineError, EngineResult};
use crate::task::SagaTaskContext;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Action bound to a saga state.
pub type SagaAction<T> = Arc<dyn Fn(&dyn SagaTaskContext<T>) -> anyhow::Result<()> + Send + Sync>;

/// Named saga states in definition order.
pub struct SagaStateTable<T> {
    states: Vec<(String, SagaAction<T>)>,
}

impl<T> Default for SagaStateTable<T> {
    fn default() -> Self {
        Self { states: Vec::new() }
    }
}

impl<T> SagaStateTable<T> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines a state.
    ///
    /// Redefining a state replaces its action and keeps its position.
    pub fn define_state<F>(&mut self, name: impl Into<String>, action: F) -> &mut Self
    where
        F: Fn(&dyn SagaTaskContext<T>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let name = name.into();
        let action: SagaAction<T> = Arc::new(action);
        match self.states.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = action,
            None => self.states.push((name, action)),
        }
        self
    }

    /// Resolves the state following the task's current one.
    ///
    /// A non-blank explicit next state wins. Otherwise the state defined
    /// after the current one is returned; `None` if the current state is the
    /// last one or is not defined.
    #[must_use]
    pub fn next_state(&self, ctx: &dyn SagaTaskContext<T>) -> Option<String> {
        if let Some(next) = ctx.next_state().filter(|next| !next.trim().is_empty()) {
            return Some(next.to_string());
        }

        let current = ctx.state();
        let position = self.states.iter().position(|(name, _)| name == current)?;
        self.states
            .get(position + 1)
            .map(|(name, _)| name.clone())
    }

    /// Runs the action bound to the task's current state.
    pub fn execute(&self, ctx: &dyn SagaTaskContext<T>) -> EngineResult<()> {
        let state = ctx.state();
        let (_, action) = self
            .states
            .iter()
            .find(|(name, _)| name == state)
            .ok_or_else(|| EngineError::UnknownSagaState(state.to_string()))?;

        trace!(task_id = ctx.task_id(), state, "Executing saga state");
        action(ctx).map_err(EngineError::from)
    }

    /// Returns the state names in definition order.
    #[must_use]
    pub fn state_names(&self) -> Vec<&str> {
        self.states.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Returns true if the state is defined.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.states.iter().any(|(existing, _)| existing == name)
    }

    /// Returns the number of states.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns true if no state is defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl<T> fmt::Debug for SagaStateTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SagaStateTable")
            .field("states", &self.state_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ProcessExecutionContext, ProcessState};
    use crate::task::TaskExecutionContext;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn table() -> SagaStateTable<u32> {
        let mut table = SagaStateTable::new();
        table
            .define_state("A", |_| Ok(()))
            .define_state("B", |_| Ok(()))
            .define_state("C", |_| Ok(()));
        table
    }

    fn task(state: &str) -> TaskExecutionContext<u32> {
        let process = Arc::new(ProcessExecutionContext::new(ProcessState::new(1, 1)));
        TaskExecutionContext::new(1, process, 0, state)
    }

    #[test]
    fn test_default_order() {
        let table = table();
        assert_eq!(table.next_state(&task("A")).as_deref(), Some("B"));
        assert_eq!(table.next_state(&task("B")).as_deref(), Some("C"));
        assert_eq!(table.next_state(&task("C")), None);
    }

    #[test]
    fn test_explicit_next_state_wins() {
        let table = table();
        let ctx = task("B").with_next_state("A");
        assert_eq!(table.next_state(&ctx).as_deref(), Some("A"));
    }

    #[test]
    fn test_blank_next_state_is_ignored() {
        let table = table();
        let ctx = task("A").with_next_state("  ");
        assert_eq!(table.next_state(&ctx).as_deref(), Some("B"));
    }

    #[test]
    fn test_unknown_state_has_no_successor() {
        let table = table();
        assert_eq!(table.next_state(&task("Z")), None);
    }

    #[test]
    fn test_redefinition_keeps_position() {
        let mut table = table();
        table.define_state("A", |_| anyhow::bail!("replaced"));

        assert_eq!(table.state_names(), vec!["A", "B", "C"]);
        assert_eq!(table.len(), 3);
        assert!(table.execute(&task("A")).is_err());
    }

    #[test]
    fn test_execute_runs_bound_action() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut table = SagaStateTable::<u32>::new();
        let h = hits.clone();
        table.define_state("Debit", move |ctx| {
            h.fetch_add(*ctx.data() as usize, Ordering::SeqCst);
            Ok(())
        });

        let process = Arc::new(ProcessExecutionContext::new(ProcessState::new(1, 1)));
        let ctx = TaskExecutionContext::new(1, process, 5, "Debit");
        table.execute(&ctx).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_execute_unknown_state() {
        let table = table();
        let result = table.execute(&task("Missing"));
        assert!(matches!(result, Err(EngineError::UnknownSagaState(state)) if state == "Missing"));
    }
}
