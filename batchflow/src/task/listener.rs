//! Hooks around task execution.

use super::TaskContext;

/// Observes every task before and after it executes.
///
/// Listener failures are logged by the caller and never abort the task.
pub trait TaskListener: Send + Sync {
    /// Returns the listener name used in logs.
    fn name(&self) -> &str;

    /// Called before the task runs.
    fn before_execute(&self, _ctx: &dyn TaskContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called after the task ran.
    fn after_execute(&self, _ctx: &dyn TaskContext) -> anyhow::Result<()> {
        Ok(())
    }
}
