//! Mutable execution context for a volume request.

use super::{ProcessState, ProcessStatus};
use crate::observability::process_span;
use parking_lot::RwLock;
use std::fmt;
use tracing::Span;
use uuid::Uuid;

/// The context carried through a process pipeline.
///
/// Stages receive `&ProcessExecutionContext` and mutate the process state
/// in place; the caller inspects the same instance once dispatch returns.
pub struct ProcessExecutionContext {
    correlation_id: Uuid,
    state: RwLock<ProcessState>,
    error: RwLock<Option<String>>,
    span: Span,
}

impl ProcessExecutionContext {
    /// Creates a context for a process.
    #[must_use]
    pub fn new(state: ProcessState) -> Self {
        let correlation_id = Uuid::now_v7();
        let span = process_span(state.id, state.process_key, correlation_id);
        Self {
            correlation_id,
            state: RwLock::new(state),
            error: RwLock::new(None),
            span,
        }
    }

    /// Returns the correlation id of this request.
    #[must_use]
    pub const fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Returns the process id.
    #[must_use]
    pub fn process_id(&self) -> i64 {
        self.state.read().id
    }

    /// Returns the process key.
    #[must_use]
    pub fn process_key(&self) -> i32 {
        self.state.read().process_key
    }

    /// Returns the current process status.
    #[must_use]
    pub fn status(&self) -> ProcessStatus {
        self.state.read().status
    }

    /// Returns a copy of the process state.
    #[must_use]
    pub fn process_state(&self) -> ProcessState {
        self.state.read().clone()
    }

    /// Applies a change to the process state.
    pub fn update_state<F>(&self, change: F)
    where
        F: FnOnce(&mut ProcessState),
    {
        change(&mut *self.state.write());
    }

    /// Marks the process as volume-generated.
    pub fn mark_as_volume_generated(&self) {
        self.state.write().mark_as_volume_generated();
    }

    /// Records a terminal failure and moves the process to `Error`.
    pub fn mark_as_error(&self, message: impl Into<String>) {
        self.state.write().mark_as_error();
        *self.error.write() = Some(message.into());
    }

    /// Returns the recorded failure, if any.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        self.error.read().clone()
    }

    /// Returns true if a failure was recorded.
    #[must_use]
    pub fn is_errored(&self) -> bool {
        self.error.read().is_some()
    }

    /// Returns the span that scopes logging for this request.
    #[must_use]
    pub const fn span(&self) -> &Span {
        &self.span
    }

    /// Prefixes a message with the process identity.
    #[must_use]
    pub fn formatted_message(&self, message: &str) -> String {
        let state = self.state.read();
        format!(
            "{message} (process {} key {} correlation {})",
            state.id, state.process_key, self.correlation_id
        )
    }

    /// Like [`Self::formatted_message`], with the error appended.
    #[must_use]
    pub fn formatted_error(&self, message: &str, error: &dyn fmt::Display) -> String {
        format!("{}: {error}", self.formatted_message(message))
    }
}

impl fmt::Debug for ProcessExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessExecutionContext")
            .field("correlation_id", &self.correlation_id)
            .field("state", &*self.state.read())
            .field("error", &*self.error.read())
            .finish_non_exhaustive()
    }
}
