//! Per-task contexts.

use crate::process::{ProcessExecutionContext, TaskStatus};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

/// Read access to the state of a task being executed.
pub trait TaskContext: Send + Sync {
    /// Returns the task id.
    fn task_id(&self) -> i64;

    /// Returns the time of the last change.
    fn updated_on(&self) -> DateTime<Utc>;

    /// Returns the task status.
    fn status(&self) -> TaskStatus;

    /// Returns how many times the task has been retried.
    fn retry_count(&self) -> u32;

    /// Returns the context of the owning process.
    fn process_execution_context(&self) -> &ProcessExecutionContext;
}

/// A task context that walks through named saga states.
pub trait SagaTaskContext<T>: TaskContext {
    /// Returns the task payload.
    fn data(&self) -> &T;

    /// Returns the current state.
    fn state(&self) -> &str;

    /// Returns the state the task came from.
    fn previous_state(&self) -> Option<&str>;

    /// Returns the state explicitly requested by the caller.
    fn next_state(&self) -> Option<&str>;
}

/// Concrete task context carrying a typed payload.
pub struct TaskExecutionContext<T> {
    task_id: i64,
    status: TaskStatus,
    retry_count: u32,
    updated_on: DateTime<Utc>,
    process: Arc<ProcessExecutionContext>,
    data: T,
    state: String,
    previous_state: Option<String>,
    next_state: Option<String>,
}

impl<T> TaskExecutionContext<T> {
    /// Creates a pending task context at `state`.
    pub fn new(
        task_id: i64,
        process: Arc<ProcessExecutionContext>,
        data: T,
        state: impl Into<String>,
    ) -> Self {
        Self {
            task_id,
            status: TaskStatus::Pending,
            retry_count: 0,
            updated_on: Utc::now(),
            process,
            data,
            state: state.into(),
            previous_state: None,
            next_state: None,
        }
    }

    /// Requests an explicit next state.
    #[must_use]
    pub fn with_next_state(mut self, next: impl Into<String>) -> Self {
        self.next_state = Some(next.into());
        self
    }

    /// Sets the explicit next state in place.
    pub fn set_next_state(&mut self, next: Option<String>) {
        self.next_state = next;
    }

    /// Sets the status.
    pub fn set_status(&mut self, status: TaskStatus) {
        self.status = status;
        self.updated_on = Utc::now();
    }

    /// Counts a retry and moves the task to `Retry`.
    pub fn record_retry(&mut self) {
        self.retry_count = self.retry_count.saturating_add(1);
        self.set_status(TaskStatus::Retry);
    }

    /// Moves to `next`, remembering the current state and clearing the override.
    pub fn advance(&mut self, next: impl Into<String>) {
        let previous = std::mem::replace(&mut self.state, next.into());
        self.previous_state = Some(previous);
        self.next_state = None;
        self.updated_on = Utc::now();
    }

    /// Returns the shared process context.
    #[must_use]
    pub const fn process(&self) -> &Arc<ProcessExecutionContext> {
        &self.process
    }
}

impl<T: Send + Sync> TaskContext for TaskExecutionContext<T> {
    fn task_id(&self) -> i64 {
        self.task_id
    }

    fn updated_on(&self) -> DateTime<Utc> {
        self.updated_on
    }

    fn status(&self) -> TaskStatus {
        self.status
    }

    fn retry_count(&self) -> u32 {
        self.retry_count
    }

    fn process_execution_context(&self) -> &ProcessExecutionContext {
        &self.process
    }
}

impl<T: Send + Sync> SagaTaskContext<T> for TaskExecutionContext<T> {
    fn data(&self) -> &T {
        &self.data
    }

    fn state(&self) -> &str {
        &self.state
    }

    fn previous_state(&self) -> Option<&str> {
        self.previous_state.as_deref()
    }

    fn next_state(&self) -> Option<&str> {
        self.next_state.as_deref()
    }
}

impl<T: fmt::Debug> fmt::Debug for TaskExecutionContext<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskExecutionContext")
            .field("task_id", &self.task_id)
            .field("status", &self.status)
            .field("retry_count", &self.retry_count)
            .field("state", &self.state)
            .field("previous_state", &self.previous_state)
            .field("next_state", &self.next_state)
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}
