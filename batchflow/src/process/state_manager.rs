//! Access to authoritative process state.

use super::ProcessState;
use crate::errors::{EngineError, EngineResult};
use async_trait::async_trait;
use dashmap::DashMap;

/// Reads and records process state owned by the persistence layer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StateManager: Send + Sync {
    /// Returns the current state of a process.
    async fn process_by_id(&self, process_id: i64) -> EngineResult<ProcessState>;

    /// Records a changed process state.
    async fn update_process(&self, state: &ProcessState) -> EngineResult<()>;
}

/// State manager backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryStateManager {
    processes: DashMap<i64, ProcessState>,
}

impl InMemoryStateManager {
    /// Creates an empty state manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a process.
    pub fn insert(&self, state: ProcessState) {
        self.processes.insert(state.id, state);
    }

    /// Returns a copy of a stored process.
    #[must_use]
    pub fn get(&self, process_id: i64) -> Option<ProcessState> {
        self.processes.get(&process_id).map(|entry| entry.clone())
    }

    /// Returns the number of stored processes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    /// Returns true if no process is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

#[async_trait]
impl StateManager for InMemoryStateManager {
    async fn process_by_id(&self, process_id: i64) -> EngineResult<ProcessState> {
        self.get(process_id)
            .ok_or(EngineError::ProcessNotFound { process_id })
    }

    async fn update_process(&self, state: &ProcessState) -> EngineResult<()> {
        self.insert(state.clone());
        Ok(())
    }
}
