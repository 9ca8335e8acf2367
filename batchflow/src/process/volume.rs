//! Persistence of generated volume.

use super::ProcessExecutionContext;
use crate::errors::EngineResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// A unit of work produced during volume generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeItem {
    /// Task id assigned on persistence.
    pub task_id: i64,
    /// Owning process.
    pub process_id: i64,
    /// Serialized payload.
    pub payload: String,
}

/// Stores volume items and per-task state.
#[async_trait]
pub trait VolumeHandler: Send + Sync {
    /// Persists serialized volume items for a process. Returns the count stored.
    async fn persist(&self, ctx: &ProcessExecutionContext, items: Vec<String>) -> EngineResult<usize>;

    /// Takes the next pending item, if any.
    async fn next_task(&self) -> EngineResult<Option<VolumeItem>>;

    /// Records a key/value state entry for a task.
    async fn add_task_state(&self, task_id: i64, process_id: i64, key: &str, value: &str) -> EngineResult<()>;

    /// Returns all state entries recorded for a task.
    async fn task_states(&self, task_id: i64, process_id: i64) -> EngineResult<Vec<(String, String)>>;
}

#[derive(Debug, Default)]
struct VolumeStore {
    next_task_id: i64,
    pending: VecDeque<VolumeItem>,
    states: HashMap<(i64, i64), Vec<(String, String)>>,
}

/// Volume handler keeping everything in memory.
#[derive(Debug, Default)]
pub struct InMemoryVolumeHandler {
    store: Mutex<VolumeStore>,
}

impl InMemoryVolumeHandler {
    /// Creates an empty handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of pending items.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.store.lock().pending.len()
    }
}

#[async_trait]
impl VolumeHandler for InMemoryVolumeHandler {
    async fn persist(&self, ctx: &ProcessExecutionContext, items: Vec<String>) -> EngineResult<usize> {
        let process_id = ctx.process_id();
        let mut store = self.store.lock();
        let count = items.len();

        for payload in items {
            store.next_task_id += 1;
            let task_id = store.next_task_id;
            store.pending.push_back(VolumeItem {
                task_id,
                process_id,
                payload,
            });
        }

        Ok(count)
    }

    async fn next_task(&self) -> EngineResult<Option<VolumeItem>> {
        Ok(self.store.lock().pending.pop_front())
    }

    async fn add_task_state(&self, task_id: i64, process_id: i64, key: &str, value: &str) -> EngineResult<()> {
        self.store
            .lock()
            .states
            .entry((task_id, process_id))
            .or_default()
            .push((key.to_string(), value.to_string()));
        Ok(())
    }

    async fn task_states(&self, task_id: i64, process_id: i64) -> EngineResult<Vec<(String, String)>> {
        Ok(self
            .store
            .lock()
            .states
            .get(&(task_id, process_id))
            .cloned()
            .unwrap_or_default())
    }
}
