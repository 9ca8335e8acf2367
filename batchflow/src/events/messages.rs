//! Messages published on the engine's event aggregator.

use serde::{Deserialize, Serialize};

/// A group of processes was removed; their dedup entries are stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessGroupRemoved {
    /// The removed group.
    pub group_id: i64,
    /// Ids of the processes that belonged to the group.
    pub process_ids: Vec<i64>,
}

impl ProcessGroupRemoved {
    /// Creates a new notification.
    #[must_use]
    pub fn new(group_id: i64, process_ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            group_id,
            process_ids: process_ids.into_iter().collect(),
        }
    }
}
