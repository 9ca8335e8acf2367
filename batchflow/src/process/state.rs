//! Process state records.

use super::ProcessStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The state of one business process instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessState {
    /// Process instance id.
    pub id: i64,
    /// Key selecting the business process implementation.
    pub process_key: i32,
    /// Owning group, if any.
    pub group_id: Option<i64>,
    /// Lifecycle status.
    pub status: ProcessStatus,
    /// Set when an operator stopped the process.
    pub is_stopped: bool,
    /// Last status change.
    pub updated_on: DateTime<Utc>,
}

impl ProcessState {
    /// Creates a process in the `New` status.
    #[must_use]
    pub fn new(id: i64, process_key: i32) -> Self {
        Self {
            id,
            process_key,
            group_id: None,
            status: ProcessStatus::New,
            is_stopped: false,
            updated_on: Utc::now(),
        }
    }

    /// Sets the owning group.
    #[must_use]
    pub fn with_group(mut self, group_id: i64) -> Self {
        self.group_id = Some(group_id);
        self
    }

    /// Sets the status.
    #[must_use]
    pub fn with_status(mut self, status: ProcessStatus) -> Self {
        self.status = status;
        self
    }

    /// Marks the process as stopped.
    #[must_use]
    pub fn stopped(mut self) -> Self {
        self.is_stopped = true;
        self
    }

    /// Returns true if volume generation may run.
    #[must_use]
    pub const fn can_generate_volume(&self) -> bool {
        self.status.accepts_volume() && !self.is_stopped
    }

    /// Moves the process to `VolumeGenerated`.
    pub fn mark_as_volume_generated(&mut self) {
        self.set_status(ProcessStatus::VolumeGenerated);
    }

    /// Moves the process to `Error`.
    pub fn mark_as_error(&mut self) {
        self.set_status(ProcessStatus::Error);
    }

    fn set_status(&mut self, status: ProcessStatus) {
        self.status = status;
        self.updated_on = Utc::now();
    }
}
