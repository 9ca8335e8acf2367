//! Process and task status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a business process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    /// Created, volume not generated yet.
    #[default]
    New,
    /// Volume generated; tasks can be executed.
    VolumeGenerated,
    /// Tasks are being executed.
    Processing,
    /// All tasks completed.
    Finished,
    /// A terminal failure was recorded.
    Error,
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::VolumeGenerated => write!(f, "volume_generated"),
            Self::Processing => write!(f, "processing"),
            Self::Finished => write!(f, "finished"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl ProcessStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Error)
    }

    /// Returns true if volume can be generated from this status.
    #[must_use]
    pub const fn accepts_volume(&self) -> bool {
        matches!(self, Self::New)
    }
}

/// Execution status of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be picked up.
    #[default]
    Pending,
    /// Currently executing.
    Processing,
    /// Waiting for a retry.
    Retry,
    /// Completed successfully.
    Finished,
    /// Failed permanently.
    Error,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Retry => write!(f, "retry"),
            Self::Finished => write!(f, "finished"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl TaskStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Error)
    }
}
