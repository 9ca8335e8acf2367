//! Contracts implemented by business processes.

use super::{ProcessExecutionContext, Serializer, VolumeHandler};
use async_trait::async_trait;
use std::sync::Arc;

/// A business process whose volume the engine generates.
#[async_trait]
pub trait BaseProcess: Send + Sync {
    /// Returns the key this process is registered under.
    fn process_key(&self) -> i32;

    /// Returns a human-readable name.
    fn name(&self) -> &str {
        "process"
    }

    /// Produces the initial units of work and hands them to `volume`.
    async fn handle_volume(
        &self,
        volume: &dyn VolumeHandler,
        ctx: &ProcessExecutionContext,
    ) -> anyhow::Result<()>;

    /// Returns the supporting-data capability, if the process has one.
    fn as_supporting_data(&self) -> Option<&dyn SupportingData> {
        None
    }
}

/// Process-wide data loaded once volume exists.
#[async_trait]
pub trait SupportingData: Send + Sync {
    /// Loads the data for the process in `ctx`.
    async fn initialize_supporting_data(&self, ctx: &ProcessExecutionContext) -> anyhow::Result<()>;
}

/// Executes the tasks of one process key.
pub trait ProcessTask: Send + Sync {
    /// Returns the process key served by this task handler.
    fn process_key(&self) -> i32;

    /// Returns a human-readable name.
    fn name(&self) -> &str {
        "task"
    }

    /// Returns a custom payload serializer.
    fn serializer(&self) -> Option<Arc<dyn Serializer>> {
        None
    }
}

/// Receives node role changes.
pub trait MasterSlaveObserver: Send + Sync {
    /// Called when this node becomes master.
    fn on_master(&self) -> anyhow::Result<()>;

    /// Called when this node becomes slave.
    fn on_slave(&self) -> anyhow::Result<()>;
}
