//! Process model: state, contexts, contracts and the registry.

mod context;
mod definition;
mod repository;
mod serializer;
mod state;
mod state_manager;
mod status;
mod volume;

pub use context::ProcessExecutionContext;
pub use definition::{BaseProcess, MasterSlaveObserver, ProcessTask, SupportingData};
pub use repository::{ProcessRegistry, ProcessRepository};
pub use serializer::{JsonSerializer, Serializer};
pub use state::ProcessState;
#[cfg(test)]
pub use state_manager::MockStateManager;
pub use state_manager::{InMemoryStateManager, StateManager};
pub use status::{ProcessStatus, TaskStatus};
pub use volume::{InMemoryVolumeHandler, VolumeHandler, VolumeItem};
