//! Test fixtures wiring an engine to in-memory collaborators.

use std::sync::Arc;

use crate::config::{EngineConfig, InMemoryConfigurationCache, ProcessConfiguration};
use crate::engine::{EngineServices, ProcessVolumeRequestHandler};
use crate::events::EventAggregator;
use crate::process::{
    BaseProcess, InMemoryStateManager, InMemoryVolumeHandler, ProcessExecutionContext,
    ProcessRepository, ProcessState,
};

/// In-memory collaborators for a volume request handler.
///
/// Delays default to one millisecond so retry paths stay fast.
#[derive(Debug)]
pub struct EngineFixture {
    /// Process registry.
    pub repository: Arc<ProcessRepository>,
    /// Process state store.
    pub state_manager: Arc<InMemoryStateManager>,
    /// Per-process configuration.
    pub configuration: Arc<InMemoryConfigurationCache>,
    /// Event bus.
    pub events: Arc<EventAggregator>,
    /// Volume store.
    pub volume: Arc<InMemoryVolumeHandler>,
    /// Engine config passed to built handlers.
    pub config: EngineConfig,
}

impl Default for EngineFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineFixture {
    /// Creates a fixture with no registered process.
    #[must_use]
    pub fn new() -> Self {
        Self {
            repository: Arc::new(ProcessRepository::new()),
            state_manager: Arc::new(InMemoryStateManager::new()),
            configuration: Arc::new(
                InMemoryConfigurationCache::new().with_fallback(ProcessConfiguration::new(0)),
            ),
            events: Arc::new(EventAggregator::new()),
            volume: Arc::new(InMemoryVolumeHandler::new()),
            config: EngineConfig::new()
                .with_retry_delay_ms(1)
                .with_supporting_data_retry(3, 1),
        }
    }

    /// Replaces the engine config.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers a process with its volume retry bound.
    #[must_use]
    pub fn with_process(self, process: Arc<dyn BaseProcess>, max_volume_retries: i32) -> Self {
        self.configuration
            .insert(process.process_key(), ProcessConfiguration::new(max_volume_retries));
        self.repository.register_process(process);
        self
    }

    /// Stores a `New` process and returns a request context for it.
    #[must_use]
    pub fn new_request(&self, process_id: i64, process_key: i32) -> ProcessExecutionContext {
        self.request_for(ProcessState::new(process_id, process_key))
    }

    /// Stores `state` and returns a request context for it.
    #[must_use]
    pub fn request_for(&self, state: ProcessState) -> ProcessExecutionContext {
        self.state_manager.insert(state.clone());
        ProcessExecutionContext::new(state)
    }

    /// Returns the services for a request handler.
    #[must_use]
    pub fn services(&self) -> EngineServices {
        EngineServices {
            registry: self.repository.clone(),
            state_manager: self.state_manager.clone(),
            configuration: self.configuration.clone(),
            events: self.events.clone(),
            volume_handler: self.volume.clone(),
        }
    }

    /// Builds a request handler over the fixture.
    #[must_use]
    pub fn handler(&self) -> ProcessVolumeRequestHandler {
        ProcessVolumeRequestHandler::new(self.services()).with_config(self.config.clone())
    }
}
