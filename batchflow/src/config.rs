//! Engine and per-process configuration.

use crate::errors::{EngineError, EngineResult};
use crate::filters::OverflowPolicy;
use crate::pipeline::MaxRetries;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Engine-wide settings for the volume pipelines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fixed delay between volume retries in milliseconds.
    pub retry_delay_ms: u64,
    /// Retries for supporting-data initialization.
    pub supporting_data_retries: u32,
    /// Delay between supporting-data retries in milliseconds.
    pub supporting_data_delay_ms: u64,
    /// Concurrent volume generations allowed per process key.
    pub volume_throttle_permits: usize,
    /// What to do when every throttle permit is taken.
    pub throttle_policy: OverflowPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: 3000,
            supporting_data_retries: 3,
            supporting_data_delay_ms: 1000,
            volume_throttle_permits: 1,
            throttle_policy: OverflowPolicy::Wait,
        }
    }
}

impl EngineConfig {
    /// Creates a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a config from JSON, filling missing fields with defaults.
    pub fn from_json(raw: &str) -> EngineResult<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the config for values the engine cannot run with.
    pub fn validate(&self) -> EngineResult<()> {
        if self.volume_throttle_permits == 0 {
            return Err(EngineError::configuration(
                "volume_throttle_permits must be at least 1",
            ));
        }
        Ok(())
    }

    /// Sets the volume retry delay.
    #[must_use]
    pub fn with_retry_delay_ms(mut self, delay: u64) -> Self {
        self.retry_delay_ms = delay;
        self
    }

    /// Sets supporting-data retry behavior.
    #[must_use]
    pub fn with_supporting_data_retry(mut self, retries: u32, delay_ms: u64) -> Self {
        self.supporting_data_retries = retries;
        self.supporting_data_delay_ms = delay_ms;
        self
    }

    /// Sets the throttle permit count.
    #[must_use]
    pub fn with_volume_throttle_permits(mut self, permits: usize) -> Self {
        self.volume_throttle_permits = permits;
        self
    }

    /// Sets the throttle overflow policy.
    #[must_use]
    pub fn with_throttle_policy(mut self, policy: OverflowPolicy) -> Self {
        self.throttle_policy = policy;
        self
    }

    /// Returns the volume retry delay.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Returns the supporting-data retry delay.
    #[must_use]
    pub const fn supporting_data_delay(&self) -> Duration {
        Duration::from_millis(self.supporting_data_delay_ms)
    }
}

/// Settings for a single business process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessConfiguration {
    /// Volume retries; `-1` means unlimited and `0` disables retrying.
    pub max_volume_retries: i32,
}

impl ProcessConfiguration {
    /// Creates a configuration with the given retry bound.
    #[must_use]
    pub const fn new(max_volume_retries: i32) -> Self {
        Self { max_volume_retries }
    }

    /// Returns the typed retry bound.
    #[must_use]
    pub fn max_retries(&self) -> MaxRetries {
        MaxRetries::from_config(self.max_volume_retries)
    }
}

/// Source of per-process configuration.
///
/// Lookups happen while a pipeline is being built, so they are synchronous.
pub trait ConfigurationCache: Send + Sync {
    /// Returns the configuration for a process key.
    fn process_configuration(&self, process_key: i32) -> EngineResult<ProcessConfiguration>;
}

/// In-memory configuration cache with a fallback for unknown keys.
#[derive(Debug, Default)]
pub struct InMemoryConfigurationCache {
    entries: RwLock<HashMap<i32, ProcessConfiguration>>,
    fallback: Option<ProcessConfiguration>,
}

impl InMemoryConfigurationCache {
    /// Creates an empty cache that rejects unknown keys.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `fallback` for keys without an explicit entry.
    #[must_use]
    pub fn with_fallback(mut self, fallback: ProcessConfiguration) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Sets the configuration for a process key.
    pub fn insert(&self, process_key: i32, config: ProcessConfiguration) {
        self.entries.write().insert(process_key, config);
    }
}

impl ConfigurationCache for InMemoryConfigurationCache {
    fn process_configuration(&self, process_key: i32) -> EngineResult<ProcessConfiguration> {
        self.entries
            .read()
            .get(&process_key)
            .copied()
            .or(self.fallback)
            .ok_or_else(|| {
                EngineError::configuration(format!(
                    "no configuration for process key {process_key}"
                ))
            })
    }
}

/// Settings for the tracing subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Filter used when `RUST_LOG` is not set.
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json_format: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_format: false,
        }
    }
}
