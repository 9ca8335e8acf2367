//! Entry point for volume requests.

use super::{PauseGate, VolumeGenerator};
use crate::config::{ConfigurationCache, EngineConfig};
use crate::errors::{EngineError, EngineResult};
use crate::events::{EventAggregator, ProcessGroupRemoved, SubscriptionId};
use crate::filters::{DuplicateCheckFilter, RetryFeatureHandler, ThrottlingFilter};
use crate::observability::SpanTimer;
use crate::pipeline::{Handler, MaxRetries, Pipeline, SafeCallOptions};
use crate::process::{ProcessExecutionContext, ProcessRegistry, StateManager, VolumeHandler};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, trace, Instrument};

type VolumePipeline = Pipeline<ProcessExecutionContext>;
type VolumeDuplicateCheck = DuplicateCheckFilter<ProcessExecutionContext, i64>;

/// Collaborators the request handler works against.
#[derive(Clone)]
pub struct EngineServices {
    /// Registered processes.
    pub registry: Arc<dyn ProcessRegistry>,
    /// Authoritative process state.
    pub state_manager: Arc<dyn StateManager>,
    /// Per-process configuration.
    pub configuration: Arc<dyn ConfigurationCache>,
    /// Bus carrying [`ProcessGroupRemoved`] notifications.
    pub events: Arc<EventAggregator>,
    /// Destination of generated volume.
    pub volume_handler: Arc<dyn VolumeHandler>,
}

impl fmt::Debug for EngineServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineServices")
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

struct PipelineEntry {
    pipeline: Arc<VolumePipeline>,
    duplicate_check: Arc<VolumeDuplicateCheck>,
    subscription: SubscriptionId,
}

/// Dispatches volume requests to per-process pipelines.
///
/// The first request for a process key builds its pipeline:
/// duplicate check, then retry (when configured), then a single-permit
/// throttle around the [`VolumeGenerator`]. Later requests reuse it.
/// Failures never escape [`ProcessVolumeRequestHandler::handle`]; they are
/// recorded on the request context instead.
pub struct ProcessVolumeRequestHandler {
    services: EngineServices,
    config: EngineConfig,
    pause: Arc<PauseGate>,
    pipelines: DashMap<i32, PipelineEntry>,
}

impl ProcessVolumeRequestHandler {
    /// Creates a handler with the default engine config.
    pub fn new(services: EngineServices) -> Self {
        Self {
            services,
            config: EngineConfig::default(),
            pause: Arc::new(PauseGate::new()),
            pipelines: DashMap::new(),
        }
    }

    /// Sets the engine config.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Shares an externally owned pause gate.
    #[must_use]
    pub fn with_pause_gate(mut self, pause: Arc<PauseGate>) -> Self {
        self.pause = pause;
        self
    }

    /// Handles a volume request.
    ///
    /// Never fails: a missing process or a pipeline error marks `ctx` as
    /// errored.
    pub async fn handle(&self, ctx: &ProcessExecutionContext) {
        let span = ctx.span().clone();
        self.dispatch(ctx).instrument(span).await;
    }

    async fn dispatch(&self, ctx: &ProcessExecutionContext) {
        trace!("{}", ctx.formatted_message("Volume request received"));
        self.pause.wait_running().await;

        let pipeline = match self.pipeline_for(ctx.process_key()) {
            Ok(pipeline) => pipeline,
            Err(EngineError::HandlerNotFound { .. }) => {
                let message = ctx.formatted_message("Volume handler not found");
                error!("{message}");
                ctx.mark_as_error(message);
                return;
            }
            Err(e) => {
                let message = ctx.formatted_error("Error building volume pipeline", &e);
                error!("{message}");
                ctx.mark_as_error(message);
                return;
            }
        };

        trace!("{}", ctx.formatted_message("Volume request sending to pipeline"));
        let timer = SpanTimer::start(pipeline.name());
        let result = AssertUnwindSafe(pipeline.invoke(ctx)).catch_unwind().await;
        debug!(
            pipeline = timer.name(),
            elapsed_ms = timer.elapsed_ms(),
            succeeded = matches!(result, Ok(Ok(()))),
            "Volume pipeline finished"
        );

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let message = ctx.formatted_error("Error generating volume", &e);
                error!("{message}");
                ctx.mark_as_error(message);
            }
            Err(panic) => {
                let message =
                    ctx.formatted_error("Volume generation panicked", &panic_message(panic.as_ref()));
                error!("{message}");
                ctx.mark_as_error(message);
            }
        }
    }

    /// Returns the cached pipeline for a key, building it on first use.
    ///
    /// The map entry stays locked while building, so concurrent first
    /// requests for one key build exactly one pipeline. Failed builds are not
    /// cached.
    fn pipeline_for(&self, process_key: i32) -> EngineResult<Arc<VolumePipeline>> {
        match self.pipelines.entry(process_key) {
            Entry::Occupied(entry) => Ok(Arc::clone(&entry.get().pipeline)),
            Entry::Vacant(entry) => {
                let built = self.build_pipeline(process_key)?;
                let pipeline = Arc::clone(&built.pipeline);
                entry.insert(built);
                Ok(pipeline)
            }
        }
    }

    fn build_pipeline(&self, process_key: i32) -> EngineResult<PipelineEntry> {
        let process = self
            .services
            .registry
            .process(process_key)
            .ok_or(EngineError::HandlerNotFound { process_key })?;
        let process_config = self
            .services
            .configuration
            .process_configuration(process_key)?;
        let max_retries = process_config.max_retries();

        let supporting_data = SafeCallOptions::new()
            .with_retries(
                MaxRetries::Limited(self.config.supporting_data_retries),
                self.config.supporting_data_delay(),
            )
            .with_message("Supporting data initialization failed");
        let generator: Arc<dyn Handler<ProcessExecutionContext>> = Arc::new(VolumeGenerator::new(
            process,
            Arc::clone(&self.services.state_manager),
            Arc::clone(&self.services.volume_handler),
            supporting_data,
        ));

        let scope = format!("VolumeGenerator{process_key}");
        let mut pipeline = Pipeline::new(scope.clone(), generator);

        pipeline.register_decorator(|inner| {
            ThrottlingFilter::new(inner, self.config.volume_throttle_permits, scope.clone())
                .with_policy(self.config.throttle_policy)
        })?;
        if !max_retries.is_disabled() {
            let delay = self.config.retry_delay();
            pipeline.register_decorator(|inner| {
                RetryFeatureHandler::new(inner, max_retries, delay, scope.clone())
            })?;
        }
        let duplicate_check = pipeline.register_decorator(|inner| {
            DuplicateCheckFilter::new(inner, |ctx: &ProcessExecutionContext| ctx.process_id(), scope.clone())
        })?;

        let cleanup = Arc::clone(&duplicate_check);
        let subscription = self
            .services
            .events
            .subscribe(move |message: &ProcessGroupRemoved| {
                cleanup.cleanup(message.process_ids.iter().copied());
            });

        info!(
            process_key,
            max_retries = %max_retries,
            stages = pipeline.len(),
            "Volume pipeline built"
        );

        Ok(PipelineEntry {
            pipeline: Arc::new(pipeline),
            duplicate_check,
            subscription,
        })
    }

    /// Drops the cached pipeline of a key. Returns false if none was cached.
    pub fn evict(&self, process_key: i32) -> bool {
        match self.pipelines.remove(&process_key) {
            Some((_, entry)) => {
                self.services.events.unsubscribe(entry.subscription);
                debug!(process_key, "Volume pipeline evicted");
                true
            }
            None => false,
        }
    }

    /// Drops every cached pipeline.
    pub fn clear(&self) {
        let keys: Vec<i32> = self.pipelines.iter().map(|entry| *entry.key()).collect();
        for key in keys {
            self.evict(key);
        }
    }

    /// Returns the number of cached pipelines.
    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Returns true if a pipeline is cached for the key.
    #[must_use]
    pub fn contains(&self, process_key: i32) -> bool {
        self.pipelines.contains_key(&process_key)
    }

    /// Returns true if the process id is marked by the key's duplicate check.
    #[must_use]
    pub fn is_duplicate(&self, process_key: i32, process_id: i64) -> bool {
        self.pipelines
            .get(&process_key)
            .is_some_and(|entry| entry.duplicate_check.is_seen(&process_id))
    }

    /// Holds new requests until [`Self::resume`].
    pub fn pause(&self) {
        self.pause.pause();
    }

    /// Releases held requests.
    pub fn resume(&self) {
        self.pause.resume();
    }

    /// Returns true if requests are being held.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

#[async_trait]
impl Handler<ProcessExecutionContext> for ProcessVolumeRequestHandler {
    async fn handle(&self, message: &ProcessExecutionContext) -> EngineResult<()> {
        ProcessVolumeRequestHandler::handle(self, message).await;
        Ok(())
    }
}

impl Drop for ProcessVolumeRequestHandler {
    fn drop(&mut self) {
        for entry in self.pipelines.iter() {
            self.services.events.unsubscribe(entry.subscription);
        }
    }
}

impl fmt::Debug for ProcessVolumeRequestHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessVolumeRequestHandler")
            .field("config", &self.config)
            .field("pipelines", &self.pipelines.len())
            .field("paused", &self.pause.is_paused())
            .finish_non_exhaustive()
    }
}
