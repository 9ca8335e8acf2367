//! Terminal stage of a process pipeline.

use crate::errors::{EngineError, EngineResult};
use crate::pipeline::{safe_call_with_retry, Handler, SafeCallOptions};
use crate::process::{BaseProcess, ProcessExecutionContext, StateManager, VolumeHandler};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, trace, warn};

/// Generates the volume of one business process.
///
/// Volume is only generated for processes whose authoritative state is
/// `New` and not stopped; anything else is skipped with a warning.
pub struct VolumeGenerator {
    process: Arc<dyn BaseProcess>,
    state_manager: Arc<dyn StateManager>,
    volume_handler: Arc<dyn VolumeHandler>,
    supporting_data: SafeCallOptions,
}

impl VolumeGenerator {
    /// Creates a generator for `process`.
    pub fn new(
        process: Arc<dyn BaseProcess>,
        state_manager: Arc<dyn StateManager>,
        volume_handler: Arc<dyn VolumeHandler>,
        supporting_data: SafeCallOptions,
    ) -> Self {
        Self {
            process,
            state_manager,
            volume_handler,
            supporting_data,
        }
    }
}

#[async_trait]
impl Handler<ProcessExecutionContext> for VolumeGenerator {
    async fn handle(&self, ctx: &ProcessExecutionContext) -> EngineResult<()> {
        trace!(process = self.process.name(), "Volume handler");

        let state = self.state_manager.process_by_id(ctx.process_id()).await?;
        if !state.can_generate_volume() {
            warn!(
                status = %state.status,
                is_stopped = state.is_stopped,
                "Cannot generate volume if process is not 'New' or process is stopped"
            );
            return Ok(());
        }

        self.process
            .handle_volume(self.volume_handler.as_ref(), ctx)
            .await?;
        info!("Volume generated successfully");

        if let Some(supporting) = self.process.as_supporting_data() {
            trace!("Initializing supporting data");
            safe_call_with_retry(&self.supporting_data, move || async move {
                supporting
                    .initialize_supporting_data(ctx)
                    .await
                    .map_err(EngineError::from)
            })
            .await?;
        }

        trace!("Marking process as generated");
        ctx.mark_as_volume_generated();

        // Volume exists from here on; a failed write-back must not reach the
        // retry stage or the process would be volumed again.
        if let Err(e) = self.state_manager.update_process(&ctx.process_state()).await {
            error!(error = %e, "Failed to record generated volume");
        }
        Ok(())
    }
}

impl fmt::Debug for VolumeGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VolumeGenerator")
            .field("process_key", &self.process.process_key())
            .field("supporting_data", &self.supporting_data)
            .finish_non_exhaustive()
    }
}
