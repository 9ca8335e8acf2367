//! Gate that holds new volume requests while the engine is paused.

use tokio::sync::watch;
use tracing::info;

/// Shared pause switch.
///
/// Requests wait in [`PauseGate::wait_running`] while the gate is paused.
/// Resuming releases every waiter at once.
#[derive(Debug)]
pub struct PauseGate {
    paused: watch::Sender<bool>,
}

impl Default for PauseGate {
    fn default() -> Self {
        let (paused, _) = watch::channel(false);
        Self { paused }
    }
}

impl PauseGate {
    /// Creates a running gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Closes the gate.
    pub fn pause(&self) {
        if !self.paused.send_replace(true) {
            info!("Volume requests paused");
        }
    }

    /// Opens the gate and releases all waiters.
    pub fn resume(&self) {
        if self.paused.send_replace(false) {
            info!("Volume requests resumed");
        }
    }

    /// Returns true if the gate is closed.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Waits until the gate is open.
    pub async fn wait_running(&self) {
        let mut rx = self.paused.subscribe();
        // The sender lives in self, so the channel cannot close while waiting.
        let _ = rx.wait_for(|paused| !*paused).await;
    }
}
