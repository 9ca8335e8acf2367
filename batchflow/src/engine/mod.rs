//! Volume generation engine.
//!
//! [`ProcessVolumeRequestHandler`] receives volume requests, holds them while
//! the engine is paused, and runs each through the cached pipeline of its
//! process key. The pipeline ends in a [`VolumeGenerator`].

mod dispatcher;
mod generator;
mod pause;

#[cfg(test)]
mod integration_tests;

pub use dispatcher::{EngineServices, ProcessVolumeRequestHandler};
pub use generator::VolumeGenerator;
pub use pause::PauseGate;
