//! Testing utilities for batchflow engines.
//!
//! This module provides:
//! - Mock business processes and pipeline stages
//! - Assertions on request contexts
//! - An engine fixture over in-memory collaborators

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_process_errored, assert_process_status, assert_process_untouched,
    assert_volume_generated,
};
pub use fixtures::EngineFixture;
pub use mocks::{FailingProcess, MockProcess, RecordingHandler};
