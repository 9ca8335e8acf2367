//! In-process event delivery.
//!
//! The engine subscribes to [`ProcessGroupRemoved`] to invalidate stale
//! duplicate-check entries.

mod aggregator;
mod messages;

pub use aggregator::{EventAggregator, SubscriptionId};
pub use messages::ProcessGroupRemoved;
