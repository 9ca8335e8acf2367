//! Resilience decorators for pipeline stages.
//!
//! Each filter wraps one inner [`Handler`](crate::pipeline::Handler) and
//! implements the same contract, so filters compose in any order.

mod duplicate_check;
mod retry_feature;
mod throttling;

pub use duplicate_check::{DuplicateCheckFilter, KeyExtractor};
pub use retry_feature::RetryFeatureHandler;
pub use throttling::{OverflowPolicy, ThrottlingFilter};
