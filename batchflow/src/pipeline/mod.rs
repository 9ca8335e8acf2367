//! Pipeline building and execution.
//!
//! This module provides:
//! - The [`Handler`] contract shared by stages and decorators
//! - [`Pipeline`], an ordered chain of decorators around a terminal handler
//! - Fixed-delay retry utilities used across the engine

mod chain;
mod handler;
mod retry;

pub use chain::Pipeline;
pub use handler::{FnHandler, Handler};
pub use retry::{
    retry_with_delay, safe_call, safe_call_with_retry, safe_invoke, should_retry, MaxRetries,
    PropagateFilter, RetryDecision, SafeCallOptions,
};
