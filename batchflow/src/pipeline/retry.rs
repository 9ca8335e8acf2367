//! Retry utilities with a fixed delay between attempts.
//!
//! [`retry_with_delay`] propagates the last failure once the bound is
//! exhausted. The `safe_call` family is for best-effort work: failures are
//! logged and dropped unless a propagation filter claims them.

use crate::errors::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on retries after the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaxRetries {
    /// Retry until the operation succeeds.
    Unlimited,
    /// Retry at most this many times.
    Limited(u32),
}

impl Default for MaxRetries {
    fn default() -> Self {
        Self::Limited(0)
    }
}

impl MaxRetries {
    /// Converts a configuration value where any negative number means unlimited.
    #[must_use]
    pub fn from_config(value: i32) -> Self {
        u32::try_from(value).map_or(Self::Unlimited, Self::Limited)
    }

    /// Returns true if another retry is allowed after `retries` retries.
    #[must_use]
    pub const fn allows(&self, retries: u32) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Limited(max) => retries < *max,
        }
    }

    /// Returns true if no retries are allowed at all.
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        matches!(self, Self::Limited(0))
    }
}

impl fmt::Display for MaxRetries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => write!(f, "unlimited"),
            Self::Limited(max) => write!(f, "{max}"),
        }
    }
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry(Duration),
    /// No more retries, give up.
    GiveUp,
}

/// Decides whether to retry after `retries` retries have already been made.
#[must_use]
pub const fn should_retry(max: MaxRetries, retries: u32, delay: Duration) -> RetryDecision {
    if max.allows(retries) {
        RetryDecision::Retry(delay)
    } else {
        RetryDecision::GiveUp
    }
}

/// Executes an operation, retrying failures with a fixed delay.
///
/// The operation receives the zero-based attempt number. With
/// `MaxRetries::Limited(n)` it runs at most `n + 1` times; the last error is
/// returned when every attempt fails.
pub async fn retry_with_delay<T, E, F, Fut>(
    max: MaxRetries,
    delay: Duration,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut retries = 0u32;

    loop {
        match operation(retries).await {
            Ok(result) => return Ok(result),
            Err(e) => match should_retry(max, retries, delay) {
                RetryDecision::Retry(delay) => {
                    retries = retries.saturating_add(1);
                    tracing::debug!(
                        retry = retries,
                        max_retries = %max,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Retrying after error"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => return Err(e),
            },
        }
    }
}

/// Predicate deciding which errors bypass the safe-call swallowing.
pub type PropagateFilter = Arc<dyn Fn(&EngineError) -> bool + Send + Sync>;

/// Options for [`safe_call_with_retry`].
#[derive(Clone, Default)]
pub struct SafeCallOptions {
    max_retries: MaxRetries,
    delay: Duration,
    message: Option<String>,
    propagate: Option<PropagateFilter>,
}

impl SafeCallOptions {
    /// Creates options for a single attempt.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retry bound and delay.
    #[must_use]
    pub fn with_retries(mut self, max_retries: MaxRetries, delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.delay = delay;
        self
    }

    /// Sets the message logged on failure instead of the error text.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Sets a filter; matching errors are returned to the caller immediately.
    #[must_use]
    pub fn with_propagate<F>(mut self, filter: F) -> Self
    where
        F: Fn(&EngineError) -> bool + Send + Sync + 'static,
    {
        self.propagate = Some(Arc::new(filter));
        self
    }

    fn propagates(&self, error: &EngineError) -> bool {
        self.propagate.as_ref().is_some_and(|filter| filter(error))
    }
}

impl fmt::Debug for SafeCallOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SafeCallOptions")
            .field("max_retries", &self.max_retries)
            .field("delay", &self.delay)
            .field("message", &self.message)
            .field("propagate", &self.propagate.is_some())
            .finish()
    }
}

/// Runs a best-effort action with retries.
///
/// Every failure is logged at warn level. An error accepted by the
/// propagation filter is returned immediately; otherwise the call gives up
/// silently once the retries are spent and returns `Ok(())`.
pub async fn safe_call_with_retry<F, Fut>(options: &SafeCallOptions, mut action: F) -> EngineResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<()>>,
{
    let mut retries = 0u32;

    loop {
        let error = match action().await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        if options.propagates(&error) {
            return Err(error);
        }

        match &options.message {
            Some(message) => tracing::warn!(error = %error, "{message}"),
            None => tracing::warn!(error = %error, "Safe call has error '{error}'"),
        }

        match should_retry(options.max_retries, retries, options.delay) {
            RetryDecision::Retry(delay) => {
                retries = retries.saturating_add(1);
                tokio::time::sleep(delay).await;
            }
            RetryDecision::GiveUp => return Ok(()),
        }
    }
}

/// Runs a best-effort action once, ignoring any retries set on `options`.
pub async fn safe_call<F, Fut>(options: &SafeCallOptions, action: F) -> EngineResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<()>>,
{
    let once = options.clone().with_retries(MaxRetries::Limited(0), Duration::ZERO);
    safe_call_with_retry(&once, action).await
}

/// Runs a synchronous callback, containing both errors and panics.
///
/// Returns true if the callback completed successfully.
pub fn safe_invoke<F>(label: &str, callback: F) -> bool
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!(callback = label, error = %e, "Callback failed");
            false
        }
        Err(_) => {
            tracing::warn!(callback = label, "Callback panicked");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const TICK: Duration = Duration::from_millis(1);

    #[test]
    fn test_max_retries_from_config() {
        assert_eq!(MaxRetries::from_config(-1), MaxRetries::Unlimited);
        assert_eq!(MaxRetries::from_config(-5), MaxRetries::Unlimited);
        assert_eq!(MaxRetries::from_config(0), MaxRetries::Limited(0));
        assert_eq!(MaxRetries::from_config(3), MaxRetries::Limited(3));
        assert!(MaxRetries::from_config(0).is_disabled());
    }

    #[test]
    fn test_max_retries_allows() {
        let max = MaxRetries::Limited(2);
        assert!(max.allows(0));
        assert!(max.allows(1));
        assert!(!max.allows(2));
        assert!(MaxRetries::Unlimited.allows(u32::MAX));
    }

    #[test]
    fn test_should_retry() {
        assert_eq!(
            should_retry(MaxRetries::Limited(1), 0, TICK),
            RetryDecision::Retry(TICK)
        );
        assert_eq!(should_retry(MaxRetries::Limited(1), 1, TICK), RetryDecision::GiveUp);
    }

    #[tokio::test]
    async fn test_retry_success_first_try() {
        let mut calls = 0;

        let result: Result<i32, String> = retry_with_delay(MaxRetries::Limited(3), TICK, |_| {
            calls += 1;
            async { Ok(42) }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let result: Result<u32, String> = retry_with_delay(MaxRetries::Limited(5), TICK, |attempt| async move {
            if attempt < 2 {
                Err(format!("attempt {attempt}"))
            } else {
                Ok(attempt)
            }
        })
        .await;

        assert_eq!(result, Ok(2));
    }

    #[tokio::test]
    async fn test_retry_runs_max_plus_one_times() {
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = retry_with_delay(MaxRetries::Limited(3), TICK, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(format!("failure {attempt}")) }
        })
        .await;

        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_retry_zero_runs_once() {
        let calls = AtomicU32::new(0);

        let result: Result<(), &str> = retry_with_delay(MaxRetries::Limited(0), TICK, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("nope") }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_safe_call_swallows_after_exhaustion() {
        let calls = AtomicU32::new(0);
        let options = SafeCallOptions::new().with_retries(MaxRetries::Limited(2), TICK);

        let result = safe_call_with_retry(&options, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(EngineError::internal("flaky")) }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_safe_call_propagates_filtered_errors() {
        let calls = AtomicU32::new(0);
        let options = SafeCallOptions::new()
            .with_retries(MaxRetries::Limited(5), TICK)
            .with_message("loading cache")
            .with_propagate(|e| matches!(e, EngineError::Configuration(_)));

        let result = safe_call_with_retry(&options, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(EngineError::configuration("bad key")) }
        })
        .await;

        assert!(matches!(result, Err(EngineError::Configuration(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_safe_call_single_attempt() {
        let calls = AtomicU32::new(0);

        let options = SafeCallOptions::new()
            .with_retries(MaxRetries::Limited(5), Duration::from_millis(1))
            .with_message("Cleanup failed");

        let result = safe_call(&options, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(EngineError::internal("once")) }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_safe_invoke_contains_errors_and_panics() {
        assert!(safe_invoke("ok", || Ok(())));
        assert!(!safe_invoke("err", || Err(anyhow::anyhow!("failed"))));
        assert!(!safe_invoke("panic", || panic!("observer exploded")));
    }
}
