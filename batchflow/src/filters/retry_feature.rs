//! Retry decorator with a fixed delay.

use crate::errors::EngineResult;
use crate::pipeline::{retry_with_delay, Handler, MaxRetries};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Decorator that absorbs intermediate failures of the inner stage.
///
/// The inner stage runs up to `max_retries + 1` times. The last error is
/// returned when every attempt fails.
pub struct RetryFeatureHandler<M>
where
    M: Send + Sync + 'static,
{
    inner: Arc<dyn Handler<M>>,
    max_retries: MaxRetries,
    delay: Duration,
    scope: String,
}

impl<M> RetryFeatureHandler<M>
where
    M: Send + Sync + 'static,
{
    /// Creates a new retry decorator.
    pub fn new(
        inner: Arc<dyn Handler<M>>,
        max_retries: MaxRetries,
        delay: Duration,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            max_retries,
            delay,
            scope: scope.into(),
        }
    }

    /// Returns the retry bound.
    #[must_use]
    pub const fn max_retries(&self) -> MaxRetries {
        self.max_retries
    }

    /// Returns the delay between attempts.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }
}

#[async_trait]
impl<M> Handler<M> for RetryFeatureHandler<M>
where
    M: Send + Sync + 'static,
{
    async fn handle(&self, message: &M) -> EngineResult<()> {
        retry_with_delay(self.max_retries, self.delay, |attempt| async move {
            let result = self.inner.handle(message).await;
            if let Err(ref e) = result {
                warn!(
                    scope = %self.scope,
                    attempt = attempt + 1,
                    max_retries = %self.max_retries,
                    error = %e,
                    "Stage attempt failed"
                );
            }
            result
        })
        .await
    }
}

impl<M> fmt::Debug for RetryFeatureHandler<M>
where
    M: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFeatureHandler")
            .field("scope", &self.scope)
            .field("max_retries", &self.max_retries)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}
