//! Concurrency throttling decorator.

use crate::errors::{EngineError, EngineResult};
use crate::pipeline::Handler;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, trace};

/// What a throttle does when every permit is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Wait until a permit frees up.
    #[default]
    Wait,
    /// Fail immediately with [`EngineError::Throttled`].
    Reject,
}

/// Decorator bounding concurrent executions of the inner stage.
///
/// The bound is per filter instance. Permits are released when the guard
/// drops, so early returns and errors cannot leak them.
pub struct ThrottlingFilter<M>
where
    M: Send + Sync + 'static,
{
    inner: Arc<dyn Handler<M>>,
    permits: Semaphore,
    max_permits: usize,
    policy: OverflowPolicy,
    scope: String,
}

impl<M> ThrottlingFilter<M>
where
    M: Send + Sync + 'static,
{
    /// Creates a waiting throttle; a permit count of zero is raised to one.
    pub fn new(inner: Arc<dyn Handler<M>>, max_permits: usize, scope: impl Into<String>) -> Self {
        let max_permits = max_permits.max(1);
        Self {
            inner,
            permits: Semaphore::new(max_permits),
            max_permits,
            policy: OverflowPolicy::Wait,
            scope: scope.into(),
        }
    }

    /// Sets the overflow policy.
    #[must_use]
    pub fn with_policy(mut self, policy: OverflowPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the configured permit count.
    #[must_use]
    pub const fn max_permits(&self) -> usize {
        self.max_permits
    }

    /// Returns the number of free permits.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Returns the overflow policy.
    #[must_use]
    pub const fn policy(&self) -> OverflowPolicy {
        self.policy
    }
}

#[async_trait]
impl<M> Handler<M> for ThrottlingFilter<M>
where
    M: Send + Sync + 'static,
{
    async fn handle(&self, message: &M) -> EngineResult<()> {
        let _permit = match self.policy {
            OverflowPolicy::Wait => {
                if self.permits.available_permits() == 0 {
                    debug!(scope = %self.scope, "Waiting for throttle permit");
                }
                self.permits
                    .acquire()
                    .await
                    .map_err(|_| EngineError::internal("throttle semaphore closed"))?
            }
            OverflowPolicy::Reject => self.permits.try_acquire().map_err(|_| {
                debug!(scope = %self.scope, "Throttle permit unavailable, rejecting");
                EngineError::Throttled {
                    scope: self.scope.clone(),
                    permits: self.max_permits,
                }
            })?,
        };

        trace!(scope = %self.scope, "Throttle permit acquired");
        self.inner.handle(message).await
    }
}

impl<M> fmt::Debug for ThrottlingFilter<M>
where
    M: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottlingFilter")
            .field("scope", &self.scope)
            .field("max_permits", &self.max_permits)
            .field("available", &self.permits.available_permits())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
