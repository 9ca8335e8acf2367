//! Duplicate suppression decorator.

use crate::errors::EngineResult;
use crate::pipeline::Handler;
use async_trait::async_trait;
use dashmap::DashSet;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use tracing::{debug, trace};

/// Extracts the dedup key from a message.
pub type KeyExtractor<M, K> = Box<dyn Fn(&M) -> K + Send + Sync>;

/// Decorator admitting each key at most once per scope.
///
/// A key stays marked after the inner stage returns, whether it succeeded or
/// failed; only [`DuplicateCheckFilter::cleanup`] readmits it.
pub struct DuplicateCheckFilter<M, K>
where
    M: Send + Sync + 'static,
    K: Eq + Hash,
{
    inner: Arc<dyn Handler<M>>,
    key_of: KeyExtractor<M, K>,
    scope: String,
    seen: DashSet<K>,
}

impl<M, K> DuplicateCheckFilter<M, K>
where
    M: Send + Sync + 'static,
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    /// Creates a new filter around `inner`.
    pub fn new<F>(inner: Arc<dyn Handler<M>>, key_of: F, scope: impl Into<String>) -> Self
    where
        F: Fn(&M) -> K + Send + Sync + 'static,
    {
        Self {
            inner,
            key_of: Box::new(key_of),
            scope: scope.into(),
            seen: DashSet::new(),
        }
    }

    /// Returns the scope name.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Returns true if the key is currently marked.
    #[must_use]
    pub fn is_seen(&self, key: &K) -> bool {
        self.seen.contains(key)
    }

    /// Returns the number of marked keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns true if no key is marked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Unmarks keys so they are admitted again. Returns how many were marked.
    pub fn cleanup<I>(&self, keys: I) -> usize
    where
        I: IntoIterator<Item = K>,
    {
        let removed = keys
            .into_iter()
            .filter(|key| self.seen.remove(key).is_some())
            .count();

        if removed > 0 {
            debug!(scope = %self.scope, removed, "Duplicate check keys cleaned up");
        }
        removed
    }
}

#[async_trait]
impl<M, K> Handler<M> for DuplicateCheckFilter<M, K>
where
    M: Send + Sync + 'static,
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
{
    async fn handle(&self, message: &M) -> EngineResult<()> {
        let key = (self.key_of)(message);

        // insert is the atomic test-and-set
        if !self.seen.insert(key.clone()) {
            debug!(scope = %self.scope, key = ?key, "Duplicate message skipped");
            return Ok(());
        }

        trace!(scope = %self.scope, key = ?key, "Message admitted");
        self.inner.handle(message).await
    }
}

impl<M, K> fmt::Debug for DuplicateCheckFilter<M, K>
where
    M: Send + Sync + 'static,
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuplicateCheckFilter")
            .field("scope", &self.scope)
            .field("seen", &self.seen.len())
            .finish_non_exhaustive()
    }
}
