//! Decorated handler chains.

use super::Handler;
use crate::errors::{EngineError, EngineResult};
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An ordered chain of stages over one message type.
///
/// A pipeline starts with a terminal handler. Each registered decorator
/// wraps the chain built so far, so the last registered decorator is the
/// outermost stage and sees the message first. Registration is only allowed
/// until the first [`Pipeline::invoke`].
pub struct Pipeline<M>
where
    M: Send + Sync + 'static,
{
    name: String,
    head: Arc<dyn Handler<M>>,
    depth: usize,
    sealed: AtomicBool,
}

impl<M> Pipeline<M>
where
    M: Send + Sync + 'static,
{
    /// Creates a pipeline around a terminal handler.
    pub fn new(name: impl Into<String>, terminal: Arc<dyn Handler<M>>) -> Self {
        Self {
            name: name.into(),
            head: terminal,
            depth: 1,
            sealed: AtomicBool::new(false),
        }
    }

    /// Wraps the current chain with a decorator.
    ///
    /// `wrap` receives the current outermost stage and returns the decorator
    /// that will wrap it. The decorator is returned so callers can keep a
    /// handle on it (for example to drive cleanup).
    pub fn register_decorator<D, F>(&mut self, wrap: F) -> EngineResult<Arc<D>>
    where
        D: Handler<M> + 'static,
        F: FnOnce(Arc<dyn Handler<M>>) -> D,
    {
        if self.is_sealed() {
            return Err(EngineError::PipelineSealed {
                pipeline: self.name.clone(),
            });
        }

        let decorator = Arc::new(wrap(Arc::clone(&self.head)));
        let head: Arc<dyn Handler<M>> = decorator.clone();
        self.head = head;
        self.depth += 1;
        Ok(decorator)
    }

    /// Runs the message through every stage.
    pub async fn invoke(&self, message: &M) -> EngineResult<()> {
        self.sealed.store(true, Ordering::Release);
        self.head.handle(message).await
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages, terminal included.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.depth
    }

    /// Always false; a pipeline has at least its terminal stage.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Returns true once the pipeline has been invoked.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl<M> Handler<M> for Pipeline<M>
where
    M: Send + Sync + 'static,
{
    async fn handle(&self, message: &M) -> EngineResult<()> {
        self.invoke(message).await
    }
}

impl<M> fmt::Debug for Pipeline<M>
where
    M: Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("depth", &self.depth)
            .field("sealed", &self.sealed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
