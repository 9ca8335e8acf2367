//! The handler contract shared by terminal stages and decorators.

use crate::errors::EngineResult;
use async_trait::async_trait;
use std::fmt;

/// A stage that processes one message.
///
/// Terminal handlers and every decorator implement this same contract, so a
/// decorator can wrap any stage without knowing its concrete type.
#[async_trait]
pub trait Handler<M>: Send + Sync
where
    M: Send + Sync,
{
    /// Processes the message.
    async fn handle(&self, message: &M) -> EngineResult<()>;
}

/// A handler backed by a synchronous closure.
pub struct FnHandler<F> {
    name: String,
    func: F,
}

impl<F> FnHandler<F> {
    /// Creates a new closure handler.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }

    /// Returns the handler name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<M, F> Handler<M> for FnHandler<F>
where
    M: Send + Sync,
    F: Fn(&M) -> EngineResult<()> + Send + Sync,
{
    async fn handle(&self, message: &M) -> EngineResult<()> {
        (self.func)(message)
    }
}
