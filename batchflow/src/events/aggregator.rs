//! Typed in-process publish/subscribe.

use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{trace, warn};

/// Handle returned by [`EventAggregator::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type ErasedHandler = Arc<dyn Fn(&dyn Any) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    handler: ErasedHandler,
}

/// Routes messages to the handlers subscribed to their type.
///
/// Handlers run synchronously on the publishing thread. A panicking handler
/// is logged and does not stop delivery to the others.
#[derive(Default)]
pub struct EventAggregator {
    next_id: AtomicU64,
    subscribers: RwLock<HashMap<TypeId, Vec<Subscription>>>,
}

impl EventAggregator {
    /// Creates an aggregator with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a handler to messages of type `M`.
    pub fn subscribe<M, F>(&self, handler: F) -> SubscriptionId
    where
        M: Any + Send + Sync,
        F: Fn(&M) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handler: ErasedHandler = Arc::new(move |message: &dyn Any| {
            if let Some(message) = message.downcast_ref::<M>() {
                handler(message);
            }
        });

        self.subscribers
            .write()
            .entry(TypeId::of::<M>())
            .or_default()
            .push(Subscription { id, handler });

        trace!(subscription = %id, message_type = std::any::type_name::<M>(), "Subscribed");
        id
    }

    /// Removes a subscription. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        for subscriptions in subscribers.values_mut() {
            if let Some(pos) = subscriptions.iter().position(|s| s.id == id) {
                subscriptions.remove(pos);
                trace!(subscription = %id, "Unsubscribed");
                return true;
            }
        }
        false
    }

    /// Delivers a message to every subscriber of its type.
    ///
    /// Returns the number of handlers that completed without panicking.
    pub fn publish<M>(&self, message: &M) -> usize
    where
        M: Any + Send + Sync,
    {
        // Handlers run outside the lock so they may (un)subscribe.
        let handlers: Vec<ErasedHandler> = self
            .subscribers
            .read()
            .get(&TypeId::of::<M>())
            .map(|subs| subs.iter().map(|s| Arc::clone(&s.handler)).collect())
            .unwrap_or_default();

        handlers
            .iter()
            .filter(|handler| {
                let delivered = catch_unwind(AssertUnwindSafe(|| handler(message as &dyn Any)));
                if delivered.is_err() {
                    warn!(
                        message_type = std::any::type_name::<M>(),
                        "Event handler panicked"
                    );
                }
                delivered.is_ok()
            })
            .count()
    }

    /// Returns the number of subscribers for messages of type `M`.
    #[must_use]
    pub fn subscriber_count<M: Any>(&self) -> usize {
        self.subscribers
            .read()
            .get(&TypeId::of::<M>())
            .map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total: usize = self.subscribers.read().values().map(Vec::len).sum();
        f.debug_struct("EventAggregator")
            .field("subscriptions", &total)
            .finish_non_exhaustive()
    }
}
