/// Listener registry for realtime message fan-out
///
/// Decouples the connection task from arbitrarily many, independently
/// lived consumers. Every decoded inbound message is handed to every
/// registered listener, in registration order; a listener that panics is
/// isolated and never affects delivery to the others or the health of
/// the connection.
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::sync::Arc;

use crate::metrics;
use crate::websocket::messages::ServerMessage;

/// Callback invoked for every inbound message.
pub type Listener = Arc<dyn Fn(&ServerMessage) + Send + Sync>;

/// Revocable handle returned by [`SubscriptionRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Fan-out registry for inbound realtime messages.
///
/// Thread-safe; every operation takes `&self`. Dispatch snapshots the
/// listener set before iterating, so listeners may subscribe or
/// unsubscribe from inside their own callback without corrupting the
/// iteration.
pub struct SubscriptionRegistry {
    listeners: RwLock<Vec<(SubscriptionId, Listener)>>,
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener for every inbound message.
    ///
    /// Each call creates exactly one registration and returns a distinct
    /// handle; callers that re-subscribe across UI re-renders must pair
    /// each call with one [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe(
        &self,
        listener: impl Fn(&ServerMessage) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a registration.
    ///
    /// Safe to call multiple times, with a stale handle, or after the
    /// registry was cleared; all of those are no-ops.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(entry_id, _)| *entry_id != id);
    }

    /// Deliver a message to every currently registered listener.
    ///
    /// Listeners run synchronously on the calling thread, in registration
    /// order. A panicking listener is caught and logged; the remaining
    /// listeners still receive the message. Called by the connection task
    /// for each decoded frame; also useful for injecting messages in
    /// tests.
    pub fn dispatch(&self, message: &ServerMessage) {
        let snapshot: Vec<(SubscriptionId, Listener)> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (id, listener) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(message))).is_err() {
                metrics::observe_listener_panic();
                tracing::error!(
                    subscription = id.0,
                    message_type = message.type_tag(),
                    "listener panicked during dispatch; continuing with remaining listeners"
                );
            }
        }
    }

    /// Drop every registration. Handles issued before the clear become
    /// stale and unsubscribing them is a no-op.
    pub fn clear(&self) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of active registrations.
    pub fn len(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
