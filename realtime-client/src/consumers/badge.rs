/// Unread-count badge backing the notification bell
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::websocket::messages::ServerMessage;
use crate::websocket::registry::{SubscriptionId, SubscriptionRegistry};

/// Tracks the unread notification count: seeded from the `initial_data`
/// snapshot, incremented on every `notification`, reset when the user
/// opens the notification list.
pub struct UnreadBadge {
    count: Arc<AtomicU64>,
    subscription: SubscriptionId,
}

impl UnreadBadge {
    pub fn attach(registry: &SubscriptionRegistry) -> Self {
        let count = Arc::new(AtomicU64::new(0));

        let state = count.clone();
        let subscription = registry.subscribe(move |message| match message {
            ServerMessage::InitialData {
                unread_notifications,
            } => state.store(*unread_notifications, Ordering::SeqCst),
            ServerMessage::Notification { .. } => {
                state.fetch_add(1, Ordering::SeqCst);
            }
            _ => {}
        });

        Self {
            count,
            subscription,
        }
    }

    /// Current unread count.
    pub fn unread(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    /// The user opened the notification list; reset to zero.
    pub fn mark_all_read(&self) {
        self.count.store(0, Ordering::SeqCst);
    }

    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    /// Stop receiving updates. The counter keeps its last value.
    pub fn detach(&self, registry: &SubscriptionRegistry) {
        registry.unsubscribe(self.subscription);
    }
}
