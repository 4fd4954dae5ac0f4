/// Toast/alert surface fed by incoming notifications
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use crate::websocket::messages::ServerMessage;
use crate::websocket::registry::{SubscriptionId, SubscriptionRegistry};

/// Pending toasts are capped; a UI that never drains them should not
/// leak memory.
const MAX_PENDING_ALERTS: usize = 20;

/// One toast waiting to be shown.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub message: String,
    pub category: Option<String>,
}

/// Collects `notification` messages into a pending queue the UI drains
/// on its own cadence.
pub struct AlertSurface {
    pending: Arc<Mutex<VecDeque<Alert>>>,
    subscription: SubscriptionId,
}

impl AlertSurface {
    pub fn attach(registry: &SubscriptionRegistry) -> Self {
        let pending: Arc<Mutex<VecDeque<Alert>>> = Arc::new(Mutex::new(VecDeque::new()));

        let state = pending.clone();
        let subscription = registry.subscribe(move |message| {
            if let ServerMessage::Notification {
                message, category, ..
            } = message
            {
                let mut pending = state.lock().unwrap_or_else(PoisonError::into_inner);
                if pending.len() >= MAX_PENDING_ALERTS {
                    let _ = pending.pop_front();
                }
                pending.push_back(Alert {
                    message: message.clone(),
                    category: category.clone(),
                });
            }
        });

        Self {
            pending,
            subscription,
        }
    }

    /// Take every pending toast, oldest first, clearing the queue.
    pub fn drain(&self) -> Vec<Alert> {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    pub fn detach(&self, registry: &SubscriptionRegistry) {
        registry.unsubscribe(self.subscription);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(text: &str, category: Option<&str>) -> ServerMessage {
        ServerMessage::Notification {
            id: None,
            message: text.to_string(),
            category: category.map(str::to_string),
            created_at: None,
        }
    }

    #[test]
    fn test_alerts_collect_and_drain() {
        let registry = SubscriptionRegistry::new();
        let surface = AlertSurface::attach(&registry);

        registry.dispatch(&notification("Shift swapped", Some("scheduling")));
        registry.dispatch(&notification("Clocked in", None));
        assert_eq!(surface.pending_count(), 2);

        let drained = surface.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].message, "Shift swapped");
        assert_eq!(drained[0].category.as_deref(), Some("scheduling"));
        assert_eq!(surface.pending_count(), 0);
    }

    #[test]
    fn test_alerts_queue_is_capped() {
        let registry = SubscriptionRegistry::new();
        let surface = AlertSurface::attach(&registry);

        for i in 0..(MAX_PENDING_ALERTS + 5) {
            registry.dispatch(&notification(&format!("a{i}"), None));
        }

        assert_eq!(surface.pending_count(), MAX_PENDING_ALERTS);
        let drained = surface.drain();
        assert_eq!(drained.first().unwrap().message, "a5");
    }

    #[test]
    fn test_alerts_ignore_attendance_traffic() {
        let registry = SubscriptionRegistry::new();
        let surface = AlertSurface::attach(&registry);

        registry.dispatch(&ServerMessage::InitialData {
            unread_notifications: 2,
        });
        assert_eq!(surface.pending_count(), 0);
    }
}
