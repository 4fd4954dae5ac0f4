/// Live activity feed fed by the realtime channel
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use crate::websocket::messages::{AttendanceAction, ServerMessage};
use crate::websocket::registry::{SubscriptionId, SubscriptionRegistry};

const DEFAULT_FEED_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEntryKind {
    Notification,
    Attendance,
}

/// One row of the activity feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub kind: FeedEntryKind,
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Keeps a bounded, newest-last list of notification and attendance
/// activity for the dashboard feed.
pub struct ActivityFeed {
    entries: Arc<Mutex<VecDeque<FeedEntry>>>,
    subscription: SubscriptionId,
}

impl ActivityFeed {
    pub fn attach(registry: &SubscriptionRegistry) -> Self {
        Self::attach_with_capacity(registry, DEFAULT_FEED_CAPACITY)
    }

    pub fn attach_with_capacity(registry: &SubscriptionRegistry, capacity: usize) -> Self {
        let entries: Arc<Mutex<VecDeque<FeedEntry>>> = Arc::new(Mutex::new(VecDeque::new()));

        let state = entries.clone();
        let subscription = registry.subscribe(move |message| {
            let entry = match message {
                ServerMessage::Notification {
                    message,
                    created_at,
                    ..
                } => Some(FeedEntry {
                    kind: FeedEntryKind::Notification,
                    text: message.clone(),
                    timestamp: *created_at,
                }),
                ServerMessage::AttendanceUpdate {
                    employee_name,
                    action,
                    timestamp,
                    ..
                } => Some(FeedEntry {
                    kind: FeedEntryKind::Attendance,
                    text: format!("{} {}", employee_name, describe_action(*action)),
                    timestamp: *timestamp,
                }),
                _ => None,
            };

            if let Some(entry) = entry {
                let mut entries = state.lock().unwrap_or_else(PoisonError::into_inner);
                if capacity > 0 && entries.len() >= capacity {
                    let _ = entries.pop_front();
                }
                entries.push_back(entry);
            }
        });

        Self {
            entries,
            subscription,
        }
    }

    /// Current feed contents, oldest first.
    pub fn entries(&self) -> Vec<FeedEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    pub fn detach(&self, registry: &SubscriptionRegistry) {
        registry.unsubscribe(self.subscription);
    }
}

fn describe_action(action: AttendanceAction) -> &'static str {
    match action {
        AttendanceAction::ClockIn => "clocked in",
        AttendanceAction::ClockOut => "clocked out",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(text: &str) -> ServerMessage {
        ServerMessage::Notification {
            id: None,
            message: text.to_string(),
            category: None,
            created_at: None,
        }
    }

    fn clock_event(name: &str, action: AttendanceAction) -> ServerMessage {
        ServerMessage::AttendanceUpdate {
            employee_name: name.to_string(),
            employee_id: None,
            action,
            timestamp: None,
        }
    }

    #[test]
    fn test_feed_records_notifications_and_attendance() {
        let registry = SubscriptionRegistry::new();
        let feed = ActivityFeed::attach(&registry);

        registry.dispatch(&notification("Leave request approved"));
        registry.dispatch(&clock_event("Dana Reyes", AttendanceAction::ClockIn));

        let entries = feed.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, FeedEntryKind::Notification);
        assert_eq!(entries[0].text, "Leave request approved");
        assert_eq!(entries[1].kind, FeedEntryKind::Attendance);
        assert_eq!(entries[1].text, "Dana Reyes clocked in");
    }

    #[test]
    fn test_feed_ignores_keepalive_traffic() {
        let registry = SubscriptionRegistry::new();
        let feed = ActivityFeed::attach(&registry);

        registry.dispatch(&ServerMessage::Ping { timestamp: 1 });
        registry.dispatch(&ServerMessage::InitialData {
            unread_notifications: 9,
        });

        assert!(feed.is_empty());
    }

    #[test]
    fn test_feed_is_bounded_and_drops_oldest() {
        let registry = SubscriptionRegistry::new();
        let feed = ActivityFeed::attach_with_capacity(&registry, 3);

        for i in 0..5 {
            registry.dispatch(&notification(&format!("n{i}")));
        }

        let texts: Vec<String> = feed.entries().into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["n2", "n3", "n4"]);
    }

    #[test]
    fn test_two_feeds_receive_independently() {
        let registry = SubscriptionRegistry::new();
        let first = ActivityFeed::attach(&registry);
        let second = ActivityFeed::attach(&registry);

        registry.dispatch(&clock_event("Ben Ito", AttendanceAction::ClockOut));
        first.detach(&registry);
        registry.dispatch(&clock_event("Ben Ito", AttendanceAction::ClockIn));

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 2);
    }
}
