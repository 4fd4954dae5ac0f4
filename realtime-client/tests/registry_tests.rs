//! Fan-out contract tests through the public service API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use realtime_client::consumers::{ActivityFeed, AlertSurface, UnreadBadge};
use realtime_client::{RealtimeConfig, RealtimeService, ServerMessage};

fn notification(text: &str) -> ServerMessage {
    ServerMessage::Notification {
        id: None,
        message: text.to_string(),
        category: None,
        created_at: None,
    }
}

#[tokio::test]
async fn test_panicking_listener_is_isolated_from_the_rest() {
    let service = RealtimeService::new(RealtimeConfig::default());

    let recorded = Arc::new(AtomicUsize::new(0));
    service.subscribe(|_| panic!("consumer bug"));
    let r = recorded.clone();
    service.subscribe(move |_| {
        r.fetch_add(1, Ordering::SeqCst);
    });

    service.registry().dispatch(&notification("delivered anyway"));
    assert_eq!(recorded.load(Ordering::SeqCst), 1);

    service.teardown();
}

#[tokio::test]
async fn test_messages_arrive_in_order_for_every_listener() {
    let service = RealtimeService::new(RealtimeConfig::default());

    let first = Arc::new(Mutex::new(Vec::new()));
    let second = Arc::new(Mutex::new(Vec::new()));

    for seen in [&first, &second] {
        let seen = seen.clone();
        service.subscribe(move |msg| {
            if let ServerMessage::Notification { message, .. } = msg {
                seen.lock().unwrap().push(message.clone());
            }
        });
    }

    service.registry().dispatch(&notification("M1"));
    service.registry().dispatch(&notification("M2"));

    assert_eq!(*first.lock().unwrap(), vec!["M1", "M2"]);
    assert_eq!(*second.lock().unwrap(), vec!["M1", "M2"]);

    service.teardown();
}

#[tokio::test]
async fn test_unsubscribe_is_idempotent_and_scoped() {
    let service = RealtimeService::new(RealtimeConfig::default());

    let kept = Arc::new(AtomicUsize::new(0));
    let k = kept.clone();
    let _keep = service.subscribe(move |_| {
        k.fetch_add(1, Ordering::SeqCst);
    });
    let gone = service.subscribe(|_| {});

    service.unsubscribe(gone);
    service.unsubscribe(gone);

    service.registry().dispatch(&notification("x"));
    assert_eq!(kept.load(Ordering::SeqCst), 1);

    // After teardown, stale handles stay harmless.
    service.teardown();
    service.unsubscribe(gone);

    service.registry().dispatch(&notification("y"));
    assert_eq!(kept.load(Ordering::SeqCst), 1);
}

/// The walkthrough from the product brief: snapshot seeds the badge, a
/// later notification reaches badge and feed independently.
#[tokio::test]
async fn test_badge_and_feed_consume_the_same_stream_independently() {
    let service = RealtimeService::new(RealtimeConfig::default());

    let badge = UnreadBadge::attach(service.registry());
    let feed = ActivityFeed::attach(service.registry());
    let alerts = AlertSurface::attach(service.registry());

    service.registry().dispatch(&ServerMessage::InitialData {
        unread_notifications: 3,
    });
    assert_eq!(badge.unread(), 3);
    assert!(feed.is_empty());

    service.registry().dispatch(&notification("Clocked in"));
    assert_eq!(badge.unread(), 4);
    assert_eq!(feed.len(), 1);
    assert_eq!(alerts.pending_count(), 1);

    // Detaching one consumer never affects the others.
    feed.detach(service.registry());
    service.registry().dispatch(&notification("Shift published"));
    assert_eq!(badge.unread(), 5);
    assert_eq!(feed.len(), 1);
    assert_eq!(alerts.pending_count(), 2);

    service.teardown();
}
