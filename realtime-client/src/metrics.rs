use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, TextEncoder};

use crate::websocket::ConnectionStatus;

static MESSAGES_RECEIVED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "realtime_client_messages_received_total",
            "Decoded messages received on the realtime channel",
        ),
        &["type"],
    )
    .expect("failed to create realtime_client_messages_received_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register realtime_client_messages_received_total");
    counter
});

static FRAMES_DISCARDED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "realtime_client_frames_discarded_total",
        "Inbound frames discarded because they failed to decode",
    )
    .expect("failed to create realtime_client_frames_discarded_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register realtime_client_frames_discarded_total");
    counter
});

static LISTENER_PANICS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "realtime_client_listener_panics_total",
        "Listener callbacks that panicked during dispatch",
    )
    .expect("failed to create realtime_client_listener_panics_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register realtime_client_listener_panics_total");
    counter
});

static RECONNECT_ATTEMPTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let counter = IntCounter::new(
        "realtime_client_reconnect_attempts_total",
        "Automatic reconnection attempts scheduled after unexpected closures",
    )
    .expect("failed to create realtime_client_reconnect_attempts_total");
    prometheus::default_registry()
        .register(Box::new(counter.clone()))
        .expect("failed to register realtime_client_reconnect_attempts_total");
    counter
});

static CONNECTION_STATUS: Lazy<IntGauge> = Lazy::new(|| {
    let gauge = IntGauge::new(
        "realtime_client_connection_status",
        "Current connection status (0=disconnected 1=connecting 2=connected 3=reconnecting 4=failed)",
    )
    .expect("failed to create realtime_client_connection_status");
    prometheus::default_registry()
        .register(Box::new(gauge.clone()))
        .expect("failed to register realtime_client_connection_status");
    gauge
});

pub fn observe_message(type_tag: &str) {
    MESSAGES_RECEIVED_TOTAL.with_label_values(&[type_tag]).inc();
}

pub fn observe_discarded_frame() {
    FRAMES_DISCARDED_TOTAL.inc();
}

pub fn observe_listener_panic() {
    LISTENER_PANICS_TOTAL.inc();
}

pub fn observe_reconnect_attempt() {
    RECONNECT_ATTEMPTS_TOTAL.inc();
}

pub fn set_connection_status(status: ConnectionStatus) {
    let value = match status {
        ConnectionStatus::Disconnected => 0,
        ConnectionStatus::Connecting => 1,
        ConnectionStatus::Connected => 2,
        ConnectionStatus::Reconnecting => 3,
        ConnectionStatus::Failed => 4,
    };
    CONNECTION_STATUS.set(value);
}

/// Render all registered metrics in the Prometheus text format.
///
/// The client renders nothing itself; embedding applications decide
/// whether and where to expose this.
pub fn export() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("failed to encode metrics: {}", err);
        return String::new();
    }

    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_contains_registered_families() {
        observe_message("notification");
        observe_discarded_frame();
        set_connection_status(ConnectionStatus::Connected);

        let rendered = export();
        assert!(rendered.contains("realtime_client_messages_received_total"));
        assert!(rendered.contains("realtime_client_frames_discarded_total"));
        assert!(rendered.contains("realtime_client_connection_status"));
    }
}
