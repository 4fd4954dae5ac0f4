use dotenvy::dotenv;
use resilience::BackoffPolicy;
use std::env;
use std::time::Duration;

use crate::error::{RealtimeError, Result};

/// Configuration for the realtime notification channel.
///
/// `base_url` is the HTTP(S) origin of the attendance backend; the
/// WebSocket scheme is derived from it (`https` becomes `wss`, `http`
/// becomes `ws`).
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub base_url: String,
    pub notifications_path: String,
    /// Cadence of the application-level keep-alive ping
    pub keepalive_interval: Duration,
    /// Budget for a single WebSocket handshake
    pub connect_timeout: Duration,
    /// Delay schedule between reconnection attempts
    pub reconnect: BackoffPolicy,
    /// Automatic reconnection attempts before giving up
    pub max_reconnect_attempts: u32,
    /// Decoded messages retained for late diagnostic consumers
    pub history_capacity: usize,
    /// Close code the backend uses for revoked/expired credentials.
    /// A closure with this code parks the connection in `failed`
    /// immediately instead of running the backoff schedule.
    pub auth_revoked_close_code: u16,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            notifications_path: "/ws/notifications/".to_string(),
            keepalive_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            reconnect: BackoffPolicy::default(),
            max_reconnect_attempts: 5,
            history_capacity: 100,
            auth_revoked_close_code: 4008,
        }
    }
}

impl RealtimeConfig {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        let defaults = Self::default();

        let base_url =
            env::var("WORKPULSE_API_URL").unwrap_or_else(|_| defaults.base_url.clone());
        if !base_url.starts_with("http://")
            && !base_url.starts_with("https://")
            && !base_url.starts_with("ws://")
            && !base_url.starts_with("wss://")
        {
            return Err(RealtimeError::Config(format!(
                "WORKPULSE_API_URL has unsupported scheme: {base_url}"
            )));
        }

        let notifications_path = env::var("WORKPULSE_WS_PATH")
            .unwrap_or_else(|_| defaults.notifications_path.clone());

        let keepalive_interval = env::var("WORKPULSE_KEEPALIVE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.keepalive_interval);

        let connect_timeout = env::var("WORKPULSE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.connect_timeout);

        let reconnect = BackoffPolicy {
            initial: env::var("WORKPULSE_RECONNECT_BASE_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.reconnect.initial),
            max: env::var("WORKPULSE_RECONNECT_MAX_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.reconnect.max),
            ..defaults.reconnect.clone()
        };

        let max_reconnect_attempts = env::var("WORKPULSE_RECONNECT_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_reconnect_attempts);

        let history_capacity = env::var("WORKPULSE_HISTORY_CAPACITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.history_capacity);

        let auth_revoked_close_code = env::var("WORKPULSE_AUTH_CLOSE_CODE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.auth_revoked_close_code);

        Ok(Self {
            base_url,
            notifications_path,
            keepalive_interval,
            connect_timeout,
            reconnect,
            max_reconnect_attempts,
            history_capacity,
            auth_revoked_close_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_backend_contract() {
        let config = RealtimeConfig::default();
        assert_eq!(config.notifications_path, "/ws/notifications/");
        assert_eq!(config.keepalive_interval, Duration::from_secs(30));
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.history_capacity, 100);
        assert_eq!(config.reconnect.initial, Duration::from_millis(3000));
        assert_eq!(config.reconnect.max, Duration::from_millis(30_000));
    }
}
