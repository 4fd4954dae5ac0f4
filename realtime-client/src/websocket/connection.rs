/// WebSocket connection manager for the realtime channel
///
/// Owns the single transport to the attendance backend and keeps it
/// healthy: connect, intentional disconnect, automatic reconnection with
/// exponential backoff, keep-alive pings, and inbound frame decoding.
/// Decoded messages are appended to a bounded history and fanned out
/// through the [`SubscriptionRegistry`].
///
/// All transport I/O happens on one background task; the public handle
/// posts commands to it and returns without blocking, so callers observe
/// outcomes through the status value and dispatched messages.
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::config::RealtimeConfig;
use crate::error::{RealtimeError, Result};
use crate::metrics;
use crate::websocket::messages::{ClientMessage, ServerMessage};
use crate::websocket::registry::SubscriptionRegistry;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close codes that mark a closure as intentional; neither triggers
/// reconnection.
const NORMAL_CLOSURE: u16 = 1000;
const GOING_AWAY: u16 = 1001;

/// Connection lifecycle state, surfaced to consumers instead of errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Reconnecting => "reconnecting",
            ConnectionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commands posted from the public handle to the connection task.
enum Command {
    /// Open a transport with the given credential, tearing down any
    /// existing one first. Resets the reconnect attempt counter.
    Connect { token: String },
    /// Intentional teardown; suppresses automatic reconnection.
    Disconnect,
    /// Write one serialized frame if the transport is open.
    Send {
        frame: String,
        result_tx: oneshot::Sender<bool>,
    },
    /// Stop the task entirely.
    Shutdown,
}

/// Public handle to the single realtime transport.
///
/// Cheap to share behind an `Arc`; the transport itself lives on the
/// background task and is never exposed.
pub struct ConnectionManager {
    cmd_tx: mpsc::UnboundedSender<Command>,
    status_rx: watch::Receiver<ConnectionStatus>,
    history: Arc<Mutex<VecDeque<ServerMessage>>>,
    last_error: Arc<Mutex<Option<String>>>,
    _task: JoinHandle<()>,
}

impl ConnectionManager {
    /// Spawn the connection task in the disconnected state.
    ///
    /// Must be called from within a tokio runtime. No transport is opened
    /// until [`connect`](Self::connect) supplies a credential.
    pub fn new(config: RealtimeConfig, registry: Arc<SubscriptionRegistry>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        let history = Arc::new(Mutex::new(VecDeque::new()));
        let last_error = Arc::new(Mutex::new(None));

        let task = ConnectionTask {
            config,
            registry,
            history: history.clone(),
            last_error: last_error.clone(),
            status_tx,
            cmd_rx,
            token: None,
            attempts: 0,
        };
        let handle = tokio::spawn(task.run());

        Self {
            cmd_tx,
            status_rx,
            history,
            last_error,
            _task: handle,
        }
    }

    /// Open (or re-open) the transport with the given credential.
    ///
    /// Returns immediately; progress is observable through
    /// [`status`](Self::status). Any existing transport is closed before
    /// the new one opens, and the reconnect attempt budget is reset.
    pub fn connect(&self, token: &str) -> Result<()> {
        if token.trim().is_empty() {
            return Err(RealtimeError::MissingCredential);
        }
        self.cmd_tx
            .send(Command::Connect {
                token: token.to_string(),
            })
            .map_err(|_| RealtimeError::TaskGone)
    }

    /// Intentionally tear down the transport.
    ///
    /// Cancels any pending reconnect and the keep-alive timer, closes the
    /// socket with a normal-closure code, and suppresses automatic
    /// reconnection. A no-op when already disconnected.
    pub fn disconnect(&self) {
        let _ = self.cmd_tx.send(Command::Disconnect);
    }

    /// Serialize `payload` and write it to the transport.
    ///
    /// Returns `false` when the transport is not currently open or the
    /// write fails; nothing is queued or retried. Callers treat `false`
    /// as "currently offline" and drop or defer at their own layer.
    pub async fn send_message<T: Serialize>(&self, payload: &T) -> bool {
        let frame = match serde_json::to_string(payload) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("refusing to send unserializable payload: {}", e);
                return false;
            }
        };

        let (result_tx, result_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Command::Send { frame, result_tx })
            .is_err()
        {
            return false;
        }
        result_rx.await.unwrap_or(false)
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Watch stream of status changes, for surfaces that render a
    /// connectivity indicator.
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// The most recent decoded messages (bounded, oldest first).
    pub fn recent_messages(&self) -> Vec<ServerMessage> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Description of the last transport-level failure, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stop the background task. Used by service teardown; afterwards the
    /// manager only returns offline results.
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(Command::Shutdown);
    }
}

// ── Background connection task ──────────────────────────────────────────

/// Why the connected loop handed control back.
enum Drive {
    /// Shutdown command or all handles dropped.
    Shutdown,
    /// Intentional closure (client `disconnect()` or server 1000/1001).
    Intentional,
    /// The backend closed with the credential-revoked code.
    AuthRevoked,
    /// Unexpected closure; run the reconnect schedule.
    Lost,
    /// `connect()` arrived with a fresh credential; retry immediately.
    Restart,
}

/// Outcome of waiting out a backoff delay.
enum Wait {
    Proceed,
    Restart,
    Cancelled,
    Shutdown,
}

enum SessionExit {
    Shutdown,
    ToIdle,
}

struct ConnectionTask {
    config: RealtimeConfig,
    registry: Arc<SubscriptionRegistry>,
    history: Arc<Mutex<VecDeque<ServerMessage>>>,
    last_error: Arc<Mutex<Option<String>>>,
    status_tx: watch::Sender<ConnectionStatus>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
    token: Option<String>,
    attempts: u32,
}

impl ConnectionTask {
    async fn run(mut self) {
        // Idle until a credential arrives; each session returns here
        // after an intentional disconnect or a terminal failure.
        loop {
            match self.cmd_rx.recv().await {
                None | Some(Command::Shutdown) => return,
                Some(Command::Disconnect) => {
                    // Idempotent teardown; also clears a `failed` status.
                    self.set_status(ConnectionStatus::Disconnected);
                }
                Some(Command::Send { result_tx, .. }) => {
                    let _ = result_tx.send(false);
                }
                Some(Command::Connect { token }) => {
                    self.token = Some(token);
                    self.attempts = 0;
                    if matches!(self.run_session().await, SessionExit::Shutdown) {
                        return;
                    }
                }
            }
        }
    }

    /// One connect/reconnect cycle: attempt, drive, schedule, repeat.
    async fn run_session(&mut self) -> SessionExit {
        loop {
            self.set_status(if self.attempts == 0 {
                ConnectionStatus::Connecting
            } else {
                ConnectionStatus::Reconnecting
            });

            let url = match self.build_url() {
                Ok(url) => url,
                Err(e) => {
                    self.record_error(&e);
                    tracing::error!("cannot build notification endpoint url: {}", e);
                    self.set_status(ConnectionStatus::Failed);
                    return SessionExit::ToIdle;
                }
            };

            match establish(&url, self.config.connect_timeout).await {
                Ok(ws) => {
                    self.attempts = 0;
                    self.set_status(ConnectionStatus::Connected);
                    tracing::info!(
                        endpoint = %redact_endpoint(&url),
                        "realtime channel connected"
                    );

                    match self.drive(ws).await {
                        Drive::Shutdown => return SessionExit::Shutdown,
                        Drive::Intentional => {
                            self.set_status(ConnectionStatus::Disconnected);
                            return SessionExit::ToIdle;
                        }
                        Drive::AuthRevoked => {
                            tracing::warn!(
                                "backend rejected the credential; waiting for a fresh token"
                            );
                            self.set_status(ConnectionStatus::Failed);
                            return SessionExit::ToIdle;
                        }
                        Drive::Restart => {
                            self.attempts = 0;
                            continue;
                        }
                        Drive::Lost => {}
                    }
                }
                Err(e) => {
                    tracing::warn!("connection attempt failed: {}", e);
                    self.record_error(&e);
                }
            }

            // Unexpected closure or failed attempt: consume the budget.
            if self.attempts >= self.config.max_reconnect_attempts {
                tracing::warn!(
                    attempts = self.attempts,
                    "max reconnection attempts reached; giving up until a new connect"
                );
                self.set_status(ConnectionStatus::Failed);
                return SessionExit::ToIdle;
            }

            self.attempts += 1;
            metrics::observe_reconnect_attempt();
            let delay = self.config.reconnect.next_delay(self.attempts);
            self.set_status(ConnectionStatus::Reconnecting);
            tracing::info!(
                attempt = self.attempts,
                delay_ms = delay.as_millis() as u64,
                "scheduling reconnect"
            );

            match self.wait_backoff(delay).await {
                Wait::Proceed => {}
                Wait::Restart => self.attempts = 0,
                Wait::Cancelled => {
                    self.set_status(ConnectionStatus::Disconnected);
                    return SessionExit::ToIdle;
                }
                Wait::Shutdown => return SessionExit::Shutdown,
            }
        }
    }

    /// Multiplex the open transport: commands, keep-alive, inbound frames.
    async fn drive(&mut self, mut ws: WsStream) -> Drive {
        let mut keepalive = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.keepalive_interval,
            self.config.keepalive_interval,
        );

        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    None | Some(Command::Shutdown) => {
                        let _ = ws.close(Some(client_close_frame())).await;
                        return Drive::Shutdown;
                    }
                    Some(Command::Disconnect) => {
                        let _ = ws.close(Some(client_close_frame())).await;
                        return Drive::Intentional;
                    }
                    Some(Command::Connect { token }) => {
                        // Fresh credential: tear this transport down before
                        // the next one opens, so at most one is ever live.
                        self.token = Some(token);
                        let _ = ws.close(Some(client_close_frame())).await;
                        return Drive::Restart;
                    }
                    Some(Command::Send { frame, result_tx }) => {
                        let sent = ws.send(Message::Text(frame.into())).await.is_ok();
                        if !sent {
                            tracing::warn!("outbound send failed; transport is going down");
                        }
                        let _ = result_tx.send(sent);
                    }
                },

                _ = keepalive.tick() => {
                    match ClientMessage::ping().to_json() {
                        Ok(frame) => {
                            if let Err(e) = ws.send(Message::Text(frame.into())).await {
                                self.record_error(&RealtimeError::Transport(e.to_string()));
                                tracing::warn!("keepalive ping failed: {}", e);
                                return Drive::Lost;
                            }
                            tracing::debug!("keepalive ping sent");
                        }
                        Err(e) => tracing::warn!("failed to serialize keepalive ping: {}", e),
                    }
                },

                frame = ws.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.handle_frame(text.as_str()),
                    Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                        Ok(text) => self.handle_frame(text),
                        Err(_) => {
                            metrics::observe_discarded_frame();
                            tracing::warn!(
                                "discarding non-utf8 binary frame ({} bytes)",
                                data.len()
                            );
                        }
                    },
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = ws.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        tracing::debug!("transport pong received");
                    }
                    Some(Ok(Message::Close(close))) => {
                        let code = close.as_ref().map(|f| u16::from(f.code));
                        return self.classify_closure(code);
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        // The read error is the closure signal here; there is
                        // no separate close event to double-schedule from.
                        self.record_error(&RealtimeError::Transport(e.to_string()));
                        tracing::warn!("transport error: {}", e);
                        return Drive::Lost;
                    }
                    None => {
                        self.record_error(&RealtimeError::Transport(
                            "stream ended".to_string(),
                        ));
                        return Drive::Lost;
                    }
                },
            }
        }
    }

    /// Map a close code onto the reconnect decision.
    fn classify_closure(&self, code: Option<u16>) -> Drive {
        match code {
            Some(NORMAL_CLOSURE) | Some(GOING_AWAY) => {
                tracing::info!(code = ?code, "server closed the channel normally");
                Drive::Intentional
            }
            Some(code) if code == self.config.auth_revoked_close_code => {
                self.record_error(&RealtimeError::Transport(format!(
                    "credential rejected (close code {code})"
                )));
                Drive::AuthRevoked
            }
            _ => {
                self.record_error(&RealtimeError::Transport(format!(
                    "connection closed unexpectedly (code {})",
                    code.map(|c| c.to_string()).unwrap_or_else(|| "none".into())
                )));
                tracing::warn!(code = ?code, "connection closed unexpectedly");
                Drive::Lost
            }
        }
    }

    /// Decode one inbound frame; decode failures are logged and dropped
    /// without affecting the connection or other messages.
    fn handle_frame(&self, text: &str) {
        match ServerMessage::from_json(text) {
            Ok(message) => {
                metrics::observe_message(message.type_tag());
                if self.config.history_capacity > 0 {
                    let mut history = self
                        .history
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner);
                    if history.len() >= self.config.history_capacity {
                        let _ = history.pop_front();
                    }
                    history.push_back(message.clone());
                }
                self.registry.dispatch(&message);
            }
            Err(e) => {
                metrics::observe_discarded_frame();
                tracing::warn!("discarding undecodable frame: {}", e);
            }
        }
    }

    /// Sleep out a reconnect delay while still honoring commands.
    async fn wait_backoff(&mut self, delay: Duration) -> Wait {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return Wait::Proceed,
                cmd = self.cmd_rx.recv() => match cmd {
                    None | Some(Command::Shutdown) => return Wait::Shutdown,
                    Some(Command::Disconnect) => return Wait::Cancelled,
                    Some(Command::Connect { token }) => {
                        self.token = Some(token);
                        return Wait::Restart;
                    }
                    Some(Command::Send { result_tx, .. }) => {
                        let _ = result_tx.send(false);
                    }
                },
            }
        }
    }

    fn build_url(&self) -> Result<String> {
        let token = self.token.as_deref().ok_or(RealtimeError::MissingCredential)?;
        resolve_ws_url(
            &self.config.base_url,
            &self.config.notifications_path,
            token,
        )
    }

    fn set_status(&self, status: ConnectionStatus) {
        let _ = self.status_tx.send_replace(status);
        metrics::set_connection_status(status);
    }

    fn record_error(&self, error: &RealtimeError) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error.to_string());
    }
}

/// Open the WebSocket within the configured handshake budget.
async fn establish(url: &str, timeout: Duration) -> Result<WsStream> {
    match resilience::with_timeout(timeout, connect_async(url)).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(e)) => Err(RealtimeError::Transport(e.to_string())),
        Err(_) => Err(RealtimeError::ConnectTimeout(timeout)),
    }
}

fn client_close_frame() -> CloseFrame {
    CloseFrame {
        code: CloseCode::Normal,
        reason: "client teardown".into(),
    }
}

/// Derive the notification endpoint from the configured origin.
///
/// `https` maps to `wss` and `http` to `ws`; explicit `ws`/`wss` origins
/// pass through. The credential rides in the query string, so the full
/// url must never be logged; see [`redact_endpoint`].
fn resolve_ws_url(base_url: &str, path: &str, token: &str) -> Result<String> {
    let trimmed = base_url.trim_end_matches('/');
    let origin = if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
        trimmed.to_string()
    } else {
        return Err(RealtimeError::Config(format!(
            "unsupported scheme in base url: {base_url}"
        )));
    };

    Ok(format!(
        "{origin}{path}?token={}",
        urlencoding::encode(token)
    ))
}

/// Strip the query string (which carries the credential) for log output.
fn redact_endpoint(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_ws_url_maps_schemes() {
        let url = resolve_ws_url("https://hr.example.com", "/ws/notifications/", "tok").unwrap();
        assert_eq!(url, "wss://hr.example.com/ws/notifications/?token=tok");

        let url = resolve_ws_url("http://localhost:8000", "/ws/notifications/", "tok").unwrap();
        assert_eq!(url, "ws://localhost:8000/ws/notifications/?token=tok");
    }

    #[test]
    fn test_resolve_ws_url_passes_ws_schemes_through() {
        let url = resolve_ws_url("wss://hr.example.com/", "/ws/notifications/", "tok").unwrap();
        assert_eq!(url, "wss://hr.example.com/ws/notifications/?token=tok");
    }

    #[test]
    fn test_resolve_ws_url_encodes_token() {
        let url =
            resolve_ws_url("http://localhost", "/ws/notifications/", "a b+c&d=e").unwrap();
        assert!(url.ends_with("?token=a%20b%2Bc%26d%3De"));
    }

    #[test]
    fn test_resolve_ws_url_rejects_unknown_scheme() {
        let result = resolve_ws_url("ftp://example.com", "/ws/notifications/", "tok");
        assert!(matches!(result, Err(RealtimeError::Config(_))));
    }

    #[test]
    fn test_redact_endpoint_strips_credential() {
        assert_eq!(
            redact_endpoint("wss://h/ws/notifications/?token=secret"),
            "wss://h/ws/notifications/"
        );
        assert_eq!(redact_endpoint("wss://h/ws/"), "wss://h/ws/");
    }

    #[test]
    fn test_default_reconnect_schedule_matches_backend_contract() {
        let config = RealtimeConfig::default();
        let delays: Vec<u64> = (1..=config.max_reconnect_attempts)
            .map(|n| config.reconnect.next_delay(n).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![3000, 6000, 12_000, 24_000, 30_000]);
    }

    #[test]
    fn test_status_display_values() {
        assert_eq!(ConnectionStatus::Disconnected.to_string(), "disconnected");
        assert_eq!(ConnectionStatus::Reconnecting.to_string(), "reconnecting");
        assert_eq!(ConnectionStatus::Failed.to_string(), "failed");
    }

    #[tokio::test]
    async fn test_connect_requires_credential() {
        let manager = ConnectionManager::new(
            RealtimeConfig::default(),
            Arc::new(SubscriptionRegistry::new()),
        );
        assert!(matches!(
            manager.connect(""),
            Err(RealtimeError::MissingCredential)
        ));
        assert!(matches!(
            manager.connect("   "),
            Err(RealtimeError::MissingCredential)
        ));
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_send_while_disconnected_returns_false() {
        let manager = ConnectionManager::new(
            RealtimeConfig::default(),
            Arc::new(SubscriptionRegistry::new()),
        );
        let sent = manager.send_message(&ClientMessage::ping()).await;
        assert!(!sent);
    }

    #[tokio::test]
    async fn test_disconnect_when_disconnected_is_noop() {
        let manager = ConnectionManager::new(
            RealtimeConfig::default(),
            Arc::new(SubscriptionRegistry::new()),
        );
        manager.disconnect();
        manager.disconnect();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(manager.status(), ConnectionStatus::Disconnected);
    }
}
