/// Process-wide realtime service
///
/// Wraps the [`ConnectionManager`] and [`SubscriptionRegistry`] into one
/// service with an explicit lifecycle: created when a credential becomes
/// available, torn down when the session ends. The rest of the
/// application only ever touches the subscribe/send contract, never the
/// transport itself.
use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;

use crate::config::RealtimeConfig;
use crate::error::Result;
use crate::websocket::connection::{ConnectionManager, ConnectionStatus};
use crate::websocket::messages::ServerMessage;
use crate::websocket::registry::{SubscriptionId, SubscriptionRegistry};

pub struct RealtimeService {
    manager: ConnectionManager,
    registry: Arc<SubscriptionRegistry>,
}

impl RealtimeService {
    /// Create the service without a credential; no transport is opened
    /// until [`set_credential`](Self::set_credential) supplies one.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: RealtimeConfig) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new());
        let manager = ConnectionManager::new(config, registry.clone());
        Self { manager, registry }
    }

    /// Create the service and connect immediately with `token`.
    pub fn with_credential(config: RealtimeConfig, token: &str) -> Result<Self> {
        let service = Self::new(config);
        service.manager.connect(token)?;
        Ok(service)
    }

    /// Supply a (new) credential: tears down any existing transport and
    /// reconnects with the new token, resetting the attempt budget. This
    /// is also the way out of the `failed` state.
    pub fn set_credential(&self, token: &str) -> Result<()> {
        self.manager.connect(token)
    }

    /// Credential went away (logout, expiry without refresh): tear down
    /// the transport and stay offline until a new credential arrives.
    pub fn clear_credential(&self) {
        self.manager.disconnect();
    }

    /// Register a listener for every inbound message. Consumers filter
    /// for the message types they care about inside the callback.
    pub fn subscribe(
        &self,
        listener: impl Fn(&ServerMessage) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.registry.subscribe(listener)
    }

    /// Revoke a listener registration; idempotent.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.registry.unsubscribe(id);
    }

    /// Send an application-defined payload over the channel. Returns
    /// `false` while offline; nothing is queued.
    pub async fn send_message<T: Serialize>(&self, payload: &T) -> bool {
        self.manager.send_message(payload).await
    }

    pub fn status(&self) -> ConnectionStatus {
        self.manager.status()
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.manager.watch_status()
    }

    pub fn is_connected(&self) -> bool {
        self.manager.is_connected()
    }

    /// Bounded buffer of recently decoded messages, oldest first.
    pub fn recent_messages(&self) -> Vec<ServerMessage> {
        self.manager.recent_messages()
    }

    pub fn last_error(&self) -> Option<String> {
        self.manager.last_error()
    }

    /// The fan-out registry backing this service. Exposed for consumer
    /// adapters and tests; the transport itself stays private.
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// End the session: close the transport, stop the connection task
    /// and drop every listener registration.
    pub fn teardown(&self) {
        self.manager.disconnect();
        self.manager.shutdown();
        self.registry.clear();
    }
}

// ── Process-wide instance ───────────────────────────────────────────────

static GLOBAL: Lazy<RwLock<Option<Arc<RealtimeService>>>> = Lazy::new(|| RwLock::new(None));

/// Install the process-wide service, replacing (and tearing down) any
/// previous one. Connects immediately when `token` is given.
pub fn init_global(config: RealtimeConfig, token: Option<&str>) -> Result<Arc<RealtimeService>> {
    let service = match token {
        Some(token) => Arc::new(RealtimeService::with_credential(config, token)?),
        None => Arc::new(RealtimeService::new(config)),
    };

    let previous = GLOBAL
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(service.clone());
    if let Some(previous) = previous {
        previous.teardown();
    }

    Ok(service)
}

/// The currently installed process-wide service, if any.
pub fn global() -> Option<Arc<RealtimeService>> {
    GLOBAL
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Tear down and remove the process-wide service. Safe to call when none
/// is installed.
pub fn teardown_global() {
    let removed = GLOBAL
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    if let Some(service) = removed {
        service.teardown();
    }
}
