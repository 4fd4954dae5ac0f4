pub mod config;
pub mod consumers;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod websocket;

pub use config::RealtimeConfig;
pub use resilience::BackoffPolicy;
pub use error::{RealtimeError, Result};
pub use websocket::{
    global, init_global, teardown_global, AttendanceAction, ClientMessage, ConnectionManager,
    ConnectionStatus, RealtimeService, ServerMessage, SubscriptionId, SubscriptionRegistry,
};
