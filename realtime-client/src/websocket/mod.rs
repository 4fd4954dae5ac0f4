/// Realtime channel: one shared WebSocket, many independent consumers
pub mod connection;
pub mod messages;
pub mod registry;
pub mod service;

pub use connection::{ConnectionManager, ConnectionStatus};
pub use messages::{AttendanceAction, ClientMessage, ServerMessage};
pub use registry::{Listener, SubscriptionId, SubscriptionRegistry};
pub use service::{global, init_global, teardown_global, RealtimeService};
