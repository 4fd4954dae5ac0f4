/// Built-in consumers of the realtime channel
///
/// Each consumer is an ordinary listener registration: it filters the
/// fan-out stream for the message types it cares about and keeps a small
/// piece of UI-facing state. None of them has privileged access to the
/// transport, and each can attach and detach independently of the
/// others and of the connection lifecycle.
pub mod alerts;
pub mod badge;
pub mod feed;

pub use alerts::{Alert, AlertSurface};
pub use badge::UnreadBadge;
pub use feed::{ActivityFeed, FeedEntry, FeedEntryKind};
