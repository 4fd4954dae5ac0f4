/// Message envelopes for the realtime notification channel
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inbound messages pushed by the attendance backend.
///
/// Every frame is a JSON object with a `type` discriminant; fields beyond
/// the discriminant are variant-specific. Unknown discriminants fail to
/// decode and are discarded by the connection task without affecting the
/// channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Unread-count snapshot sent right after the socket opens
    InitialData { unread_notifications: u64 },

    /// A new notification for the connected employee
    Notification {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<Uuid>,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        category: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        created_at: Option<DateTime<Utc>>,
    },

    /// An employee clocked in or out
    AttendanceUpdate {
        employee_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        employee_id: Option<Uuid>,
        action: AttendanceAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<DateTime<Utc>>,
    },

    /// Keep-alive from the server
    Ping { timestamp: i64 },

    /// Keep-alive reply from the server
    Pong { timestamp: i64 },
}

/// Clock action carried by an attendance update.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceAction {
    ClockIn,
    ClockOut,
}

impl ServerMessage {
    /// The wire discriminant of this message.
    pub fn type_tag(&self) -> &'static str {
        match self {
            ServerMessage::InitialData { .. } => "initial_data",
            ServerMessage::Notification { .. } => "notification",
            ServerMessage::AttendanceUpdate { .. } => "attendance_update",
            ServerMessage::Ping { .. } => "ping",
            ServerMessage::Pong { .. } => "pong",
        }
    }

    /// Deserialize from a JSON frame
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Outbound messages defined by the channel itself.
///
/// Higher layers may send their own payloads through
/// `RealtimeService::send_message`; the channel only ever originates
/// keep-alive pings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Keep-alive ping, sent every keep-alive interval
    Ping { timestamp: i64 },
}

impl ClientMessage {
    /// Create a ping message stamped with the current time
    pub fn ping() -> Self {
        ClientMessage::Ping {
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Serialize to a JSON frame
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
