use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RealtimeError>;

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing credential: the realtime channel requires a bearer token")]
    MissingCredential,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("connect timeout after {0:?}")]
    ConnectTimeout(Duration),

    #[error("connection task is not running")]
    TaskGone,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RealtimeError {
    /// Returns whether a fresh connection attempt may succeed without
    /// external intervention (e.g. a new credential).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RealtimeError::Transport(_) | RealtimeError::ConnectTimeout(_)
        )
    }
}
