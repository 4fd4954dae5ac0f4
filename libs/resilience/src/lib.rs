/// Resilience helpers for long-lived client connections
///
/// This library provides the small building blocks the realtime client
/// uses to recover from transport failures:
/// - **Backoff**: deterministic exponential delay schedule with an upper
///   cap and optional jitter
/// - **Timeout**: time limits on connection attempts
pub mod backoff;
pub mod timeout;

// Re-export main types for convenience
pub use backoff::BackoffPolicy;
pub use timeout::{with_timeout, Elapsed};
