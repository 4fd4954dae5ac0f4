/// Exponential backoff schedule for reconnection attempts
use rand::Rng;
use std::time::Duration;

/// Delay schedule between successive reconnection attempts.
///
/// The n-th attempt (1-based) waits `initial × multiplier^(n−1)`, capped
/// at `max`. With `jitter` enabled the computed delay is randomized by
/// ±30% to avoid thundering-herd reconnects against a recovering server.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Delay before the first retry
    pub initial: Duration,
    /// Upper bound for any computed delay
    pub max: Duration,
    /// Growth factor between attempts
    pub multiplier: f64,
    /// Randomize each delay by ±30%
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(3000),
            max: Duration::from_millis(30_000),
            multiplier: 2.0,
            jitter: false,
        }
    }
}

impl BackoffPolicy {
    /// Deterministic delay for the given 1-based attempt number.
    ///
    /// Attempt 0 is treated as attempt 1. Jitter is not applied here;
    /// use [`BackoffPolicy::next_delay`] for the randomized value.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let base_ms = self.initial.as_millis() as f64;
        let raw_ms = base_ms * self.multiplier.powi(exponent as i32);
        let capped_ms = raw_ms.min(self.max.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }

    /// Delay for the given attempt with jitter applied when enabled.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let base = self.delay_for(attempt);
        if self.jitter {
            let mut rng = rand::thread_rng();
            let factor = 1.0 + rng.gen_range(-0.3..0.3);
            Duration::from_millis((base.as_millis() as f64 * factor) as u64)
        } else {
            base
        }
    }

    /// The full deterministic schedule for `attempts` retries.
    pub fn schedule(&self, attempts: u32) -> Vec<Duration> {
        (1..=attempts).map(|n| self.delay_for(n)).collect()
    }
}
