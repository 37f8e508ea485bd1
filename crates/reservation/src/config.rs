//! Retry tuning loaded from environment variables.

use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 40;
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_millis(2);

/// Bounds of the optimistic retry loop.
///
/// Reads from environment variables:
/// - `INVENTORY_MAX_ATTEMPTS`: attempts per conditional update (default: `40`, minimum `1`)
/// - `INVENTORY_BACKOFF_MS`: base backoff in milliseconds (default: `2`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl RetryConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let max_attempts = std::env::var("INVENTORY_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_ATTEMPTS);
        let base_backoff = std::env::var("INVENTORY_BACKOFF_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_BASE_BACKOFF);

        Self::default()
            .with_max_attempts(max_attempts)
            .with_base_backoff(base_backoff)
    }

    /// Sets the attempt bound. Values below 1 are raised to 1.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_base_backoff(mut self, base_backoff: Duration) -> Self {
        self.base_backoff = base_backoff;
        self
    }

    /// Wait after the `attempt`-th consecutive conflict: `attempt × base_backoff`.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        self.base_backoff.saturating_mul(attempt)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: DEFAULT_BASE_BACKOFF,
        }
    }
}
