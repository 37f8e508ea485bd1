//! Stress run configuration loaded from environment variables.

use reservation::RetryConfig;

/// Shape of a stress run.
///
/// Reads from environment variables:
/// - `STRESS_WORKERS`: concurrent workers (default: `32`)
/// - `STRESS_ITERATIONS`: single-unit reservations per worker (default: `20`)
/// - `STRESS_SKUS`: SKUs the workers spread over (default: `1`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
///
/// Retry tuning comes from [`RetryConfig::from_env`].
#[derive(Debug, Clone)]
pub struct Config {
    pub workers: u32,
    pub iterations: u32,
    pub skus: u32,
    pub log_level: String,
    pub retry: RetryConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            workers: env_count("STRESS_WORKERS").unwrap_or(32),
            iterations: env_count("STRESS_ITERATIONS").unwrap_or(20),
            skus: env_count("STRESS_SKUS").unwrap_or(1),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            retry: RetryConfig::from_env(),
        }
    }

    /// Units each SKU starts with: enough for every reservation that can land on it.
    pub fn units_per_sku(&self) -> u32 {
        let reservations = self.workers.saturating_mul(self.iterations);
        reservations.div_ceil(self.skus.max(1))
    }
}

fn env_count(key: &str) -> Option<u32> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|n| *n > 0)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workers: 32,
            iterations: 20,
            skus: 1,
            log_level: "info".to_string(),
            retry: RetryConfig::default(),
        }
    }
}
