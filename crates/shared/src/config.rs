//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    /// Retry policy for transient store failures.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Recompute pass configuration.
    #[serde(default)]
    pub recompute: RecomputeConfig,
}

/// Retry policy for append operations against the remote store.
///
/// Appends carry idempotency keys, so a retried write cannot duplicate a
/// transaction.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts per store write (including the first).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay between attempts, in milliseconds.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    50
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

/// Recompute pass configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RecomputeConfig {
    /// Soft bound on transactions replayed per pass.
    ///
    /// Replay is a full-history walk; histories beyond this bound still
    /// recompute but log a scale warning.
    #[serde(default = "default_soft_limit")]
    pub soft_limit: usize,
}

fn default_soft_limit() -> usize {
    10_000
}

impl Default for RecomputeConfig {
    fn default() -> Self {
        Self {
            soft_limit: default_soft_limit(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("TALLY").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.retry.backoff_ms, 50);
        assert_eq!(cfg.recompute.soft_limit, 10_000);
    }

    #[test]
    fn test_load_from_env() {
        temp_env::with_vars(
            [
                ("TALLY__RETRY__MAX_ATTEMPTS", Some("5")),
                ("TALLY__RECOMPUTE__SOFT_LIMIT", Some("250")),
            ],
            || {
                let cfg = AppConfig::load().expect("config should load");
                assert_eq!(cfg.retry.max_attempts, 5);
                assert_eq!(cfg.recompute.soft_limit, 250);
                assert_eq!(cfg.retry.backoff_ms, 50, "unset values keep defaults");
            },
        );
    }
}
