//! Configuration module
//!
//! Reads a TOML file with `[lease]`, `[transport]` and `[logging]`
//! sections. Every field has a default so a missing file or a partial
//! file both work.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::shared::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LeaseConfig {
    pub lease: LeaseSettings,
    pub transport: TransportSettings,
    pub logging: LoggingSettings,
}

/// Countdown and refresh policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LeaseSettings {
    /// Remaining validity (seconds) at which the warning phase begins.
    pub warning_threshold_secs: u64,
    /// Validity window (seconds) requested on refresh.
    pub refresh_window_secs: u64,
    /// Countdown tick cadence in milliseconds.
    pub tick_interval_ms: u64,
}

impl Default for LeaseSettings {
    fn default() -> Self {
        Self {
            warning_threshold_secs: 300, // warn in the last 5 minutes
            refresh_window_secs: 900,    // 15-minute window per refresh
            tick_interval_ms: 1000,
        }
    }
}

impl LeaseSettings {
    pub fn warning_threshold(&self) -> Duration {
        Duration::from_secs(self.warning_threshold_secs)
    }

    pub fn refresh_window(&self) -> Duration {
        Duration::from_secs(self.refresh_window_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

/// Reservation API endpoint and retry policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Base URL of the reservation API.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Attempts (including the first) for read-style calls.
    pub fetch_max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub backoff_base_ms: u64,
    /// Cap on the retry delay, in milliseconds.
    pub backoff_max_ms: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            base_url: "https://parking.example.edu/api/v1".to_string(),
            request_timeout_secs: 10,
            fetch_max_attempts: 3,
            backoff_base_ms: 250,
            backoff_max_ms: 5000,
        }
    }
}

impl TransportSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Retry policy for read-style calls (fetch, artifact bytes).
    pub fn fetch_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.fetch_max_attempts,
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_millis(self.backoff_max_ms),
            jitter: true,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default tracing filter, overridable via `RUST_LOG`.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl LeaseConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// Initialize tracing with the configured level, unless `RUST_LOG`
    /// is set. Safe to call more than once.
    pub fn init_tracing(&self) {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&self.logging.level));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}

/// Default config file location: `$PARKPASS_LEASE_CONFIG`, else the
/// platform config dir, else the working directory.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("PARKPASS_LEASE_CONFIG") {
        return PathBuf::from(path);
    }
    dirs_next::config_dir()
        .map(|dir| dir.join("parkpass").join("lease.toml"))
        .unwrap_or_else(|| PathBuf::from("lease.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = LeaseConfig::default();
        assert_eq!(config.lease.warning_threshold(), Duration::from_secs(300));
        assert_eq!(config.lease.refresh_window(), Duration::from_secs(900));
        assert_eq!(config.lease.tick_interval(), Duration::from_millis(1000));
        assert_eq!(config.transport.fetch_max_attempts, 3);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: LeaseConfig = toml::from_str(
            r#"
            [lease]
            warning_threshold_secs = 120

            [transport]
            base_url = "https://parking.campus.test/api/v1"
            "#,
        )
        .unwrap();

        assert_eq!(config.lease.warning_threshold_secs, 120);
        assert_eq!(config.lease.refresh_window_secs, 900);
        assert_eq!(config.transport.base_url, "https://parking.campus.test/api/v1");
        assert_eq!(config.transport.request_timeout_secs, 10);
    }

    #[test]
    fn retry_policy_from_settings() {
        let settings = TransportSettings {
            fetch_max_attempts: 5,
            backoff_base_ms: 100,
            backoff_max_ms: 2000,
            ..TransportSettings::default()
        };
        let policy = settings.fetch_retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay, Duration::from_millis(100));
        assert_eq!(policy.max_delay, Duration::from_millis(2000));
    }
}
