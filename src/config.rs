//! Configuration management for Turnstile.
//!
//! Configuration is read from an optional YAML file and then overridden by
//! environment variables prefixed with `TURNSTILE__`, using `__` as the
//! section separator (for example `TURNSTILE__RATE_LIMITING__BURST_LIMIT=20`).

use config::{Config, Environment, File, FileFormat, Map};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, TurnstileError};
use crate::ratelimit::Limits;

/// Main configuration for the Turnstile service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnstileConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Largest accepted request body in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Value of the `Retry-After` header on rejected requests, in seconds
    #[serde(default = "default_retry_after")]
    pub retry_after_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            max_body_bytes: default_max_body_bytes(),
            retry_after_secs: default_retry_after(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

fn default_max_body_bytes() -> usize {
    64 * 1024
}

fn default_retry_after() -> u64 {
    60
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Admitted requests allowed per sustained window
    #[serde(default = "default_rate_limit")]
    pub rate_limit: usize,

    /// Admitted requests allowed per burst window
    #[serde(default = "default_burst_limit")]
    pub burst_limit: usize,

    /// Sustained window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: f64,

    /// Burst window length in seconds
    #[serde(default = "default_burst_window_secs")]
    pub burst_window_secs: f64,

    /// How often idle ledgers are reaped, in seconds
    #[serde(default = "default_reap_interval")]
    pub reap_interval_secs: u64,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            rate_limit: default_rate_limit(),
            burst_limit: default_burst_limit(),
            window_secs: default_window_secs(),
            burst_window_secs: default_burst_window_secs(),
            reap_interval_secs: default_reap_interval(),
        }
    }
}

fn default_rate_limit() -> usize {
    40
}

fn default_burst_limit() -> usize {
    11
}

fn default_window_secs() -> f64 {
    60.0
}

fn default_burst_window_secs() -> f64 {
    1.0
}

fn default_reap_interval() -> u64 {
    30
}

impl RateLimitingConfig {
    /// Build the limiter thresholds, rejecting unusable values.
    pub fn limits(&self) -> Result<Limits> {
        let limits = Limits {
            rate_limit: self.rate_limit,
            burst_limit: self.burst_limit,
            window: seconds("window_secs", self.window_secs)?,
            burst_window: seconds("burst_window_secs", self.burst_window_secs)?,
        };
        limits.validate()?;
        Ok(limits)
    }

    /// Interval between idle ledger sweeps.
    pub fn reap_interval(&self) -> Result<Duration> {
        if self.reap_interval_secs == 0 {
            return Err(TurnstileError::Config(
                "reap_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(Duration::from_secs(self.reap_interval_secs))
    }
}

fn seconds(field: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|e| TurnstileError::Config(format!("invalid {}: {} ({})", field, value, e)))
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence when set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TurnstileConfig {
    /// Load configuration from an optional YAML file plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Like [`TurnstileConfig::load`], reading overrides from `env` instead of
    /// the process environment when it is given.
    pub fn load_with_env(path: Option<&Path>, env: Option<Map<String, String>>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml));
        }

        let config: TurnstileConfig = builder
            .add_source(
                Environment::with_prefix("TURNSTILE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: TurnstileConfig =
            serde_yaml::from_str(yaml).map_err(|e| TurnstileError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every derived value up front so startup fails fast.
    pub fn validate(&self) -> Result<()> {
        self.rate_limiting.limits()?;
        self.rate_limiting.reap_interval()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_builtin_limits() {
        let config = TurnstileConfig::default();
        assert_eq!(config.rate_limiting.limits().unwrap(), Limits::default());
        assert_eq!(config.server.retry_after_secs, 60);
        assert_eq!(config.server.listen_addr.port(), 8000);
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
server:
  listen_addr: "127.0.0.1:9000"
rate_limiting:
  burst_limit: 5
  burst_window_secs: 0.5
logging:
  format: json
"#;
        let config = TurnstileConfig::from_yaml(yaml).unwrap();
        let limits = config.rate_limiting.limits().unwrap();

        assert_eq!(config.server.listen_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(limits.burst_limit, 5);
        assert_eq!(limits.burst_window, Duration::from_millis(500));
        assert_eq!(limits.rate_limit, 40);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_limits_rejected() {
        let yaml = r#"
rate_limiting:
  window_secs: 1
  burst_window_secs: 5
"#;
        assert!(matches!(
            TurnstileConfig::from_yaml(yaml),
            Err(TurnstileError::Config(_))
        ));

        let yaml = r#"
rate_limiting:
  window_secs: -3
"#;
        assert!(TurnstileConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_zero_reap_interval_rejected() {
        let yaml = r#"
rate_limiting:
  reap_interval_secs: 0
"#;
        assert!(TurnstileConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("turnstile-config-{}.yaml", std::process::id()));
        std::fs::write(&path, "rate_limiting:\n  rate_limit: 100\n").unwrap();

        let config = TurnstileConfig::load_with_env(Some(&path), Some(Map::new()));
        std::fs::remove_file(&path).ok();

        let config = config.unwrap();
        assert_eq!(config.rate_limiting.rate_limit, 100);
        assert_eq!(config.rate_limiting.burst_limit, 11);
    }

    #[test]
    fn test_environment_overrides() {
        let mut env = Map::new();
        env.insert(
            "TURNSTILE__RATE_LIMITING__BURST_LIMIT".to_string(),
            "20".to_string(),
        );
        env.insert(
            "TURNSTILE__SERVER__RETRY_AFTER_SECS".to_string(),
            "30".to_string(),
        );
        env.insert("UNRELATED__BURST_LIMIT".to_string(), "99".to_string());

        let config = TurnstileConfig::load_with_env(None, Some(env)).unwrap();

        assert_eq!(config.rate_limiting.burst_limit, 20);
        assert_eq!(config.rate_limiting.rate_limit, 40);
        assert_eq!(config.server.retry_after_secs, 30);
    }

    #[test]
    fn test_environment_overrides_file() {
        let path = std::env::temp_dir().join(format!("turnstile-env-{}.yaml", std::process::id()));
        std::fs::write(&path, "rate_limiting:\n  rate_limit: 100\n  burst_limit: 5\n").unwrap();

        let mut env = Map::new();
        env.insert(
            "TURNSTILE__RATE_LIMITING__BURST_LIMIT".to_string(),
            "7".to_string(),
        );
        let config = TurnstileConfig::load_with_env(Some(&path), Some(env));
        std::fs::remove_file(&path).ok();

        let config = config.unwrap();
        assert_eq!(config.rate_limiting.rate_limit, 100);
        assert_eq!(config.rate_limiting.burst_limit, 7);
    }
}
