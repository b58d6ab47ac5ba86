//! Configuration data types.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Global settings
    #[serde(default)]
    pub global: GlobalConfig,

    /// Address and port the load balancer listens on
    pub listen: SocketAddr,

    /// Upstream backend addresses, in selection order
    #[serde(default)]
    pub backends: Vec<SocketAddr>,

    /// Health probing settings
    #[serde(default)]
    pub health: HealthConfig,

    /// Retry and failover settings
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Global configuration settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: json or pretty
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Json,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Health probing settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthConfig {
    /// Time between probe passes
    #[serde(default = "default_probe_interval", with = "humantime_serde")]
    pub probe_interval: Duration,

    /// Bound on a single TCP probe
    #[serde(default = "default_probe_timeout", with = "humantime_serde")]
    pub probe_timeout: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            probe_interval: default_probe_interval(),
            probe_timeout: default_probe_timeout(),
        }
    }
}

/// Retry and failover settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Retries against one backend before it is disabled
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed wait between same-backend retries
    #[serde(default = "default_backoff_delay", with = "humantime_serde")]
    pub backoff_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_delay: default_backoff_delay(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_probe_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_probe_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_max_retries() -> u32 {
    crate::proxy::DEFAULT_MAX_RETRIES
}

fn default_backoff_delay() -> Duration {
    crate::proxy::DEFAULT_BACKOFF_DELAY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let yaml = r#"
listen: "127.0.0.1:8000"
backends:
  - "127.0.0.1:8080"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.global.log_level, "info");
        assert_eq!(config.global.log_format, LogFormat::Json);
        assert_eq!(config.health.probe_interval, Duration::from_secs(10));
        assert_eq!(config.health.probe_timeout, Duration::from_secs(2));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.backoff_delay, Duration::from_millis(10));
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
global:
  log_level: debug
  log_format: pretty

listen: "0.0.0.0:8000"
backends:
  - "10.0.0.1:8080"
  - "10.0.0.2:8080"
  - "10.0.0.3:8080"

health:
  probe_interval: 30s
  probe_timeout: 3s

retry:
  max_retries: 5
  backoff_delay: 50ms
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.global.log_level, "debug");
        assert_eq!(config.global.log_format, LogFormat::Pretty);
        assert_eq!(config.backends.len(), 3);
        assert_eq!(config.health.probe_interval, Duration::from_secs(30));
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.backoff_delay, Duration::from_millis(50));
    }
}
