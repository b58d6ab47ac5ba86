//! Configuration validation.

use crate::config::Config;
use std::collections::HashSet;

/// Validate the configuration.
///
/// Checks for:
/// - At least one backend
/// - No duplicate backend addresses
/// - The listen address not appearing among the backends
/// - A non-zero probe timeout and interval
///
/// # Returns
///
/// `Ok(())` if valid, or an error message describing the problems.
pub fn validate_config(config: &Config) -> Result<(), String> {
    let mut errors = Vec::new();

    if config.backends.is_empty() {
        errors.push("at least one backend must be defined".to_string());
    }

    let mut seen = HashSet::new();
    for backend in &config.backends {
        if !seen.insert(backend) {
            errors.push(format!("duplicate backend address: {}", backend));
        }
        if *backend == config.listen {
            errors.push(format!(
                "backend {} is the listen address itself",
                backend
            ));
        }
    }

    if config.health.probe_timeout.is_zero() {
        errors.push("health.probe_timeout must be non-zero".to_string());
    }
    if config.health.probe_interval.is_zero() {
        errors.push("health.probe_interval must be non-zero".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GlobalConfig, HealthConfig, RetryConfig};

    fn valid_config() -> Config {
        Config {
            global: GlobalConfig::default(),
            listen: "127.0.0.1:8000".parse().unwrap(),
            backends: vec![
                "127.0.0.1:8080".parse().unwrap(),
                "127.0.0.1:8081".parse().unwrap(),
            ],
            health: HealthConfig::default(),
            retry: RetryConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_empty_backends() {
        let mut config = valid_config();
        config.backends.clear();
        assert!(validate_config(&config)
            .unwrap_err()
            .contains("at least one backend"));
    }

    #[test]
    fn test_duplicate_backends() {
        let mut config = valid_config();
        config.backends.push(config.backends[0]);
        assert!(validate_config(&config)
            .unwrap_err()
            .contains("duplicate backend address"));
    }

    #[test]
    fn test_listen_among_backends() {
        let mut config = valid_config();
        config.backends.push(config.listen);
        assert!(validate_config(&config)
            .unwrap_err()
            .contains("listen address"));
    }

    #[test]
    fn test_zero_probe_timeout() {
        let mut config = valid_config();
        config.health.probe_timeout = std::time::Duration::ZERO;
        assert!(validate_config(&config)
            .unwrap_err()
            .contains("probe_timeout"));
    }
}
