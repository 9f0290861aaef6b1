//! # Rollout Configuration
//!
//! Layered configuration built with the `config` crate:
//!
//! 1. Built-in defaults (see [`crate::constants::defaults`])
//! 2. An optional TOML file (`config/rollout.toml`, or the path in `ROLLOUT_CONFIG_PATH`)
//! 3. Environment overrides such as `ROLLOUT__DEPLOY_CHECKER__CHECK_INTERVAL_MS=10000`
//!
//! ```rust,no_run
//! use rollout_core::config::RolloutConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RolloutConfig::load()?;
//! println!("checking deploys every {:?}", config.deploy_checker.check_interval());
//! # Ok(())
//! # }
//! ```

use crate::constants::{defaults, env, DEFAULT_CONFIG_FILE};
use crate::error::{RolloutError, RolloutResult};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RolloutConfig {
    pub deploy_checker: DeployCheckerConfig,
    pub load_balancer: LoadBalancerConfig,
    pub database: DatabaseConfig,
}

/// Deploy checker pass configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeployCheckerConfig {
    /// Whether the background poller should be started at all
    pub enabled: bool,
    pub check_interval_ms: u64,
    /// Health timeout applied to deploys that do not configure their own
    pub deploy_healthy_by_seconds: u64,
    pub max_concurrent_checks: usize,
}

impl Default for DeployCheckerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_ms: defaults::CHECK_INTERVAL_MS,
            deploy_healthy_by_seconds: defaults::DEPLOY_HEALTHY_BY_SECONDS,
            max_concurrent_checks: defaults::MAX_CONCURRENT_CHECKS,
        }
    }
}

impl DeployCheckerConfig {
    /// Get the pass interval as Duration
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms)
    }
}

/// Load balancer gateway configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoadBalancerConfig {
    /// Base URI of the load balancer control plane; cutovers fail while unset
    pub uri: Option<String>,
    pub request_timeout_ms: u64,
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            uri: None,
            request_timeout_ms: defaults::LOAD_BALANCER_REQUEST_TIMEOUT_MS,
        }
    }
}

impl LoadBalancerConfig {
    /// Get the bounded wait for one load balancer call as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Database connection configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: defaults::DATABASE_URL.to_string(),
            max_connections: defaults::DATABASE_MAX_CONNECTIONS,
        }
    }
}

impl RolloutConfig {
    /// Load configuration from the default file location and process environment
    pub fn load() -> RolloutResult<Self> {
        let path = std::env::var(env::CONFIG_PATH).ok().map(PathBuf::from);
        Self::load_from(path.as_deref())
    }

    /// Load configuration from an explicit file (required when given) and process environment
    pub fn load_from(path: Option<&Path>) -> RolloutResult<Self> {
        Self::load_with_environment(path, None)
    }

    /// Load configuration with an explicit environment map instead of the process environment
    ///
    /// Keys in `environment` use the same form as real variables, e.g.
    /// `ROLLOUT__LOAD_BALANCER__URI`.
    pub fn load_with_environment(
        path: Option<&Path>,
        environment: Option<HashMap<String, String>>,
    ) -> RolloutResult<Self> {
        let mut builder = config::Config::builder();

        builder = match path {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        builder = builder.add_source(
            config::Environment::with_prefix(env::CONFIG_PREFIX)
                .prefix_separator(env::CONFIG_SEPARATOR)
                .separator(env::CONFIG_SEPARATOR)
                .try_parsing(true)
                .source(environment),
        );

        let config: RolloutConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            check_interval_ms = config.deploy_checker.check_interval_ms,
            deploy_healthy_by_seconds = config.deploy_checker.deploy_healthy_by_seconds,
            max_concurrent_checks = config.deploy_checker.max_concurrent_checks,
            load_balancer_configured = config.load_balancer.uri.is_some(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Reject values the deploy checker cannot run with
    pub fn validate(&self) -> RolloutResult<()> {
        if self.deploy_checker.check_interval_ms == 0 {
            return Err(RolloutError::ConfigurationError(
                "deploy_checker.check_interval_ms must be greater than zero".to_string(),
            ));
        }

        if self.deploy_checker.max_concurrent_checks == 0 {
            return Err(RolloutError::ConfigurationError(
                "deploy_checker.max_concurrent_checks must be greater than zero".to_string(),
            ));
        }

        if self.load_balancer.request_timeout_ms == 0 {
            return Err(RolloutError::ConfigurationError(
                "load_balancer.request_timeout_ms must be greater than zero".to_string(),
            ));
        }

        if let Some(uri) = &self.load_balancer.uri {
            Url::parse(uri).map_err(|e| {
                RolloutError::ConfigurationError(format!("Invalid load_balancer.uri '{uri}': {e}"))
            })?;
        }

        if self.database.max_connections == 0 {
            return Err(RolloutError::ConfigurationError(
                "database.max_connections must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RolloutConfig::default();
        assert!(config.deploy_checker.enabled);
        assert_eq!(config.deploy_checker.check_interval(), Duration::from_secs(5));
        assert_eq!(config.deploy_checker.deploy_healthy_by_seconds, 120);
        assert_eq!(config.deploy_checker.max_concurrent_checks, 8);
        assert!(config.load_balancer.uri.is_none());
        assert_eq!(config.load_balancer.request_timeout(), Duration::from_secs(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_zero_interval() {
        let mut config = RolloutConfig::default();
        config.deploy_checker.check_interval_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(RolloutError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_validation_rejects_malformed_uri() {
        let mut config = RolloutConfig::default();
        config.load_balancer.uri = Some("not a uri".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_environment_overrides() {
        let environment = HashMap::from([
            (
                "ROLLOUT__DEPLOY_CHECKER__DEPLOY_HEALTHY_BY_SECONDS".to_string(),
                "300".to_string(),
            ),
            (
                "ROLLOUT__LOAD_BALANCER__URI".to_string(),
                "http://lb.internal:8080/requests".to_string(),
            ),
        ]);

        let config = RolloutConfig::load_with_environment(None, Some(environment)).unwrap();
        assert_eq!(config.deploy_checker.deploy_healthy_by_seconds, 300);
        assert_eq!(
            config.load_balancer.uri.as_deref(),
            Some("http://lb.internal:8080/requests")
        );
        assert_eq!(config.deploy_checker.check_interval_ms, 5_000);
    }
}
