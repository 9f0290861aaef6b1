//! # System Constants
//!
//! Defaults and environment variable names that define the operational
//! boundaries of the deploy checker.

/// Default values applied when configuration does not override them
pub mod defaults {
    /// Interval between deploy checker passes
    pub const CHECK_INTERVAL_MS: u64 = 5_000;
    /// Time a deploy is given to become healthy when it sets no health timeout of its own
    pub const DEPLOY_HEALTHY_BY_SECONDS: u64 = 120;
    /// Pending deploys evaluated concurrently within one pass
    pub const MAX_CONCURRENT_CHECKS: usize = 8;
    /// Bounded wait for a single load balancer call
    pub const LOAD_BALANCER_REQUEST_TIMEOUT_MS: u64 = 3_000;
    pub const DATABASE_URL: &str = "postgresql://localhost/rollout_development";
    pub const DATABASE_MAX_CONNECTIONS: u32 = 10;
    /// Instance count assumed for requests that do not declare one
    pub const REQUEST_INSTANCES: u32 = 1;
}

/// Environment variables consulted at startup
pub mod env {
    pub const ENVIRONMENT: &str = "ROLLOUT_ENV";
    pub const FALLBACK_ENVIRONMENT: &str = "APP_ENV";
    pub const CONFIG_PATH: &str = "ROLLOUT_CONFIG_PATH";
    pub const LOG_FORMAT: &str = "ROLLOUT_LOG_FORMAT";
    /// Prefix for configuration overrides, e.g. `ROLLOUT__DEPLOY_CHECKER__CHECK_INTERVAL_MS`
    pub const CONFIG_PREFIX: &str = "ROLLOUT";
    pub const CONFIG_SEPARATOR: &str = "__";
}

/// Configuration file looked up (without extension) when no explicit path is given
pub const DEFAULT_CONFIG_FILE: &str = "config/rollout";
