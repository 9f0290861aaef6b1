//! Error types for the rollout core.
//!

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RolloutError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Deploy store error: {0}")]
    StateStoreError(String),
    #[error("Task registry error: {0}")]
    TaskRegistryError(String),
    #[error("Request source error: {0}")]
    RequestSourceError(String),
    #[error("Load balancer error: {0}")]
    LoadBalancerError(String),
    #[error("Health check error: {0}")]
    HealthCheckError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for RolloutError {
    fn from(error: serde_json::Error) -> Self {
        RolloutError::ValidationError(format!("JSON serialization error: {error}"))
    }
}

impl From<sqlx::Error> for RolloutError {
    fn from(err: sqlx::Error) -> Self {
        RolloutError::DatabaseError(err.to_string())
    }
}

impl From<reqwest::Error> for RolloutError {
    fn from(err: reqwest::Error) -> Self {
        RolloutError::LoadBalancerError(err.to_string())
    }
}

impl From<config::ConfigError> for RolloutError {
    fn from(err: config::ConfigError) -> Self {
        RolloutError::ConfigurationError(err.to_string())
    }
}

pub type RolloutResult<T> = std::result::Result<T, RolloutError>;
