//! Configuration Loading Tests
//!
//! Layering of defaults, TOML files and environment overrides.

use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use rollout_core::{RolloutConfig, RolloutError};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

#[test]
fn file_values_override_defaults() {
    let file = write_config(
        r#"
        [deploy_checker]
        check_interval_ms = 10000
        max_concurrent_checks = 2

        [load_balancer]
        uri = "http://lb.internal:8088/api/requests"
        "#,
    );

    let config = RolloutConfig::load_with_environment(Some(file.path()), Some(HashMap::new()))
        .expect("config should load");

    assert_eq!(config.deploy_checker.check_interval(), Duration::from_secs(10));
    assert_eq!(config.deploy_checker.max_concurrent_checks, 2);
    assert_eq!(config.deploy_checker.deploy_healthy_by_seconds, 120);
    assert_eq!(
        config.load_balancer.uri.as_deref(),
        Some("http://lb.internal:8088/api/requests")
    );
    assert_eq!(config.database.max_connections, 10);
}

#[test]
fn environment_overrides_file() {
    let file = write_config(
        r#"
        [deploy_checker]
        deploy_healthy_by_seconds = 60
        "#,
    );
    let environment = HashMap::from([(
        "ROLLOUT__DEPLOY_CHECKER__DEPLOY_HEALTHY_BY_SECONDS".to_string(),
        "900".to_string(),
    )]);

    let config = RolloutConfig::load_with_environment(Some(file.path()), Some(environment))
        .expect("config should load");

    assert_eq!(config.deploy_checker.deploy_healthy_by_seconds, 900);
}

#[test]
fn disabled_checker_is_accepted() {
    let file = write_config(
        r#"
        [deploy_checker]
        enabled = false
        "#,
    );

    let config = RolloutConfig::load_with_environment(Some(file.path()), Some(HashMap::new()))
        .expect("config should load");

    assert!(!config.deploy_checker.enabled);
}

#[test]
fn invalid_values_are_rejected() {
    let file = write_config(
        r#"
        [deploy_checker]
        max_concurrent_checks = 0
        "#,
    );

    let result = RolloutConfig::load_with_environment(Some(file.path()), Some(HashMap::new()));

    assert!(matches!(result, Err(RolloutError::ConfigurationError(_))));
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("absent.toml");

    let result = RolloutConfig::load_with_environment(Some(&path), Some(HashMap::new()));

    assert!(result.is_err());
}
