//! # Deploy Checker Metrics
//!
//! OpenTelemetry instruments for the deploy checker. The meter is resolved
//! lazily from the global provider, so instruments are no-ops until the
//! host installs an exporter.
//!
//! ```rust
//! use rollout_core::metrics::*;
//! use opentelemetry::KeyValue;
//!
//! deploy_check_passes_total().add(1, &[]);
//! deploy_check_results_total().add(1, &[KeyValue::new("result", "SUCCEEDED")]);
//! ```

use opentelemetry::metrics::{Counter, Histogram, Meter};
use opentelemetry::KeyValue;
use std::sync::OnceLock;

use crate::models::TaskCleanupType;
use crate::state_machine::DeployCheckResult;

static ROLLOUT_METER: OnceLock<Meter> = OnceLock::new();

fn meter() -> &'static Meter {
    ROLLOUT_METER.get_or_init(|| opentelemetry::global::meter_provider().meter("rollout-core"))
}

/// Total number of deploy checker passes started
pub fn deploy_check_passes_total() -> Counter<u64> {
    meter()
        .u64_counter("rollout.deploy_checks.passes.total")
        .with_description("Total number of deploy checker passes started")
        .build()
}

/// Decisions reached for pending deploys
///
/// Labels:
/// - result: WAITING, SUCCEEDED, FAILED_INTERNAL_STATE, OVERDUE, FAILED, CANCELED
pub fn deploy_check_results_total() -> Counter<u64> {
    meter()
        .u64_counter("rollout.deploy_checks.results.total")
        .with_description("Decisions reached for pending deploys")
        .build()
}

/// Pending deploys whose evaluation raised a collaborator error
pub fn deploy_check_errors_total() -> Counter<u64> {
    meter()
        .u64_counter("rollout.deploy_checks.errors.total")
        .with_description("Pending deploys whose evaluation raised a collaborator error")
        .build()
}

/// Task cleanups issued by the deploy checker
///
/// Labels:
/// - cleanup_type: NEW_DEPLOY_SUCCEEDED, DEPLOY_FAILED, DEPLOY_CANCELED
pub fn task_cleanups_created_total() -> Counter<u64> {
    meter()
        .u64_counter("rollout.task_cleanups.created.total")
        .with_description("Task cleanups issued by the deploy checker")
        .build()
}

/// Wall time of one full deploy checker pass in milliseconds
pub fn deploy_check_duration() -> Histogram<f64> {
    meter()
        .f64_histogram("rollout.deploy_checks.duration")
        .with_description("Wall time of one deploy checker pass in milliseconds")
        .with_unit("ms")
        .build()
}

pub fn record_result(result: DeployCheckResult) {
    deploy_check_results_total().add(1, &[KeyValue::new("result", result.as_str())]);
}

pub fn record_cleanups(cleanup_type: TaskCleanupType, count: usize) {
    if count == 0 {
        return;
    }
    task_cleanups_created_total().add(
        count as u64,
        &[KeyValue::new("cleanup_type", cleanup_type.as_str())],
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruments_record_without_exporter() {
        deploy_check_passes_total().add(1, &[]);
        deploy_check_errors_total().add(1, &[]);
        deploy_check_duration().record(12.5, &[]);
        record_result(DeployCheckResult::OVERDUE);
        record_cleanups(TaskCleanupType::DeployFailed, 3);
        record_cleanups(TaskCleanupType::DeployFailed, 0);
    }
}
