use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::{DeployHealth, DeployHealthEvaluator};
use crate::error::RolloutResult;
use crate::models::{Deploy, TaskId};

/// Latest check of one task's health check endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthcheckResult {
    pub task_id: TaskId,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl HealthcheckResult {
    pub fn new(task_id: TaskId, status_code: Option<u16>, error_message: Option<String>) -> Self {
        Self {
            task_id,
            status_code,
            error_message,
            timestamp: Utc::now(),
        }
    }

    pub fn passed(task_id: TaskId) -> Self {
        Self::new(task_id, Some(200), None)
    }

    pub fn failed(task_id: TaskId, status_code: Option<u16>, error_message: impl Into<String>) -> Self {
        Self::new(task_id, status_code, Some(error_message.into()))
    }

    /// A check fails on a transport error or any non-2xx status
    pub fn is_failed(&self) -> bool {
        if self.error_message.is_some() {
            return true;
        }
        !matches!(self.status_code, Some(code) if (200..300).contains(&code))
    }
}

/// Provider of the most recent health check result per task
#[async_trait]
pub trait HealthcheckResultSource: Send + Sync {
    async fn latest_healthchecks(
        &self,
        task_ids: &[TaskId],
    ) -> RolloutResult<HashMap<TaskId, HealthcheckResult>>;
}

/// Evaluates cohort health from per-task health check results.
///
/// Deploys without a health check URI are healthy as soon as their tasks
/// run. Otherwise one failed check fails the whole cohort and a missing
/// result keeps it waiting.
#[derive(Clone)]
pub struct HealthcheckDeployHealthEvaluator {
    source: Arc<dyn HealthcheckResultSource>,
}

impl HealthcheckDeployHealthEvaluator {
    pub fn new(source: Arc<dyn HealthcheckResultSource>) -> Self {
        Self { source }
    }
}

impl std::fmt::Debug for HealthcheckDeployHealthEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthcheckDeployHealthEvaluator").finish_non_exhaustive()
    }
}

#[async_trait]
impl DeployHealthEvaluator for HealthcheckDeployHealthEvaluator {
    async fn deploy_health(
        &self,
        deploy: &Deploy,
        task_ids: &[TaskId],
    ) -> RolloutResult<DeployHealth> {
        if deploy.healthcheck_uri.is_none() {
            return Ok(DeployHealth::Healthy);
        }

        let results = self.source.latest_healthchecks(task_ids).await?;

        let mut waiting = false;
        for task_id in task_ids {
            match results.get(task_id) {
                Some(result) if result.is_failed() => {
                    debug!(
                        deploy_key = %deploy.key(),
                        task_id = %task_id,
                        status_code = ?result.status_code,
                        error = ?result.error_message,
                        "Health check failed"
                    );
                    return Ok(DeployHealth::Unhealthy);
                }
                Some(_) => {}
                None => waiting = true,
            }
        }

        Ok(if waiting {
            DeployHealth::Waiting
        } else {
            DeployHealth::Healthy
        })
    }
}

/// Health check results held in memory, keyed by task
#[derive(Debug, Default)]
pub struct InMemoryHealthcheckSource {
    results: DashMap<TaskId, HealthcheckResult>,
}

impl InMemoryHealthcheckSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, result: HealthcheckResult) {
        self.results.insert(result.task_id.clone(), result);
    }

    pub fn clear(&self, task_id: &TaskId) {
        self.results.remove(task_id);
    }
}

#[async_trait]
impl HealthcheckResultSource for InMemoryHealthcheckSource {
    async fn latest_healthchecks(
        &self,
        task_ids: &[TaskId],
    ) -> RolloutResult<HashMap<TaskId, HealthcheckResult>> {
        Ok(task_ids
            .iter()
            .filter_map(|id| self.results.get(id).map(|r| (id.clone(), r.value().clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(instance_no: u32) -> TaskId {
        TaskId::new("web", "v2", Utc::now(), instance_no, "host")
    }

    fn evaluator() -> (Arc<InMemoryHealthcheckSource>, HealthcheckDeployHealthEvaluator) {
        let source = Arc::new(InMemoryHealthcheckSource::new());
        let evaluator = HealthcheckDeployHealthEvaluator::new(source.clone());
        (source, evaluator)
    }

    #[test]
    fn test_failed_check_detection() {
        assert!(!HealthcheckResult::passed(task(1)).is_failed());
        assert!(HealthcheckResult::new(task(1), Some(503), None).is_failed());
        assert!(HealthcheckResult::new(task(1), None, None).is_failed());
        assert!(HealthcheckResult::failed(task(1), Some(200), "connection reset").is_failed());
    }

    #[tokio::test]
    async fn test_no_healthcheck_is_healthy() {
        let (_, evaluator) = evaluator();
        let health = evaluator
            .deploy_health(&Deploy::new("web", "v2"), &[task(1)])
            .await
            .unwrap();
        assert_eq!(health, DeployHealth::Healthy);
    }

    #[tokio::test]
    async fn test_missing_result_is_waiting() {
        let (source, evaluator) = evaluator();
        let deploy = Deploy::new("web", "v2").with_healthcheck("/health", None);
        let (first, second) = (task(1), task(2));
        source.record(HealthcheckResult::passed(first.clone()));

        let health = evaluator.deploy_health(&deploy, &[first, second]).await.unwrap();
        assert_eq!(health, DeployHealth::Waiting);
    }

    #[tokio::test]
    async fn test_single_failure_fails_cohort() {
        let (source, evaluator) = evaluator();
        let deploy = Deploy::new("web", "v2").with_healthcheck("/health", None);
        let (first, second, third) = (task(1), task(2), task(3));
        source.record(HealthcheckResult::passed(first.clone()));
        source.record(HealthcheckResult::new(second.clone(), Some(500), None));

        // Unhealthy wins over a missing result
        let health = evaluator
            .deploy_health(&deploy, &[first, second, third])
            .await
            .unwrap();
        assert_eq!(health, DeployHealth::Unhealthy);
    }

    #[tokio::test]
    async fn test_all_passing_is_healthy() {
        let (source, evaluator) = evaluator();
        let deploy = Deploy::new("web", "v2").with_healthcheck("/health", Some(5));
        let ids = vec![task(1), task(2)];
        for id in &ids {
            source.record(HealthcheckResult::passed(id.clone()));
        }

        assert_eq!(
            evaluator.deploy_health(&deploy, &ids).await.unwrap(),
            DeployHealth::Healthy
        );
    }
}
