use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;

use super::convert_rows;
use super::task_registry::{task_id_from_columns, TaskKeyColumns, TASK_KEY_JOIN};
use crate::error::{RolloutError, RolloutResult};
use crate::health::{HealthcheckResult, HealthcheckResultSource};
use crate::models::TaskId;

#[derive(Debug, Clone, FromRow)]
struct HealthcheckRow {
    task_id: String,
    request_id: String,
    deploy_id: String,
    started_at: DateTime<Utc>,
    instance_no: i32,
    host: String,
    status_code: Option<i32>,
    error_message: Option<String>,
    checked_at: DateTime<Utc>,
}

impl TryFrom<HealthcheckRow> for HealthcheckResult {
    type Error = RolloutError;

    fn try_from(row: HealthcheckRow) -> Result<Self, Self::Error> {
        let task_id = task_id_from_columns(
            &row.task_id,
            &row.request_id,
            &row.deploy_id,
            row.started_at,
            row.instance_no,
            &row.host,
        )?;
        let status_code = row
            .status_code
            .map(|code| {
                u16::try_from(code).map_err(|_| {
                    RolloutError::HealthCheckError(format!(
                        "Task {} has invalid status code {code}",
                        row.task_id
                    ))
                })
            })
            .transpose()?;

        Ok(HealthcheckResult {
            task_id,
            status_code,
            error_message: row.error_message,
            timestamp: row.checked_at,
        })
    }
}

/// Latest health check per task from `rollout_healthcheck_results`, joined
/// to `rollout_tasks` through the stored task key
#[derive(Debug, Clone)]
pub struct PgHealthcheckSource {
    pool: PgPool,
}

impl PgHealthcheckSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HealthcheckResultSource for PgHealthcheckSource {
    async fn latest_healthchecks(
        &self,
        task_ids: &[TaskId],
    ) -> RolloutResult<HashMap<TaskId, HealthcheckResult>> {
        let keys = TaskKeyColumns::from_task_ids(task_ids);
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, HealthcheckRow>(&format!(
            r#"
            SELECT t.task_id, t.request_id, t.deploy_id, t.started_at, t.instance_no, t.host,
                   h.status_code, h.error_message, h.checked_at
            FROM rollout_tasks t
            {TASK_KEY_JOIN}
            JOIN rollout_healthcheck_results h ON h.task_id = t.task_id
            "#
        ))
        .bind(keys.request_ids)
        .bind(keys.deploy_ids)
        .bind(keys.started_ats)
        .bind(keys.instance_nos)
        .bind(keys.hosts)
        .fetch_all(&self.pool)
        .await?;

        Ok(
            convert_rows(rows, "rollout_healthcheck_results", HealthcheckResult::try_from)
                .into_iter()
                .map(|result| (result.task_id.clone(), result))
                .collect(),
        )
    }
}
