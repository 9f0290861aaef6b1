use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use tracing::warn;

use super::convert_rows;
use crate::error::{RolloutError, RolloutResult};
use crate::models::{Task, TaskCleanup, TaskId};
use crate::registry::TaskRegistry;

/// Join of `rollout_tasks t` against a batch of task ids bound as five
/// parallel arrays, `$1` through `$5`
pub(crate) const TASK_KEY_JOIN: &str = r#"
    JOIN UNNEST($1::text[], $2::text[], $3::timestamptz[], $4::int4[], $5::text[])
      AS k(request_id, deploy_id, started_at, instance_no, host)
      ON t.request_id = k.request_id
     AND t.deploy_id = k.deploy_id
     AND t.started_at = k.started_at
     AND t.instance_no = k.instance_no
     AND t.host = k.host
"#;

/// Task ids split into the column arrays [`TASK_KEY_JOIN`] binds
#[derive(Debug, Default, PartialEq)]
pub(crate) struct TaskKeyColumns {
    pub request_ids: Vec<String>,
    pub deploy_ids: Vec<String>,
    pub started_ats: Vec<DateTime<Utc>>,
    pub instance_nos: Vec<i32>,
    pub hosts: Vec<String>,
}

impl TaskKeyColumns {
    /// Ids whose instance number does not fit the column cannot be stored
    /// and are left out
    pub(crate) fn from_task_ids(task_ids: &[TaskId]) -> Self {
        let mut columns = Self::default();
        for task_id in task_ids {
            let Ok(instance_no) = i32::try_from(task_id.instance_no) else {
                warn!(task_id = %task_id, "Task instance number out of range, skipping lookup");
                continue;
            };
            columns.request_ids.push(task_id.request_id.clone());
            columns.deploy_ids.push(task_id.deploy_id.clone());
            columns.started_ats.push(task_id.started_at);
            columns.instance_nos.push(instance_no);
            columns.hosts.push(task_id.host.clone());
        }
        columns
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.request_ids.is_empty()
    }
}

/// Rebuild a task id from its stored component columns
pub(crate) fn task_id_from_columns(
    stored_id: &str,
    request_id: &str,
    deploy_id: &str,
    started_at: DateTime<Utc>,
    instance_no: i32,
    host: &str,
) -> RolloutResult<TaskId> {
    let instance_no = u32::try_from(instance_no).map_err(|_| {
        RolloutError::TaskRegistryError(format!(
            "Task {stored_id} has invalid instance number {instance_no}"
        ))
    })?;
    Ok(TaskId::new(request_id, deploy_id, started_at, instance_no, host))
}

#[derive(Debug, Clone, FromRow)]
struct TaskRow {
    /// Opaque storage key, only used in diagnostics
    task_id: String,
    request_id: String,
    deploy_id: String,
    started_at: DateTime<Utc>,
    instance_no: i32,
    host: String,
    ports: Vec<i32>,
}

impl TaskRow {
    fn task_id(&self) -> RolloutResult<TaskId> {
        task_id_from_columns(
            &self.task_id,
            &self.request_id,
            &self.deploy_id,
            self.started_at,
            self.instance_no,
            &self.host,
        )
    }

    fn into_task(self) -> RolloutResult<Task> {
        let task_id = self.task_id()?;
        let ports = self
            .ports
            .iter()
            .map(|port| {
                u16::try_from(*port).map_err(|_| {
                    RolloutError::TaskRegistryError(format!(
                        "Task {} has invalid port {port}",
                        self.task_id
                    ))
                })
            })
            .collect::<RolloutResult<Vec<u16>>>()?;
        Ok(Task::new(task_id, ports))
    }
}

const TASK_COLUMNS: &str =
    "t.task_id, t.request_id, t.deploy_id, t.started_at, t.instance_no, t.host, t.ports";

/// Task registry over `rollout_tasks` and `rollout_task_cleanups`.
///
/// Tasks are addressed by their component columns; the stored `task_id`
/// key is only carried through to cleanup rows.
#[derive(Debug, Clone)]
pub struct PgTaskRegistry {
    pool: PgPool,
}

impl PgTaskRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRegistry for PgTaskRegistry {
    async fn active_task_ids(&self) -> RolloutResult<Vec<TaskId>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM rollout_tasks t WHERE t.active ORDER BY t.task_id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(convert_rows(rows, "rollout_tasks", |row| row.task_id()))
    }

    async fn tasks(&self, task_ids: &[TaskId]) -> RolloutResult<HashMap<TaskId, Task>> {
        let keys = TaskKeyColumns::from_task_ids(task_ids);
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM rollout_tasks t {TASK_KEY_JOIN}"
        ))
        .bind(keys.request_ids)
        .bind(keys.deploy_ids)
        .bind(keys.started_ats)
        .bind(keys.instance_nos)
        .bind(keys.hosts)
        .fetch_all(&self.pool)
        .await?;

        Ok(convert_rows(rows, "rollout_tasks", TaskRow::into_task)
            .into_iter()
            .map(|task| (task.task_id.clone(), task))
            .collect())
    }

    /// Returns false when the task already has a cleanup or is no longer
    /// registered
    async fn create_cleanup(&self, cleanup: &TaskCleanup) -> RolloutResult<bool> {
        let task_id = &cleanup.task_id;
        let instance_no = i32::try_from(task_id.instance_no).map_err(|_| {
            RolloutError::TaskRegistryError(format!(
                "Task {task_id} has invalid instance number {}",
                task_id.instance_no
            ))
        })?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO rollout_task_cleanups (task_id, cleanup_type, cleanup_user, created_at)
            SELECT t.task_id, $6, $7, $8
            FROM rollout_tasks t
            WHERE t.request_id = $1
              AND t.deploy_id = $2
              AND t.started_at = $3
              AND t.instance_no = $4
              AND t.host = $5
            ON CONFLICT (task_id) DO NOTHING
            "#,
        )
        .bind(&task_id.request_id)
        .bind(&task_id.deploy_id)
        .bind(task_id.started_at)
        .bind(instance_no)
        .bind(&task_id.host)
        .bind(cleanup.cleanup_type.as_str())
        .bind(&cleanup.user)
        .bind(cleanup.timestamp)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 0 {
            warn!(task_id = %task_id, "No cleanup created, task has one already or is not registered");
        }
        Ok(inserted.rows_affected() == 1)
    }
}
