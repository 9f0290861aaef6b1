use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use tracing::debug;

use super::{convert_rows, non_negative};
use crate::error::{RolloutError, RolloutResult};
use crate::models::{
    CancelMarker, Deploy, DeployKey, DeployMarker, DeployResult, DeployState, LoadBalancerState,
    PendingDeploy, VersionedDeployState,
};
use crate::store::{ConditionalPersistResult, DeleteResult, DeployStore};

#[derive(Debug, Clone, FromRow)]
struct PendingDeployRow {
    request_id: String,
    deploy_id: String,
    marker_timestamp: DateTime<Utc>,
    marker_user: Option<String>,
    load_balancer_state: Option<String>,
}

impl TryFrom<PendingDeployRow> for PendingDeploy {
    type Error = RolloutError;

    fn try_from(row: PendingDeployRow) -> Result<Self, Self::Error> {
        let load_balancer_state = row
            .load_balancer_state
            .as_deref()
            .map(str::parse::<LoadBalancerState>)
            .transpose()
            .map_err(RolloutError::DatabaseError)?;

        Ok(PendingDeploy {
            deploy_marker: DeployMarker::new(
                row.request_id,
                row.deploy_id,
                row.marker_timestamp,
                row.marker_user,
            ),
            load_balancer_state,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
struct CancelDeployRow {
    request_id: String,
    deploy_id: String,
    marker_timestamp: DateTime<Utc>,
    marker_user: Option<String>,
}

impl From<CancelDeployRow> for CancelMarker {
    fn from(row: CancelDeployRow) -> Self {
        CancelMarker::new(row.request_id, row.deploy_id, row.marker_timestamp, row.marker_user)
    }
}

#[derive(Debug, Clone, FromRow)]
struct DeployStateRow {
    request_id: String,
    active_deploy: Option<Json<DeployMarker>>,
    pending_deploy: Option<Json<DeployMarker>>,
    version: i64,
}

impl From<DeployStateRow> for VersionedDeployState {
    fn from(row: DeployStateRow) -> Self {
        VersionedDeployState {
            deploy_state: DeployState {
                request_id: row.request_id,
                active_deploy: row.active_deploy.map(|Json(marker)| marker),
                pending_deploy: row.pending_deploy.map(|Json(marker)| marker),
            },
            version: row.version,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct DeployRow {
    request_id: String,
    deploy_id: String,
    healthcheck_uri: Option<String>,
    healthcheck_interval_seconds: Option<i64>,
    deploy_health_timeout_seconds: Option<i64>,
    load_balanced: bool,
    load_balancer_request_id: Option<String>,
}

impl TryFrom<DeployRow> for Deploy {
    type Error = RolloutError;

    fn try_from(row: DeployRow) -> Result<Self, Self::Error> {
        Ok(Deploy {
            request_id: row.request_id,
            id: row.deploy_id,
            healthcheck_uri: row.healthcheck_uri,
            healthcheck_interval_seconds: non_negative(
                row.healthcheck_interval_seconds,
                "healthcheck_interval_seconds",
            )?,
            deploy_health_timeout_seconds: non_negative(
                row.deploy_health_timeout_seconds,
                "deploy_health_timeout_seconds",
            )?,
            load_balanced: row.load_balanced,
            load_balancer_request_id: row.load_balancer_request_id,
        })
    }
}

fn delete_result(rows_affected: u64) -> DeleteResult {
    if rows_affected > 0 {
        DeleteResult::Deleted
    } else {
        DeleteResult::DidNotExist
    }
}

/// Deploy store backed by the `rollout_*` tables.
///
/// Promotion is a single `UPDATE ... WHERE version = $expected`; a miss is
/// told apart as conflict or not-found with a follow-up existence check.
#[derive(Debug, Clone)]
pub struct PgDeployStore {
    pool: PgPool,
}

impl PgDeployStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeployStore for PgDeployStore {
    async fn pending_deploys(&self) -> RolloutResult<Vec<PendingDeploy>> {
        let rows = sqlx::query_as::<_, PendingDeployRow>(
            r#"
            SELECT request_id, deploy_id, marker_timestamp, marker_user, load_balancer_state
            FROM rollout_pending_deploys
            ORDER BY request_id, deploy_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(convert_rows(rows, "rollout_pending_deploys", PendingDeploy::try_from))
    }

    async fn cancel_deploys(&self) -> RolloutResult<Vec<CancelMarker>> {
        let rows = sqlx::query_as::<_, CancelDeployRow>(
            r#"
            SELECT request_id, deploy_id, marker_timestamp, marker_user
            FROM rollout_cancel_deploys
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CancelMarker::from).collect())
    }

    async fn deploy_state(&self, request_id: &str) -> RolloutResult<Option<VersionedDeployState>> {
        let row = sqlx::query_as::<_, DeployStateRow>(
            r#"
            SELECT request_id, active_deploy, pending_deploy, version
            FROM rollout_deploy_states
            WHERE request_id = $1
            "#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(VersionedDeployState::from))
    }

    async fn save_deploy_state(
        &self,
        state: &DeployState,
        expected_version: i64,
    ) -> RolloutResult<ConditionalPersistResult> {
        let updated = sqlx::query(
            r#"
            UPDATE rollout_deploy_states
            SET active_deploy = $2,
                pending_deploy = $3,
                version = version + 1,
                updated_at = now()
            WHERE request_id = $1 AND version = $4
            "#,
        )
        .bind(&state.request_id)
        .bind(state.active_deploy.as_ref().map(Json))
        .bind(state.pending_deploy.as_ref().map(Json))
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 1 {
            return Ok(ConditionalPersistResult::Saved);
        }

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM rollout_deploy_states WHERE request_id = $1)",
        )
        .bind(&state.request_id)
        .fetch_one(&self.pool)
        .await?;

        debug!(
            request_id = %state.request_id,
            expected_version,
            exists,
            "Conditional deploy state save missed"
        );

        Ok(if exists {
            ConditionalPersistResult::Conflict
        } else {
            ConditionalPersistResult::NotFound
        })
    }

    async fn save_pending_deploy(&self, pending: &PendingDeploy) -> RolloutResult<()> {
        let marker = &pending.deploy_marker;
        sqlx::query(
            r#"
            INSERT INTO rollout_pending_deploys
                (request_id, deploy_id, marker_timestamp, marker_user, load_balancer_state)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (request_id, deploy_id) DO UPDATE
            SET marker_timestamp = EXCLUDED.marker_timestamp,
                marker_user = EXCLUDED.marker_user,
                load_balancer_state = EXCLUDED.load_balancer_state,
                updated_at = now()
            "#,
        )
        .bind(&marker.request_id)
        .bind(&marker.deploy_id)
        .bind(marker.timestamp)
        .bind(&marker.user)
        .bind(pending.load_balancer_state.map(|state| state.as_str()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_pending_deploy(&self, pending: &PendingDeploy) -> RolloutResult<DeleteResult> {
        let marker = &pending.deploy_marker;
        let deleted = sqlx::query(
            "DELETE FROM rollout_pending_deploys WHERE request_id = $1 AND deploy_id = $2",
        )
        .bind(&marker.request_id)
        .bind(&marker.deploy_id)
        .execute(&self.pool)
        .await?;
        Ok(delete_result(deleted.rows_affected()))
    }

    async fn delete_cancel_deploy(&self, cancel: &CancelMarker) -> RolloutResult<DeleteResult> {
        let deleted = sqlx::query(
            "DELETE FROM rollout_cancel_deploys WHERE request_id = $1 AND deploy_id = $2",
        )
        .bind(&cancel.request_id)
        .bind(&cancel.deploy_id)
        .execute(&self.pool)
        .await?;
        Ok(delete_result(deleted.rows_affected()))
    }

    async fn deploys_for_keys(
        &self,
        keys: &[DeployKey],
    ) -> RolloutResult<HashMap<DeployKey, Deploy>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let request_ids: Vec<String> = keys.iter().map(|k| k.request_id.clone()).collect();
        let deploy_ids: Vec<String> = keys.iter().map(|k| k.deploy_id.clone()).collect();

        let rows = sqlx::query_as::<_, DeployRow>(
            r#"
            SELECT d.request_id, d.deploy_id, d.healthcheck_uri,
                   d.healthcheck_interval_seconds, d.deploy_health_timeout_seconds,
                   d.load_balanced, d.load_balancer_request_id
            FROM rollout_deploys d
            JOIN UNNEST($1::text[], $2::text[]) AS k(request_id, deploy_id)
              ON d.request_id = k.request_id AND d.deploy_id = k.deploy_id
            "#,
        )
        .bind(request_ids)
        .bind(deploy_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(convert_rows(rows, "rollout_deploys", Deploy::try_from)
            .into_iter()
            .map(|deploy| (deploy.key(), deploy))
            .collect())
    }

    async fn save_deploy_result(&self, key: &DeployKey, result: &DeployResult) -> RolloutResult<()> {
        sqlx::query(
            r#"
            INSERT INTO rollout_deploy_results (request_id, deploy_id, result, message, recorded_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (request_id, deploy_id) DO UPDATE
            SET result = EXCLUDED.result,
                message = EXCLUDED.message,
                recorded_at = EXCLUDED.recorded_at
            "#,
        )
        .bind(&key.request_id)
        .bind(&key.deploy_id)
        .bind(result.result.as_str())
        .bind(&result.message)
        .bind(result.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
