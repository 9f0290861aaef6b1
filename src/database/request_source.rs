use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use super::non_negative;
use crate::error::{RolloutError, RolloutResult};
use crate::models::{Request, RequestType};
use crate::registry::RequestSource;

#[derive(Debug, Clone, FromRow)]
struct RequestRow {
    request_id: String,
    request_type: String,
    instances: Option<i32>,
}

fn parse_request_type(value: &str) -> RolloutResult<RequestType> {
    match value {
        "service" => Ok(RequestType::Service),
        "worker" => Ok(RequestType::Worker),
        "scheduled" => Ok(RequestType::Scheduled),
        "on_demand" => Ok(RequestType::OnDemand),
        other => Err(RolloutError::RequestSourceError(format!(
            "Unknown request type: {other}"
        ))),
    }
}

impl TryFrom<RequestRow> for Request {
    type Error = RolloutError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        let request_type = parse_request_type(&row.request_type)?;
        let instances = non_negative(row.instances.map(i64::from), "instances").map_err(|e| {
            RolloutError::RequestSourceError(format!("Request {}: {e}", row.request_id))
        })?;
        Ok(Request::new(row.request_id, request_type, instances))
    }
}

/// Request definitions from `rollout_requests`
#[derive(Debug, Clone)]
pub struct PgRequestSource {
    pool: PgPool,
}

impl PgRequestSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequestSource for PgRequestSource {
    async fn fetch_request(&self, request_id: &str) -> RolloutResult<Option<Request>> {
        let row = sqlx::query_as::<_, RequestRow>(
            "SELECT request_id, request_type, instances FROM rollout_requests WHERE request_id = $1",
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Request::try_from).transpose()
    }
}
