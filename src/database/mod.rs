//! # Postgres Adapters
//!
//! `sqlx`-backed implementations of the deploy store, task registry,
//! request source and health check source, sharing one connection pool.
//!
//! The schema lives in `migrations/` and is applied with [`run_migrations`].

pub mod deploy_store;
pub mod healthchecks;
pub mod request_source;
pub mod task_registry;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{error, info};

use crate::config::DatabaseConfig;
use crate::error::{RolloutError, RolloutResult};

pub use deploy_store::PgDeployStore;
pub use healthchecks::PgHealthcheckSource;
pub use request_source::PgRequestSource;
pub use task_registry::PgTaskRegistry;

/// Open a connection pool sized from configuration
pub async fn connect(config: &DatabaseConfig) -> RolloutResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;

    info!(
        max_connections = config.max_connections,
        "Connected to rollout database"
    );
    Ok(pool)
}

/// Apply pending schema migrations
pub async fn run_migrations(pool: &PgPool) -> RolloutResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| RolloutError::DatabaseError(format!("Migration failed: {e}")))?;
    Ok(())
}

/// Convert an optional signed column into an unsigned model field
pub(crate) fn non_negative<T: TryFrom<i64>>(value: Option<i64>, column: &str) -> RolloutResult<Option<T>> {
    value
        .map(|v| {
            T::try_from(v).map_err(|_| {
                RolloutError::DatabaseError(format!("Column {column} out of range: {v}"))
            })
        })
        .transpose()
}

/// Convert fetched rows, logging and dropping the ones that fail so a single
/// malformed row never hides the rest of the table
pub(crate) fn convert_rows<R, T, F>(rows: Vec<R>, table: &str, mut convert: F) -> Vec<T>
where
    F: FnMut(R) -> RolloutResult<T>,
{
    rows.into_iter()
        .filter_map(|row| match convert(row) {
            Ok(value) => Some(value),
            Err(e) => {
                error!(table = table, error = %e, "Skipping malformed row");
                None
            }
        })
        .collect()
}
