use crate::error::DbError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Connects to `pg_dsn` with a small bounded pool, matching the teacher's
/// habit of sizing connection pools to the worker concurrency rather than
/// leaving `sqlx` defaults in place.
pub async fn connect(pg_dsn: &str) -> Result<PgPool, DbError> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(10))
        .connect(pg_dsn)
        .await?;
    Ok(pool)
}
