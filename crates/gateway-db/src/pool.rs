//! Connection pool construction, grounded on
//! `PostgresChunkStore`'s `sqlx::postgres::{PgPool, PgPoolOptions}` usage.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::error::DbResult;

/// Matches the conservative bound the teacher's chunk store uses for a
/// single-process worker pool rather than a high-concurrency web tier.
const MAX_CONNECTIONS: u32 = 10;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn create_pool(database_url: &str) -> DbResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await?;
    Ok(pool)
}
