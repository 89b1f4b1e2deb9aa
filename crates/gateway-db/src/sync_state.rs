//! Repository for the singleton `sync_state` row (§3 "Sync State").

use gateway_core::SyncState;
use sqlx::{PgPool, Row};

use crate::error::{DbError, DbResult};

pub struct SyncStateRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SyncStateRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load the singleton row, creating it with defaults if it does not
    /// exist yet (first boot against a fresh database).
    pub async fn load(&self) -> DbResult<SyncState> {
        sqlx::query("INSERT INTO sync_state (id) VALUES (1) ON CONFLICT (id) DO NOTHING").execute(self.pool).await?;

        let row = sqlx::query(
            "SELECT last_graph_sync, last_d1_sync, last_reconciliation, last_graph_feedback_sync, \
             last_feedback_created_at, agents_synced, embeddings_generated, feedback_synced, agents_deleted, last_error \
             FROM sync_state WHERE id = 1",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(SyncState {
            last_graph_sync: row.try_get("last_graph_sync").map_err(DbError::from)?,
            last_d1_sync: row.try_get("last_d1_sync").map_err(DbError::from)?,
            last_reconciliation: row.try_get("last_reconciliation").map_err(DbError::from)?,
            last_graph_feedback_sync: row.try_get("last_graph_feedback_sync").map_err(DbError::from)?,
            last_feedback_created_at: row.try_get("last_feedback_created_at").map_err(DbError::from)?,
            agents_synced: row.try_get::<i64, _>("agents_synced").map_err(DbError::from)? as u64,
            embeddings_generated: row.try_get::<i64, _>("embeddings_generated").map_err(DbError::from)? as u64,
            feedback_synced: row.try_get::<i64, _>("feedback_synced").map_err(DbError::from)? as u64,
            agents_deleted: row.try_get::<i64, _>("agents_deleted").map_err(DbError::from)? as u64,
            last_error: row.try_get("last_error").map_err(DbError::from)?,
        })
    }

    pub async fn save(&self, state: &SyncState) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE sync_state SET
                last_graph_sync = $1,
                last_d1_sync = $2,
                last_reconciliation = $3,
                last_graph_feedback_sync = $4,
                last_feedback_created_at = $5,
                agents_synced = $6,
                embeddings_generated = $7,
                feedback_synced = $8,
                agents_deleted = $9,
                last_error = $10
            WHERE id = 1
            "#,
        )
        .bind(state.last_graph_sync)
        .bind(state.last_d1_sync)
        .bind(state.last_reconciliation)
        .bind(state.last_graph_feedback_sync)
        .bind(state.last_feedback_created_at)
        .bind(state.agents_synced as i64)
        .bind(state.embeddings_generated as i64)
        .bind(state.feedback_synced as i64)
        .bind(state.agents_deleted as i64)
        .bind(&state.last_error)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}
