//! Repository for the per-agent `sync_metadata` table (§3 "Sync
//! Metadata") — the hash-diff fence the Graph Sync Worker (§4.10) reads
//! and writes every run.

use gateway_core::sync_meta::SyncStatus;
use gateway_core::{AgentId, SyncMetadata};
use sqlx::{PgPool, Row};

use crate::error::{DbError, DbResult};

/// Reflects the host's bind-count ceiling (§5 "Bounded fan-out"); batched
/// reads/deletes chunk id lists at this size even though a single `ANY($1)`
/// array bind would not itself need it, to keep this repository's batching
/// behavior uniform with the other relational writers in this crate.
const BIND_CHUNK_SIZE: usize = 95;

pub struct SyncMetadataRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SyncMetadataRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, agent_id: &AgentId) -> DbResult<Option<SyncMetadata>> {
        let row = sqlx::query(
            "SELECT agent_id, embed_hash, content_hash, qdrant_synced_at, sync_status, needs_reembed, \
             last_error, d1_classification_at, d1_reputation_at, updated_at \
             FROM sync_metadata WHERE agent_id = $1",
        )
        .bind(agent_id.to_string())
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| row_to_metadata(&r)).transpose()
    }

    /// Batched lookup for §4.10 step 2 ("Load sync metadata for all
    /// returned IDs in batches"). Missing ids simply have no entry in the
    /// returned vec — callers treat that as the `Missing` bucket.
    pub async fn get_many(&self, agent_ids: &[AgentId]) -> DbResult<Vec<SyncMetadata>> {
        let mut results = Vec::with_capacity(agent_ids.len());
        for chunk in agent_ids.chunks(BIND_CHUNK_SIZE) {
            let ids: Vec<String> = chunk.iter().map(|a| a.to_string()).collect();
            let rows = sqlx::query(
                "SELECT agent_id, embed_hash, content_hash, qdrant_synced_at, sync_status, needs_reembed, \
                 last_error, d1_classification_at, d1_reputation_at, updated_at \
                 FROM sync_metadata WHERE agent_id = ANY($1)",
            )
            .bind(&ids)
            .fetch_all(self.pool)
            .await?;
            for row in rows {
                results.push(row_to_metadata(&row)?);
            }
        }
        Ok(results)
    }

    pub async fn upsert(&self, meta: &SyncMetadata) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_metadata (
                agent_id, embed_hash, content_hash, qdrant_synced_at, sync_status,
                needs_reembed, last_error, d1_classification_at, d1_reputation_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (agent_id) DO UPDATE SET
                embed_hash = EXCLUDED.embed_hash,
                content_hash = EXCLUDED.content_hash,
                qdrant_synced_at = EXCLUDED.qdrant_synced_at,
                sync_status = EXCLUDED.sync_status,
                needs_reembed = EXCLUDED.needs_reembed,
                last_error = EXCLUDED.last_error,
                d1_classification_at = EXCLUDED.d1_classification_at,
                d1_reputation_at = EXCLUDED.d1_reputation_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(meta.agent_id.to_string())
        .bind(&meta.embed_hash)
        .bind(&meta.content_hash)
        .bind(meta.qdrant_synced_at)
        .bind(status_to_str(meta.sync_status))
        .bind(meta.needs_reembed)
        .bind(&meta.last_error)
        .bind(meta.d1_classification_at)
        .bind(meta.d1_reputation_at)
        .bind(meta.updated_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Removes metadata rows for agent ids no longer present upstream
    /// (§4.13 reconciliation's `orphans = V \ G` cleanup).
    pub async fn delete_many(&self, agent_ids: &[AgentId]) -> DbResult<u64> {
        let mut deleted = 0u64;
        for chunk in agent_ids.chunks(BIND_CHUNK_SIZE) {
            let ids: Vec<String> = chunk.iter().map(|a| a.to_string()).collect();
            let result = sqlx::query("DELETE FROM sync_metadata WHERE agent_id = ANY($1)")
                .bind(&ids)
                .execute(self.pool)
                .await?;
            deleted += result.rows_affected();
        }
        Ok(deleted)
    }

    pub async fn all_agent_ids(&self) -> DbResult<Vec<AgentId>> {
        let rows = sqlx::query("SELECT agent_id FROM sync_metadata").fetch_all(self.pool).await?;
        rows.iter()
            .map(|r| {
                let raw: String = r.try_get("agent_id").map_err(DbError::from)?;
                raw.parse().map_err(|_| DbError::Invariant(format!("malformed agent_id in sync_metadata: {raw}")))
            })
            .collect()
    }
}

fn row_to_metadata(row: &sqlx::postgres::PgRow) -> DbResult<SyncMetadata> {
    let raw_id: String = row.try_get("agent_id").map_err(DbError::from)?;
    let agent_id: AgentId =
        raw_id.parse().map_err(|_| DbError::Invariant(format!("malformed agent_id in sync_metadata: {raw_id}")))?;
    let status_raw: String = row.try_get("sync_status").map_err(DbError::from)?;

    Ok(SyncMetadata {
        agent_id,
        embed_hash: row.try_get("embed_hash").map_err(DbError::from)?,
        content_hash: row.try_get("content_hash").map_err(DbError::from)?,
        qdrant_synced_at: row.try_get("qdrant_synced_at").map_err(DbError::from)?,
        sync_status: str_to_status(&status_raw)?,
        needs_reembed: row.try_get("needs_reembed").map_err(DbError::from)?,
        last_error: row.try_get("last_error").map_err(DbError::from)?,
        d1_classification_at: row.try_get("d1_classification_at").map_err(DbError::from)?,
        d1_reputation_at: row.try_get("d1_reputation_at").map_err(DbError::from)?,
        updated_at: row.try_get("updated_at").map_err(DbError::from)?,
    })
}

fn status_to_str(status: SyncStatus) -> &'static str {
    match status {
        SyncStatus::Synced => "synced",
        SyncStatus::Error => "error",
    }
}

fn str_to_status(raw: &str) -> DbResult<SyncStatus> {
    match raw {
        "synced" => Ok(SyncStatus::Synced),
        "error" => Ok(SyncStatus::Error),
        other => Err(DbError::Invariant(format!("unknown sync_status {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for status in [SyncStatus::Synced, SyncStatus::Error] {
            assert_eq!(str_to_status(status_to_str(status)).unwrap(), status);
        }
    }
}
