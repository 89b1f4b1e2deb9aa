//! Repository for `feedback_events` (§3 "Feedback Event", §4.7, §4.8, §4.12).

use chrono::{DateTime, Utc};
use gateway_core::reachability::ReachabilityProbe;
use gateway_core::{AgentId, FeedbackEvent};
use sqlx::{PgPool, Row};

use crate::error::{DbError, DbResult};

pub struct FeedbackRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> FeedbackRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert the event unless its `external_id` already exists (I5).
    /// Returns `true` if a new row was inserted.
    pub async fn insert_if_new(&self, event: &FeedbackEvent) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO feedback_events
                (external_id, agent_id, chain_id, score, tags, context, uri, submitter_address, created_at, transaction_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (external_id) DO NOTHING
            "#,
        )
        .bind(&event.external_id)
        .bind(event.agent_id.to_string())
        .bind(event.chain_id as i64)
        .bind(event.score as i16)
        .bind(&event.tags)
        .bind(&event.context)
        .bind(&event.uri)
        .bind(&event.submitter_address)
        .bind(event.created_at)
        .bind(&event.transaction_hash)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Every score recorded for an agent, oldest first — the input to
    /// `ReputationAggregate::recompute` (§4.7 "Full recompute").
    pub async fn scores_for_agent(&self, agent_id: &AgentId) -> DbResult<Vec<u8>> {
        let rows = sqlx::query("SELECT score FROM feedback_events WHERE agent_id = $1 ORDER BY created_at ASC")
            .bind(agent_id.to_string())
            .fetch_all(self.pool)
            .await?;
        rows.iter()
            .map(|row| row.try_get::<i16, _>("score").map(|s| s as u8).map_err(DbError::from))
            .collect()
    }

    /// Feedback from the last `window` ending at `now`, as reachability
    /// probes (§4.8).
    pub async fn recent_probes_for_agent(
        &self,
        agent_id: &AgentId,
        since: DateTime<Utc>,
    ) -> DbResult<Vec<ReachabilityProbe>> {
        let rows = sqlx::query("SELECT tags, score, created_at FROM feedback_events WHERE agent_id = $1 AND created_at >= $2")
            .bind(agent_id.to_string())
            .bind(since)
            .fetch_all(self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(ReachabilityProbe {
                    tags: row.try_get::<Vec<String>, _>("tags").map_err(DbError::from)?,
                    score: row.try_get::<i16, _>("score").map_err(DbError::from)? as u8,
                    created_at: row.try_get("created_at").map_err(DbError::from)?,
                })
            })
            .collect()
    }

    /// Every agent with at least one feedback row, for the recompute-all
    /// path (§4.7 "Recompute-all").
    pub async fn distinct_agent_ids(&self) -> DbResult<Vec<AgentId>> {
        let rows = sqlx::query("SELECT DISTINCT agent_id FROM feedback_events").fetch_all(self.pool).await?;
        rows.iter()
            .map(|row| {
                let agent_id: String = row.try_get("agent_id").map_err(DbError::from)?;
                agent_id.parse().map_err(|e: gateway_core::GatewayError| DbError::Invariant(e.to_string()))
            })
            .collect()
    }
}
