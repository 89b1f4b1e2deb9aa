//! Repository for `agent_reputation` (§3, §4.7).

use chrono::{DateTime, Utc};
use gateway_core::{AgentId, ReputationAggregate};
use sqlx::{PgPool, Row};

use crate::error::{DbError, DbResult};

pub struct ReputationRepository<'a> {
    pool: &'a PgPool,
}

pub struct ReputationRow {
    pub agent_id: AgentId,
    pub aggregate: ReputationAggregate,
    pub updated_at: DateTime<Utc>,
}

impl<'a> ReputationRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, agent_id: &AgentId, aggregate: &ReputationAggregate) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO agent_reputation
                (agent_id, feedback_count, average_score, low, medium, high, last_calculated_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, now())
            ON CONFLICT (agent_id) DO UPDATE SET
                feedback_count = EXCLUDED.feedback_count,
                average_score = EXCLUDED.average_score,
                low = EXCLUDED.low,
                medium = EXCLUDED.medium,
                high = EXCLUDED.high,
                last_calculated_at = EXCLUDED.last_calculated_at,
                updated_at = now()
            "#,
        )
        .bind(agent_id.to_string())
        .bind(aggregate.feedback_count as i64)
        .bind(aggregate.average_score)
        .bind(aggregate.low as i64)
        .bind(aggregate.medium as i64)
        .bind(aggregate.high as i64)
        .bind(aggregate.last_calculated_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, agent_id: &AgentId) -> DbResult<Option<ReputationAggregate>> {
        let row = sqlx::query(
            "SELECT feedback_count, average_score, low, medium, high, last_calculated_at \
             FROM agent_reputation WHERE agent_id = $1",
        )
        .bind(agent_id.to_string())
        .fetch_optional(self.pool)
        .await?;

        row.map(|row| row_to_aggregate(&row)).transpose()
    }

    pub async fn list_updated_since(&self, since: DateTime<Utc>) -> DbResult<Vec<ReputationRow>> {
        let rows = sqlx::query(
            "SELECT agent_id, feedback_count, average_score, low, medium, high, last_calculated_at, updated_at \
             FROM agent_reputation WHERE updated_at > $1 ORDER BY updated_at ASC",
        )
        .bind(since)
        .fetch_all(self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let agent_id: String = row.try_get("agent_id").map_err(DbError::from)?;
                let agent_id: AgentId =
                    agent_id.parse().map_err(|e: gateway_core::GatewayError| DbError::Invariant(e.to_string()))?;
                let aggregate = row_to_aggregate(row)?;
                let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(DbError::from)?;
                Ok(ReputationRow { agent_id, aggregate, updated_at })
            })
            .collect()
    }
}

fn row_to_aggregate(row: &sqlx::postgres::PgRow) -> DbResult<ReputationAggregate> {
    let feedback_count: i64 = row.try_get("feedback_count").map_err(DbError::from)?;
    let low: i64 = row.try_get("low").map_err(DbError::from)?;
    let medium: i64 = row.try_get("medium").map_err(DbError::from)?;
    let high: i64 = row.try_get("high").map_err(DbError::from)?;

    Ok(ReputationAggregate {
        feedback_count: feedback_count as u64,
        average_score: row.try_get("average_score").map_err(DbError::from)?,
        low: low as u64,
        medium: medium as u64,
        high: high as u64,
        last_calculated_at: row.try_get("last_calculated_at").map_err(DbError::from)?,
    })
}
