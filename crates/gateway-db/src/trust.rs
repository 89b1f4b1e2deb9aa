//! Repository for `agent_trust_scores` (§3 glossary "Trust score"): an
//! externally computed 0-100 score propagated into the payload.

use chrono::{DateTime, Utc};
use gateway_core::AgentId;
use sqlx::{PgPool, Row};

use crate::error::{DbError, DbResult};

pub struct TrustRepository<'a> {
    pool: &'a PgPool,
}

pub struct TrustRow {
    pub agent_id: AgentId,
    pub trust_score: f64,
    pub updated_at: DateTime<Utc>,
}

impl<'a> TrustRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, agent_id: &AgentId, trust_score: f64, computed_at: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO agent_trust_scores (agent_id, trust_score, computed_at, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (agent_id) DO UPDATE SET
                trust_score = EXCLUDED.trust_score,
                computed_at = EXCLUDED.computed_at,
                updated_at = now()
            "#,
        )
        .bind(agent_id.to_string())
        .bind(trust_score)
        .bind(computed_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, agent_id: &AgentId) -> DbResult<Option<f64>> {
        let row = sqlx::query("SELECT trust_score FROM agent_trust_scores WHERE agent_id = $1")
            .bind(agent_id.to_string())
            .fetch_optional(self.pool)
            .await?;
        row.map(|row| row.try_get::<f64, _>("trust_score").map_err(DbError::from)).transpose()
    }

    pub async fn list_updated_since(&self, since: DateTime<Utc>) -> DbResult<Vec<TrustRow>> {
        let rows = sqlx::query(
            "SELECT agent_id, trust_score, updated_at FROM agent_trust_scores \
             WHERE updated_at > $1 ORDER BY updated_at ASC",
        )
        .bind(since)
        .fetch_all(self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let agent_id: String = row.try_get("agent_id").map_err(DbError::from)?;
                let agent_id: AgentId =
                    agent_id.parse().map_err(|e: gateway_core::GatewayError| DbError::Invariant(e.to_string()))?;
                Ok(TrustRow {
                    agent_id,
                    trust_score: row.try_get("trust_score").map_err(DbError::from)?,
                    updated_at: row.try_get("updated_at").map_err(DbError::from)?,
                })
            })
            .collect()
    }
}

/// Legacy trust/reputation values on a 1-5 scale surface as `<= 5`;
/// normalize to 0-100 by scaling, else treat as already 0-100 (§4.11).
pub fn normalize_legacy_scale(average_score: f64) -> i64 {
    let normalized = if average_score <= 5.0 { average_score * 20.0 } else { average_score };
    normalized.round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scales_legacy_1_to_5_values() {
        assert_eq!(normalize_legacy_scale(4.5), 90);
        assert_eq!(normalize_legacy_scale(5.0), 100);
    }

    #[test]
    fn leaves_0_to_100_values_untouched() {
        assert_eq!(normalize_legacy_scale(77.4), 77);
        assert_eq!(normalize_legacy_scale(6.0), 6);
    }
}
