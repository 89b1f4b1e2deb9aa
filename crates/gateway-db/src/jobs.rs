//! Repository for `classification_jobs` (§3 "Classification Job", §4.9).

use gateway_core::{AgentId, ClassificationJob, JobStatus};
use sqlx::{PgPool, Row};

use crate::error::{DbError, DbResult};

pub struct JobRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> JobRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Enqueue a job for `agent_id`, resetting it to `pending` with zero
    /// attempts if one already exists (re-classification request).
    pub async fn enqueue(&self, agent_id: &AgentId, force: bool) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO classification_jobs (agent_id, force, attempts, status, last_error, updated_at)
            VALUES ($1, $2, 0, 'pending', NULL, now())
            ON CONFLICT (agent_id) DO UPDATE SET
                force = EXCLUDED.force,
                attempts = 0,
                status = 'pending',
                last_error = NULL,
                updated_at = now()
            "#,
        )
        .bind(agent_id.to_string())
        .bind(force)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, agent_id: &AgentId) -> DbResult<Option<ClassificationJob>> {
        let row = sqlx::query("SELECT agent_id, force, attempts, status, last_error FROM classification_jobs WHERE agent_id = $1")
            .bind(agent_id.to_string())
            .fetch_optional(self.pool)
            .await?;
        row.map(|row| row_to_job(&row)).transpose()
    }

    /// Oldest-first batch of pending jobs, capped at `limit`, enqueued for
    /// the scheduler's hourly classification batch (§4.15, cap 50).
    pub async fn fetch_pending(&self, limit: i64) -> DbResult<Vec<ClassificationJob>> {
        let rows = sqlx::query(
            "SELECT agent_id, force, attempts, status, last_error FROM classification_jobs \
             WHERE status = 'pending' ORDER BY updated_at ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        rows.iter().map(row_to_job).collect()
    }

    pub async fn save(&self, job: &ClassificationJob) -> DbResult<()> {
        sqlx::query(
            "UPDATE classification_jobs SET force = $2, attempts = $3, status = $4, last_error = $5, updated_at = now() \
             WHERE agent_id = $1",
        )
        .bind(job.agent_id.to_string())
        .bind(job.force)
        .bind(job.attempts as i32)
        .bind(status_to_str(job.status))
        .bind(&job.last_error)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Agent ids with no classification job row at all, for the
    /// scheduler's "enqueue unclassified agents" sweep (§4.9).
    pub async fn agent_ids_without_job(&self, agent_ids: &[AgentId], limit: i64) -> DbResult<Vec<AgentId>> {
        let ids: Vec<String> = agent_ids.iter().map(AgentId::to_string).collect();
        let rows = sqlx::query(
            "SELECT unnest($1::text[]) AS agent_id \
             EXCEPT SELECT agent_id FROM classification_jobs \
             LIMIT $2",
        )
        .bind(&ids)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                let agent_id: String = row.try_get("agent_id").map_err(DbError::from)?;
                agent_id.parse().map_err(|e: gateway_core::GatewayError| DbError::Invariant(e.to_string()))
            })
            .collect()
    }

    /// Reset every `processing` job back to `pending` (recovers jobs
    /// orphaned by a crashed consumer); used when the scheduler finds no
    /// new work (§4.9 `resetFailedJobs`).
    pub async fn reset_stuck_jobs(&self) -> DbResult<u64> {
        let result = sqlx::query("UPDATE classification_jobs SET status = 'pending', updated_at = now() WHERE status = 'processing'")
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn row_to_job(row: &sqlx::postgres::PgRow) -> DbResult<ClassificationJob> {
    let agent_id: String = row.try_get("agent_id").map_err(DbError::from)?;
    let agent_id: AgentId = agent_id.parse().map_err(|e: gateway_core::GatewayError| DbError::Invariant(e.to_string()))?;
    let status: String = row.try_get("status").map_err(DbError::from)?;

    Ok(ClassificationJob {
        agent_id,
        force: row.try_get("force").map_err(DbError::from)?,
        attempts: row.try_get::<i32, _>("attempts").map_err(DbError::from)? as u32,
        status: str_to_status(&status),
        last_error: row.try_get("last_error").map_err(DbError::from)?,
    })
}

fn status_to_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "pending",
        JobStatus::Processing => "processing",
        JobStatus::Completed => "completed",
        JobStatus::Failed => "failed",
    }
}

fn str_to_status(s: &str) -> JobStatus {
    match s {
        "processing" => JobStatus::Processing,
        "completed" => JobStatus::Completed,
        "failed" => JobStatus::Failed,
        _ => JobStatus::Pending,
    }
}
