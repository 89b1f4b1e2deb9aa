//! Repository for `agent_classifications` (§3 "Classification", §4.9).

use chrono::{DateTime, Utc};
use gateway_core::{AgentId, Classification, ClassificationEntry, ClassificationSource};
use sqlx::{PgPool, Row};

use crate::error::{DbError, DbResult};

pub struct ClassificationRepository<'a> {
    pool: &'a PgPool,
}

/// One classification row plus the `updated_at` watermark the
/// relational-to-vector sync worker polls against (§4.11).
pub struct ClassificationRow {
    pub agent_id: AgentId,
    pub classification: Classification,
    pub updated_at: DateTime<Utc>,
}

impl<'a> ClassificationRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, agent_id: &AgentId, classification: &Classification) -> DbResult<()> {
        let skills = serde_json::to_value(&classification.skills)?;
        let domains = serde_json::to_value(&classification.domains)?;
        let source = source_to_str(classification.source);

        sqlx::query(
            r#"
            INSERT INTO agent_classifications
                (agent_id, skills, domains, overall_confidence, source, model_version, classified_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, now())
            ON CONFLICT (agent_id) DO UPDATE SET
                skills = EXCLUDED.skills,
                domains = EXCLUDED.domains,
                overall_confidence = EXCLUDED.overall_confidence,
                source = EXCLUDED.source,
                model_version = EXCLUDED.model_version,
                classified_at = EXCLUDED.classified_at,
                updated_at = now()
            "#,
        )
        .bind(agent_id.to_string())
        .bind(skills)
        .bind(domains)
        .bind(classification.overall_confidence)
        .bind(source)
        .bind(&classification.model_version)
        .bind(classification.classified_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, agent_id: &AgentId) -> DbResult<Option<Classification>> {
        let row = sqlx::query(
            "SELECT skills, domains, overall_confidence, source, model_version, classified_at \
             FROM agent_classifications WHERE agent_id = $1",
        )
        .bind(agent_id.to_string())
        .fetch_optional(self.pool)
        .await?;

        row.map(|row| row_to_classification(&row)).transpose()
    }

    /// Rows whose `updated_at` is strictly after `since` (§4.11), used by
    /// the relational-to-vector sync worker's polling loop.
    pub async fn list_updated_since(&self, since: DateTime<Utc>) -> DbResult<Vec<ClassificationRow>> {
        let rows = sqlx::query(
            "SELECT agent_id, skills, domains, overall_confidence, source, model_version, classified_at, updated_at \
             FROM agent_classifications WHERE updated_at > $1 ORDER BY updated_at ASC",
        )
        .bind(since)
        .fetch_all(self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let agent_id: String = row.try_get("agent_id").map_err(DbError::from)?;
                let agent_id: AgentId =
                    agent_id.parse().map_err(|e: gateway_core::GatewayError| DbError::Invariant(e.to_string()))?;
                let classification = row_to_classification(row)?;
                let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(DbError::from)?;
                Ok(ClassificationRow { agent_id, classification, updated_at })
            })
            .collect()
    }

    /// Distinct slugs currently indexed for search (confidence >=
    /// `threshold`), with the number of agents carrying each — the data
    /// behind `GET /taxonomy` (§6).
    pub async fn taxonomy_counts(&self, threshold: f64) -> DbResult<TaxonomyCounts> {
        let skills = self.slug_counts("skills", threshold).await?;
        let domains = self.slug_counts("domains", threshold).await?;
        Ok(TaxonomyCounts { skills, domains })
    }

    async fn slug_counts(&self, column: &str, threshold: f64) -> DbResult<Vec<TaxonomyEntry>> {
        let sql = format!(
            "SELECT elem->>'slug' AS slug, COUNT(*) AS count \
             FROM agent_classifications, jsonb_array_elements({column}) AS elem \
             WHERE (elem->>'confidence')::double precision >= $1 \
             GROUP BY slug ORDER BY count DESC, slug ASC"
        );
        let rows = sqlx::query(&sql).bind(threshold).fetch_all(self.pool).await?;
        rows.iter()
            .map(|row| {
                Ok(TaxonomyEntry {
                    slug: row.try_get("slug").map_err(DbError::from)?,
                    count: row.try_get::<i64, _>("count").map_err(DbError::from)? as u64,
                })
            })
            .collect()
    }
}

/// One slug's indexed-agent count, by kind (§6 "Full skill/domain taxonomy").
pub struct TaxonomyEntry {
    pub slug: String,
    pub count: u64,
}

pub struct TaxonomyCounts {
    pub skills: Vec<TaxonomyEntry>,
    pub domains: Vec<TaxonomyEntry>,
}

fn row_to_classification(row: &sqlx::postgres::PgRow) -> DbResult<Classification> {
    let skills: serde_json::Value = row.try_get("skills").map_err(DbError::from)?;
    let domains: serde_json::Value = row.try_get("domains").map_err(DbError::from)?;
    let skills: Vec<ClassificationEntry> = serde_json::from_value(skills)?;
    let domains: Vec<ClassificationEntry> = serde_json::from_value(domains)?;
    let source: String = row.try_get("source").map_err(DbError::from)?;

    Ok(Classification {
        skills,
        domains,
        overall_confidence: row.try_get("overall_confidence").map_err(DbError::from)?,
        source: str_to_source(&source),
        model_version: row.try_get("model_version").map_err(DbError::from)?,
        classified_at: row.try_get("classified_at").map_err(DbError::from)?,
    })
}

fn source_to_str(source: ClassificationSource) -> &'static str {
    match source {
        ClassificationSource::None => "none",
        ClassificationSource::LlmClassification => "llm-classification",
        ClassificationSource::CreatorDefined => "creator-defined",
    }
}

fn str_to_source(s: &str) -> ClassificationSource {
    match s {
        "creator-defined" => ClassificationSource::CreatorDefined,
        "llm-classification" => ClassificationSource::LlmClassification,
        _ => ClassificationSource::None,
    }
}
