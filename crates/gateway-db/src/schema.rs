//! Inline schema + migration, mirroring `dashflow-registry::metadata`'s
//! `SCHEMA_SQL` constant and `migrate()` entry point.

use sqlx::PgPool;

use crate::error::{DbError, DbResult};

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS agent_classifications (
    agent_id            TEXT PRIMARY KEY,
    skills              JSONB NOT NULL DEFAULT '[]',
    domains             JSONB NOT NULL DEFAULT '[]',
    overall_confidence  DOUBLE PRECISION NOT NULL DEFAULT 0,
    source              TEXT NOT NULL DEFAULT 'none',
    model_version       TEXT,
    classified_at       TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS agent_reputation (
    agent_id            TEXT PRIMARY KEY,
    feedback_count      BIGINT NOT NULL DEFAULT 0,
    average_score       DOUBLE PRECISION NOT NULL DEFAULT 0,
    low                 BIGINT NOT NULL DEFAULT 0,
    medium              BIGINT NOT NULL DEFAULT 0,
    high                BIGINT NOT NULL DEFAULT 0,
    last_calculated_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS agent_trust_scores (
    agent_id    TEXT PRIMARY KEY,
    trust_score DOUBLE PRECISION NOT NULL DEFAULT 0,
    computed_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS feedback_events (
    external_id       TEXT PRIMARY KEY,
    agent_id          TEXT NOT NULL,
    chain_id          BIGINT NOT NULL,
    score             SMALLINT NOT NULL,
    tags              TEXT[] NOT NULL DEFAULT '{}',
    context           TEXT,
    uri               TEXT,
    submitter_address TEXT NOT NULL,
    created_at        TIMESTAMPTZ NOT NULL,
    transaction_hash  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS feedback_events_agent_id_idx ON feedback_events (agent_id);
CREATE INDEX IF NOT EXISTS feedback_events_created_at_idx ON feedback_events (created_at);

CREATE TABLE IF NOT EXISTS classification_jobs (
    agent_id    TEXT PRIMARY KEY,
    force       BOOLEAN NOT NULL DEFAULT false,
    attempts    INTEGER NOT NULL DEFAULT 0,
    status      TEXT NOT NULL DEFAULT 'pending',
    last_error  TEXT,
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS classification_jobs_status_idx ON classification_jobs (status);

CREATE TABLE IF NOT EXISTS sync_metadata (
    agent_id              TEXT PRIMARY KEY,
    embed_hash             TEXT NOT NULL,
    content_hash            TEXT NOT NULL,
    qdrant_synced_at        TIMESTAMPTZ,
    sync_status             TEXT NOT NULL DEFAULT 'synced',
    needs_reembed           BOOLEAN NOT NULL DEFAULT false,
    last_error              TEXT,
    d1_classification_at    TIMESTAMPTZ,
    d1_reputation_at        TIMESTAMPTZ,
    updated_at              TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS sync_metadata_needs_reembed_idx ON sync_metadata (needs_reembed) WHERE needs_reembed;

CREATE TABLE IF NOT EXISTS sync_state (
    id                         SMALLINT PRIMARY KEY DEFAULT 1 CHECK (id = 1),
    last_graph_sync            TIMESTAMPTZ,
    last_d1_sync               TIMESTAMPTZ,
    last_reconciliation        TIMESTAMPTZ,
    last_graph_feedback_sync   TIMESTAMPTZ,
    last_feedback_created_at   TIMESTAMPTZ,
    agents_synced              BIGINT NOT NULL DEFAULT 0,
    embeddings_generated       BIGINT NOT NULL DEFAULT 0,
    feedback_synced            BIGINT NOT NULL DEFAULT 0,
    agents_deleted             BIGINT NOT NULL DEFAULT 0,
    last_error                 TEXT
);
"#;

/// Apply the schema idempotently. Unlike a migration-framework-driven
/// setup, this is a single `CREATE TABLE IF NOT EXISTS` batch run at
/// startup, matching `PostgresMetadataStore::migrate`'s shape.
pub async fn migrate(pool: &PgPool) -> DbResult<()> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await.map_err(DbError::from)?;
    Ok(())
}
