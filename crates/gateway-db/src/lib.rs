//! Relational store access: connection pool, inline schema, and one
//! repository per authoritative table (`agent_classifications`,
//! `agent_reputation`, `agent_trust_scores`, `feedback_events`,
//! `classification_jobs`, `sync_metadata`, and the singleton `sync_state`
//! row).
//!
//! `sqlx`'s compile-time query macros are deliberately not used (this
//! workspace is built without a live database to check queries against);
//! every query here goes through the runtime-checked `sqlx::query`
//! builder instead, row fields pulled out by name with `try_get`, the
//! same style `PostgresChunkStore::row_to_chunk` uses.

pub mod classifications;
pub mod error;
pub mod feedback;
pub mod jobs;
pub mod pool;
pub mod reputation;
pub mod schema;
pub mod sync_metadata;
pub mod sync_state;
pub mod trust;

pub use classifications::{ClassificationRepository, ClassificationRow, TaxonomyCounts, TaxonomyEntry};
pub use error::{DbError, DbResult};
pub use feedback::FeedbackRepository;
pub use jobs::JobRepository;
pub use pool::create_pool;
pub use reputation::{ReputationRepository, ReputationRow};
pub use schema::migrate;
pub use sync_metadata::SyncMetadataRepository;
pub use sync_state::SyncStateRepository;
pub use trust::{normalize_legacy_scale, TrustRepository, TrustRow};
