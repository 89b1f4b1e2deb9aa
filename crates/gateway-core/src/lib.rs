//! Domain types and pure-logic components for the agent discovery and
//! reputation gateway: the data model (§3), the Filter Compiler, the
//! Content Hasher, the Payload Builder, the Reputation Aggregator, the
//! Reachability Evaluator, and the pagination cursor codec.
//!
//! Nothing in this crate performs network or disk I/O — callers (workers,
//! the search service, the HTTP server) own the clients and feed data in.

pub mod agent;
pub mod classification;
pub mod classification_job;
pub mod cursor;
pub mod error;
pub mod feedback;
pub mod filter;
pub mod hash;
pub mod payload;
pub mod reachability;
pub mod reputation;
pub mod sync_meta;
pub mod sync_state;

pub use agent::{AgentId, AgentRecord, ScoredSlug, Slug, SEARCH_CONFIDENCE_THRESHOLD};
pub use classification::{Classification, ClassificationEntry, ClassificationSource};
pub use classification_job::{ClassificationJob, JobStatus};
pub use error::{GatewayError, Result};
pub use feedback::FeedbackEvent;
pub use filter::{compile as compile_filter, FilterMode, FilterTree, Predicate, StructuredFilter};
pub use payload::{build_payload, agent_id_from_point_id, Payload, PayloadEnrichment};
pub use reachability::Reachability;
pub use reputation::ReputationAggregate;
pub use sync_meta::{DiffBucket, SyncMetadata, SyncStatus};
pub use sync_state::SyncState;
