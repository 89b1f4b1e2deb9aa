//! Shared application state for all handlers, grounded on
//! `dashflow-registry::api::state::AppState`.

use std::sync::Arc;

use gateway_search::QueryPlanner;
use gateway_upstream::UpstreamClient;
use gateway_vector::VectorStoreAdapter;
use sqlx::PgPool;

use crate::rate_limit::{NoopRateLimiter, RateLimiter};

/// Confidence floor below which a skill/domain slug is not considered
/// "indexed" (§3) — shared by the taxonomy endpoint and anything else
/// that needs to reproduce the search index's own threshold.
pub const TAXONOMY_CONFIDENCE_THRESHOLD: f64 = gateway_core::SEARCH_CONFIDENCE_THRESHOLD;

#[derive(Clone)]
pub struct AppState {
    /// Relational store: classification/reputation/trust/job repositories.
    pub pool: PgPool,
    /// Vector store: the authoritative searchable agent index.
    pub vector_store: Arc<dyn VectorStoreAdapter>,
    /// HyDE + filter + rerank query engine shared by `/agents` and `/search`.
    pub planner: Arc<QueryPlanner>,
    /// Chain ids the gateway was configured to index (§4.0.2
    /// `CHAIN_RPC_URL_<chain_id>`), used to answer `GET /chains` without a
    /// relational "agents" table of its own.
    pub known_chain_ids: Arc<Vec<String>>,
    /// Upstream chain indexer client, used by the agent detail route to
    /// resolve creator-declared skills/domains live (§4.14's decision
    /// ledger entry on this route applies the same `pull_agents` + find-
    /// by-id shape `gateway-workers::classification_queue` already uses).
    pub upstream: Arc<UpstreamClient>,
    /// SSRF-hardened HTTP client shared with the Capability Fetcher
    /// (§4.4), reused here so the agent detail route can pull a live A2A
    /// capability card without re-deriving client construction.
    pub capability_client: reqwest::Client,
    /// Seam for ingress-side per-client throttling (§1/§6: rate limiting
    /// is out of scope for this gateway). Always the no-op implementation.
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub config: Arc<ServerConfig>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub max_body_size: usize,
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { max_body_size: 1024 * 1024, base_url: "http://127.0.0.1:8080".to_string() }
    }
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        vector_store: Arc<dyn VectorStoreAdapter>,
        planner: Arc<QueryPlanner>,
        known_chain_ids: Vec<String>,
        upstream: Arc<UpstreamClient>,
        capability_client: reqwest::Client,
        rate_limit_rpm_default: u32,
        config: ServerConfig,
    ) -> Self {
        Self {
            pool,
            vector_store,
            planner,
            known_chain_ids: Arc::new(known_chain_ids),
            upstream,
            capability_client,
            rate_limiter: Arc::new(NoopRateLimiter::new(rate_limit_rpm_default)),
            config: Arc::new(config),
        }
    }
}
