//! The outer context object built once per process and passed by
//! reference into every worker (§9 "Cyclic / shared ownership" — workers
//! never capture the context, they receive it as an argument).

use std::sync::Arc;

use gateway_embeddings::EmbeddingClient;
use gateway_search::GenerativeProvider;
use gateway_upstream::UpstreamClient;
use gateway_vector::VectorStoreAdapter;
use sqlx::PgPool;

/// Shared handles for all sync workers. Constructed once at startup by
/// the `gateway` binary and held alongside the scheduler for the
/// lifetime of the process.
#[derive(Clone)]
pub struct AppContext {
    pub pool: PgPool,
    pub vector_store: Arc<dyn VectorStoreAdapter>,
    pub upstream: Arc<UpstreamClient>,
    pub capability_client: reqwest::Client,
    pub embeddings: Arc<EmbeddingClient>,
    /// LLM used by the classification consumer (§4.9). `None` disables
    /// classification entirely — jobs stay queued rather than failing.
    pub generative: Option<Arc<dyn GenerativeProvider>>,
    /// Cap on classification attempts before a job is abandoned to the
    /// dead-letter state (§4.9 "up to N attempts, then DLQ").
    pub classification_max_attempts: u32,
}

impl AppContext {
    pub fn new(
        pool: PgPool,
        vector_store: Arc<dyn VectorStoreAdapter>,
        upstream: Arc<UpstreamClient>,
        capability_client: reqwest::Client,
        embeddings: Arc<EmbeddingClient>,
        generative: Option<Arc<dyn GenerativeProvider>>,
    ) -> Self {
        Self {
            pool,
            vector_store,
            upstream,
            capability_client,
            embeddings,
            generative,
            classification_max_attempts: DEFAULT_CLASSIFICATION_MAX_ATTEMPTS,
        }
    }
}

pub const DEFAULT_CLASSIFICATION_MAX_ATTEMPTS: u32 = 3;
