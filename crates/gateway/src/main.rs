//! Agent discovery and reputation gateway: process entry point.
//!
//! Loads configuration from the environment, wires every crate's shared
//! handles into one [`gateway_workers::AppContext`] / [`gateway_server::AppState`]
//! pair, then runs the HTTP API and the background sync scheduler side by
//! side until a shutdown signal arrives. Grounded on
//! `dashflow-registry/src/bin/registry_server.rs`'s `EnvConfig::from_env` /
//! `init_tracing` / graceful-shutdown shape.

mod config;

use std::process::ExitCode;
use std::sync::Arc;

use gateway_embeddings::{EmbeddingClient, OpenAiEmbeddingProvider};
use gateway_search::{HttpReranker, NoopReranker, OpenAiGenerativeProvider, QueryPlanner, Reranker};
use gateway_upstream::UpstreamClient;
use gateway_vector::QdrantVectorStore;
use gateway_workers::AppContext;
use qdrant_client::Qdrant;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::AppConfig;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("agent_gateway=info"));

    let json = std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        let _ = registry.with(fmt::layer().json()).try_init();
    } else {
        let _ = registry.with(fmt::layer().with_target(true)).try_init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("fatal: {err}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing();

    info!(version = env!("CARGO_PKG_VERSION"), "agent gateway starting");
    info!(
        chains = config.chain_rpc_urls.len(),
        hyde_enabled = config.hyde_enabled,
        reranker_enabled = config.reranker_enabled,
        "configuration loaded"
    );

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "fatal startup error");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let pool = gateway_db::create_pool(&config.database_url).await?;
    info!("running database migrations");
    gateway_db::migrate(&pool).await?;

    let qdrant = Qdrant::from_url(&config.qdrant_url).build()?;
    let vector_store: Arc<dyn gateway_vector::VectorStoreAdapter> =
        Arc::new(QdrantVectorStore::new(Arc::new(qdrant), config.qdrant_collection.clone()));

    let primary_embeddings: Arc<dyn gateway_embeddings::EmbeddingProvider> =
        Arc::new(OpenAiEmbeddingProvider::new("primary", config.embedding_api_key.clone(), "text-embedding-3-small"));
    let fallback_embeddings: Option<Arc<dyn gateway_embeddings::EmbeddingProvider>> =
        config.embedding_fallback_api_key.clone().map(|key| {
            Arc::new(OpenAiEmbeddingProvider::new("fallback", key, "text-embedding-3-small"))
                as Arc<dyn gateway_embeddings::EmbeddingProvider>
        });
    let embeddings = Arc::new(EmbeddingClient::new(primary_embeddings, fallback_embeddings));

    let upstream = Arc::new(UpstreamClient::new(config.upstream_graphql_url.clone()));

    let capability_client = reqwest::Client::builder().timeout(std::time::Duration::from_secs(10)).build()?;

    let generative: Option<Arc<dyn gateway_search::GenerativeProvider>> = config
        .classification_llm_key
        .clone()
        .map(|key| Arc::new(OpenAiGenerativeProvider::new(key, config.hyde_model.clone())) as Arc<dyn gateway_search::GenerativeProvider>);

    let reranker: Arc<dyn Reranker> = match (&config.reranker_url, config.reranker_enabled) {
        (Some(url), true) => Arc::new(HttpReranker::new(url.clone())),
        _ => Arc::new(NoopReranker),
    };

    let planner = Arc::new(QueryPlanner::new(
        vector_store.clone(),
        embeddings.clone(),
        generative.clone(),
        reranker,
        config.hyde_enabled,
        config.reranker_enabled,
    ));

    let ctx = AppContext::new(pool.clone(), vector_store.clone(), upstream.clone(), capability_client.clone(), embeddings, generative);

    let server_config = gateway_server::ServerConfig { max_body_size: 2 * 1024 * 1024, base_url: config.base_url() };

    let state = gateway_server::AppState::new(
        pool,
        vector_store,
        planner,
        config.chain_rpc_urls.keys().cloned().collect(),
        upstream,
        capability_client,
        config.rate_limit_rpm_default,
        server_config,
    );

    let router = gateway_server::build_router(state);
    let api_config = gateway_server::ApiConfig { bind_addr: config.bind_addr()? };

    info!(addr = %api_config.bind_addr, "starting HTTP API and sync scheduler");

    let scheduler = tokio::spawn(gateway_workers::scheduler::run(ctx));
    let server = gateway_server::serve(router, api_config);

    tokio::select! {
        result = server => result?,
        _ = scheduler => info!("scheduler task exited"),
    }

    Ok(())
}
