//! `GET /chains` (§6): per-chain indexed agent counts, over the chain ids
//! the gateway was configured to index (§4.0.2).

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use gateway_core::StructuredFilter;
use serde::Serialize;

use crate::error::{error_codes, ApiError};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(list_chains))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChainSummary {
    chain_id: String,
    agent_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChainsResponse {
    chains: Vec<ChainSummary>,
}

async fn list_chains(State(state): State<AppState>) -> Result<Json<ChainsResponse>, (StatusCode, Json<ApiError>)> {
    let mut chains = Vec::with_capacity(state.known_chain_ids.len());

    for chain_id in state.known_chain_ids.iter() {
        let parsed: Option<u64> = chain_id.parse().ok();
        let filter = StructuredFilter { chain_id: parsed, ..Default::default() };
        let compiled = gateway_core::compile_filter(&filter, chrono::Utc::now());

        let agent_count = state.vector_store.count(compiled.as_ref()).await.map_err(|e| {
            (StatusCode::SERVICE_UNAVAILABLE, Json(ApiError::new(error_codes::SERVICE_UNAVAILABLE, e.to_string())))
        })?;

        chains.push(ChainSummary { chain_id: chain_id.clone(), agent_count });
    }

    Ok(Json(ChainsResponse { chains }))
}
