//! `POST /search` (§6): the same query engine as `GET /agents`, driven by
//! a JSON body instead of query-string parameters.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use gateway_search::{SearchRequest, SearchResponse};

use crate::error::{search_error_response, ApiError};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", post(search))
}

async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, (StatusCode, Json<ApiError>)> {
    let response = state.planner.search(&request).await.map_err(search_error_response)?;
    Ok(Json(response))
}
