//! Agent listing/search and detail routes (§6 `GET /agents`, `GET
//! /agents/{chain:token}`), grounded on
//! `dashflow-registry::api::routes::packages`'s handler shape (state
//! extraction, `Result<Json<_>, (StatusCode, Json<ApiError>)>` returns).

use std::str::FromStr;

use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use gateway_capability::fetch_a2a_agent_card;
use gateway_core::{AgentId, Classification, ClassificationEntry, ClassificationSource};
use gateway_db::ClassificationRepository;
use gateway_search::SearchResponse;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{error_codes, search_error_response, ApiError};
use crate::query::parse_agents_query;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(list_agents)).route("/:id", get(agent_detail))
}

async fn list_agents(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Result<Json<SearchResponse>, (StatusCode, Json<ApiError>)> {
    let request = parse_agents_query(raw.as_deref().unwrap_or(""))
        .map_err(|e| (StatusCode::BAD_REQUEST, Json(ApiError::new(error_codes::VALIDATION_ERROR, e.to_string()))))?;

    let response = state.planner.search(&request).await.map_err(search_error_response)?;
    Ok(Json(response))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AgentDetail {
    #[serde(flatten)]
    payload: BTreeMap<String, Value>,
    classification: Option<ClassificationView>,
    capability_card: Option<CapabilityCardView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassificationView {
    skills: Vec<ClassificationEntry>,
    domains: Vec<ClassificationEntry>,
    overall_confidence: f64,
    source: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CapabilityCardView {
    input_modes: Vec<String>,
    output_modes: Vec<String>,
    skill_names: Vec<String>,
    success: bool,
    error: Option<String>,
}

/// `GET /agents/{chain:token}` (§6). Starts from the indexed payload, then
/// layers on two things the list view doesn't carry: a live A2A
/// capability card fetch, and classification priority resolution between
/// the agent's own creator-declared skills/domains (pulled live from the
/// upstream indexer, the same `pull_agents` + find-by-id shape
/// `gateway-workers::classification_queue` already uses to build its LLM
/// prompt) and the stored LLM classification (§3 "creator-defined > llm
/// > none").
async fn agent_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AgentDetail>, (StatusCode, Json<ApiError>)> {
    let agent_id = AgentId::from_str(&id)
        .map_err(|e| (StatusCode::BAD_REQUEST, Json(ApiError::new(error_codes::VALIDATION_ERROR, e.to_string()))))?;

    let mut hits = state.vector_store.get_by_ids(&[agent_id.clone()]).await.map_err(|e| {
        (StatusCode::SERVICE_UNAVAILABLE, Json(ApiError::new(error_codes::SERVICE_UNAVAILABLE, e.to_string())))
    })?;

    let (_, payload) = hits
        .pop()
        .ok_or_else(|| (StatusCode::NOT_FOUND, Json(ApiError::new(error_codes::NOT_FOUND, format!("agent not found: {agent_id}")))))?;

    let stored = ClassificationRepository::new(&state.pool)
        .get(&agent_id)
        .await
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, Json(ApiError::new(error_codes::SERVICE_UNAVAILABLE, e.to_string()))))?;

    let declared = fetch_declared_classification(&state, &agent_id).await;

    let classification = match (declared, stored) {
        (Some(declared), Some(stored)) => Some(declared.resolve_priority(stored)),
        (Some(declared), None) => Some(declared),
        (None, Some(stored)) => Some(stored),
        (None, None) => None,
    };

    let has_a2a = payload.get("has_a2a").and_then(Value::as_bool).unwrap_or(false);
    let a2a_endpoint = payload.get("a2a_endpoint").and_then(Value::as_str).unwrap_or("");

    let capability_card = if has_a2a && !a2a_endpoint.is_empty() {
        let result = fetch_a2a_agent_card(&state.capability_client, a2a_endpoint).await;
        Some(CapabilityCardView {
            input_modes: result.input_modes,
            output_modes: result.output_modes,
            skill_names: result.skill_names,
            success: result.success,
            error: result.error,
        })
    } else {
        None
    };

    Ok(Json(AgentDetail {
        payload,
        classification: classification.map(|c| ClassificationView {
            skills: c.skills,
            domains: c.domains,
            overall_confidence: c.overall_confidence,
            source: source_label(c.source),
        }),
        capability_card,
    }))
}

/// Builds a creator-defined `Classification` straight from the agent's
/// upstream-declared skill/domain slugs, at confidence 1.0 (the upstream
/// record carries no per-slug confidence of its own; declared slugs are
/// treated as already validated, since no OASF taxonomy document fetcher
/// exists in this crate — see `DESIGN.md`). Returns `None` if the agent
/// can't be found upstream or declares nothing.
async fn fetch_declared_classification(state: &AppState, agent_id: &AgentId) -> Option<Classification> {
    let pull = gateway_upstream::pull_agents(&state.upstream).await.ok()?;
    let record = pull.agents.into_iter().find(|p| &p.record.id == agent_id)?.record;

    if record.declared_skills.is_empty() && record.declared_domains.is_empty() {
        return None;
    }

    let to_entries = |slugs: Vec<String>| -> Vec<ClassificationEntry> {
        slugs.into_iter().map(|slug| ClassificationEntry { slug, confidence: 1.0, reasoning: None }).collect()
    };

    Some(Classification {
        skills: to_entries(record.declared_skills),
        domains: to_entries(record.declared_domains),
        overall_confidence: 1.0,
        source: ClassificationSource::CreatorDefined,
        model_version: None,
        classified_at: record.updated_at,
    })
}

fn source_label(source: ClassificationSource) -> &'static str {
    match source {
        ClassificationSource::CreatorDefined => "creator-defined",
        ClassificationSource::LlmClassification => "llm-classification",
        ClassificationSource::None => "none",
    }
}
