//! `POST /agents/{id}/classify` and `GET /agents/{id}/classify` (§6): enqueue
//! a classification job, or read back its result (200 once completed, 202
//! while still pending/processing).

use std::str::FromStr;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use gateway_core::{AgentId, Classification, JobStatus};
use gateway_db::{ClassificationRepository, JobRepository};
use serde::{Deserialize, Serialize};

use crate::error::{error_codes, ApiError};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/:id/classify", post(enqueue_classification).get(read_classification))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ClassifyRequest {
    #[serde(default)]
    force: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EnqueueResponse {
    agent_id: String,
    status: &'static str,
}

async fn enqueue_classification(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<ClassifyRequest>>,
) -> Result<(StatusCode, Json<EnqueueResponse>), (StatusCode, Json<ApiError>)> {
    let agent_id = parse_agent_id(&id)?;
    let force = body.map(|Json(b)| b.force).unwrap_or(false);

    JobRepository::new(&state.pool).enqueue(&agent_id, force).await.map_err(|e| {
        (StatusCode::SERVICE_UNAVAILABLE, Json(ApiError::new(error_codes::SERVICE_UNAVAILABLE, e.to_string())))
    })?;

    Ok((StatusCode::ACCEPTED, Json(EnqueueResponse { agent_id: agent_id.to_string(), status: "pending" })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassificationStatusResponse {
    agent_id: String,
    status: &'static str,
    classification: Option<Classification>,
    last_error: Option<String>,
}

async fn read_classification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<ClassificationStatusResponse>), (StatusCode, Json<ApiError>)> {
    let agent_id = parse_agent_id(&id)?;

    let job = JobRepository::new(&state.pool).get(&agent_id).await.map_err(|e| {
        (StatusCode::SERVICE_UNAVAILABLE, Json(ApiError::new(error_codes::SERVICE_UNAVAILABLE, e.to_string())))
    })?;

    let classification = ClassificationRepository::new(&state.pool).get(&agent_id).await.map_err(|e| {
        (StatusCode::SERVICE_UNAVAILABLE, Json(ApiError::new(error_codes::SERVICE_UNAVAILABLE, e.to_string())))
    })?;

    let Some(job) = job else {
        return match classification {
            Some(c) => Ok((
                StatusCode::OK,
                Json(ClassificationStatusResponse {
                    agent_id: agent_id.to_string(),
                    status: "completed",
                    classification: Some(c),
                    last_error: None,
                }),
            )),
            None => Err((
                StatusCode::NOT_FOUND,
                Json(ApiError::new(error_codes::NOT_FOUND, format!("no classification job for {agent_id}"))),
            )),
        };
    };

    let (http_status, status_label) = match job.status {
        JobStatus::Completed => (StatusCode::OK, "completed"),
        JobStatus::Pending | JobStatus::Processing => (StatusCode::ACCEPTED, "pending"),
        JobStatus::Failed => (StatusCode::OK, "failed"),
    };

    Ok((
        http_status,
        Json(ClassificationStatusResponse {
            agent_id: agent_id.to_string(),
            status: status_label,
            classification,
            last_error: job.last_error,
        }),
    ))
}

fn parse_agent_id(id: &str) -> Result<AgentId, (StatusCode, Json<ApiError>)> {
    AgentId::from_str(id)
        .map_err(|e| (StatusCode::BAD_REQUEST, Json(ApiError::new(error_codes::VALIDATION_ERROR, e.to_string()))))
}
