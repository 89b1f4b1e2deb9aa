//! Liveness/readiness routes, grounded on
//! `dashflow-registry::api::routes::health`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use gateway_vector::VectorStoreAdapter;
use serde::Serialize;
use tracing::{debug, warn};

use crate::state::AppState;

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check)).route("/ready", get(readiness_check)).route("/", get(root))
}

async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: "agent-gateway",
        version: env!("CARGO_PKG_VERSION"),
        description: "agent discovery and reputation gateway",
    })
}

#[derive(Serialize)]
struct ServiceInfo {
    name: &'static str,
    version: &'static str,
    description: &'static str,
}

#[derive(Serialize)]
struct HealthStatus {
    status: &'static str,
    timestamp: chrono::DateTime<chrono::Utc>,
}

async fn health_check() -> Json<HealthStatus> {
    Json(HealthStatus { status: "healthy", timestamp: chrono::Utc::now() })
}

#[derive(Serialize)]
struct ReadinessChecks {
    database: bool,
    vector_store: bool,
}

#[derive(Serialize)]
struct ReadinessStatus {
    ready: bool,
    checks: ReadinessChecks,
    errors: Option<Vec<String>>,
}

/// Exercises the database pool and the vector store so `/ready` fails
/// the moment either dependency in §6's "dependency liveness matrix" is
/// unreachable.
async fn readiness_check(
    State(state): State<AppState>,
) -> Result<Json<ReadinessStatus>, (StatusCode, Json<ReadinessStatus>)> {
    let mut checks = ReadinessChecks { database: false, vector_store: false };
    let mut errors = Vec::new();

    match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => {
            checks.database = true;
            debug!("database readiness check passed");
        }
        Err(e) => {
            let msg = format!("database check failed: {e}");
            warn!("{msg}");
            errors.push(msg);
        }
    }

    match state.vector_store.count(None).await {
        Ok(_) => {
            checks.vector_store = true;
            debug!("vector store readiness check passed");
        }
        Err(e) => {
            let msg = format!("vector store check failed: {e}");
            warn!("{msg}");
            errors.push(msg);
        }
    }

    let ready = checks.database && checks.vector_store;
    let status = ReadinessStatus { ready, checks, errors: if errors.is_empty() { None } else { Some(errors) } };

    if ready {
        Ok(Json(status))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(status)))
    }
}
