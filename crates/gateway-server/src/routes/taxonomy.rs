//! `GET /taxonomy?type=skill|domain|all` (§6): distinct indexed skill/domain
//! slugs with their agent counts, at the same confidence floor the search
//! index itself uses.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use gateway_db::{ClassificationRepository, TaxonomyEntry};
use serde::{Deserialize, Serialize};

use crate::error::{error_codes, ApiError};
use crate::state::{AppState, TAXONOMY_CONFIDENCE_THRESHOLD};

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(taxonomy))
}

#[derive(Debug, Deserialize)]
struct TaxonomyQuery {
    #[serde(rename = "type", default)]
    kind: TaxonomyKind,
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum TaxonomyKind {
    Skill,
    Domain,
    #[default]
    All,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaxonomyEntryView {
    slug: String,
    count: u64,
}

impl From<TaxonomyEntry> for TaxonomyEntryView {
    fn from(entry: TaxonomyEntry) -> Self {
        Self { slug: entry.slug, count: entry.count }
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct TaxonomyResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    skills: Option<Vec<TaxonomyEntryView>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    domains: Option<Vec<TaxonomyEntryView>>,
}

async fn taxonomy(
    State(state): State<AppState>,
    Query(params): Query<TaxonomyQuery>,
) -> Result<Json<TaxonomyResponse>, (StatusCode, Json<ApiError>)> {
    let counts = ClassificationRepository::new(&state.pool)
        .taxonomy_counts(TAXONOMY_CONFIDENCE_THRESHOLD)
        .await
        .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, Json(ApiError::new(error_codes::SERVICE_UNAVAILABLE, e.to_string()))))?;

    let mut response = TaxonomyResponse::default();
    if matches!(params.kind, TaxonomyKind::Skill | TaxonomyKind::All) {
        response.skills = Some(counts.skills.into_iter().map(TaxonomyEntryView::from).collect());
    }
    if matches!(params.kind, TaxonomyKind::Domain | TaxonomyKind::All) {
        response.domains = Some(counts.domains.into_iter().map(TaxonomyEntryView::from).collect());
    }

    Ok(Json(response))
}
