//! Route modules, one per resource (§6), grounded on
//! `dashflow-registry::api::routes::api_router`'s nesting shape.

pub mod agents;
pub mod chains;
pub mod classify;
pub mod health;
pub mod search;
pub mod taxonomy;

use axum::Router;

use crate::state::AppState;

/// Everything under the agent resource: listing/search, detail, and the
/// classification trigger share the `/agents` prefix (§6).
pub fn agents_router() -> Router<AppState> {
    Router::new().merge(agents::routes()).merge(classify::routes())
}
