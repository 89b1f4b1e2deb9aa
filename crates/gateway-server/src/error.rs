//! HTTP error envelope (§6 "Error envelope") and the error-code constants
//! it draws from, grounded on `dashflow-registry::api::types::ApiError` /
//! `error_codes`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::middleware::RequestId;

/// `{success:false, error, code, requestId}` (§6). `success` is always
/// `false` on this type; the handler's `Ok` branch carries its own
/// envelope shape instead.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub success: bool,
    pub error: String,
    pub code: &'static str,
    pub request_id: Option<String>,
}

impl ApiError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self { success: false, error: message.into(), code, request_id: None }
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }
}

pub mod error_codes {
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const RATE_LIMIT_EXCEEDED: &str = "RATE_LIMIT_EXCEEDED";
    pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Maps a [`gateway_core::GatewayError`] to its HTTP status and error
/// envelope (§7's taxonomy table: validation -> 400, not-found -> 404,
/// upstream-transient -> 503, everything else -> 500).
pub fn gateway_error_response(err: &gateway_core::GatewayError, request_id: Option<String>) -> (StatusCode, Json<ApiError>) {
    let status = match err.code() {
        error_codes::VALIDATION_ERROR => StatusCode::BAD_REQUEST,
        error_codes::NOT_FOUND => StatusCode::NOT_FOUND,
        error_codes::SERVICE_UNAVAILABLE => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = ApiError::new(err.code(), err.to_string()).with_request_id(request_id);
    (status, Json(body))
}

pub fn gateway_error_response_axum(err: gateway_core::GatewayError, request_id: Option<String>) -> Response {
    let (status, body) = gateway_error_response(&err, request_id);
    (status, body).into_response()
}

/// Maps a [`gateway_search::SearchError`] the same way `/agents` and
/// `/search` both need it mapped, since the planner is the shared entry
/// point behind both routes.
pub fn search_error_response(err: gateway_search::SearchError) -> (StatusCode, Json<ApiError>) {
    let gateway_err: gateway_core::GatewayError = err.into();
    gateway_error_response(&gateway_err, None)
}

/// A thin wrapper so route handlers can `?` a [`gateway_core::GatewayError`]
/// (or one of the other crates' errors, via `From`) straight into a
/// response; the request id is attached by [`crate::middleware::request_id_middleware`]
/// and re-read from the extension at the point the error is converted.
pub struct HandlerError {
    pub error: gateway_core::GatewayError,
    pub request_id: Option<String>,
}

impl HandlerError {
    pub fn new(error: gateway_core::GatewayError, request_id: Option<RequestId>) -> Self {
        Self { error, request_id: request_id.map(|r| r.0) }
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        gateway_error_response_axum(self.error, self.request_id)
    }
}
