//! Error taxonomy shared by the gateway core.
//!
//! Variants are named by failure *kind*, matching the classification in the
//! error handling design: validation, upstream-transient, upstream-permanent,
//! not-found, partial, fatal and unexpected.

use thiserror::Error;

/// Gateway result type.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors surfaced by core (non-networked) gateway logic.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// Malformed input rejected at a boundary (HTTP request, filter, config).
    #[error("validation error: {0}")]
    Validation(String),

    /// The referenced agent does not exist in the authoritative source.
    #[error("agent not found: {0}")]
    NotFound(String),

    /// A dependency failed in a way that is expected to be transient.
    #[error("upstream transient error: {0}")]
    UpstreamTransient(String),

    /// A dependency rejected the request permanently (4xx, schema mismatch).
    #[error("upstream permanent error: {0}")]
    UpstreamPermanent(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Hashing/canonicalization failure.
    #[error("hashing error: {0}")]
    Hashing(String),

    /// Cursor could not be decoded.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// An invariant the caller relies on was violated.
    #[error("invariant violation: {0}")]
    Invariant(String),
}

impl GatewayError {
    /// The error-code string used in the HTTP error envelope (§6).
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Validation(_) => "VALIDATION_ERROR",
            GatewayError::NotFound(_) => "NOT_FOUND",
            GatewayError::UpstreamTransient(_) => "SERVICE_UNAVAILABLE",
            GatewayError::UpstreamPermanent(_) => "INTERNAL_ERROR",
            GatewayError::Serialization(_) => "VALIDATION_ERROR",
            GatewayError::Hashing(_) => "INTERNAL_ERROR",
            GatewayError::InvalidCursor(_) => "VALIDATION_ERROR",
            GatewayError::Invariant(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_maps_not_found_to_404_family() {
        let err = GatewayError::NotFound("11155111:1".to_string());
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn display_includes_message() {
        let err = GatewayError::Validation("missing chain_id".to_string());
        assert_eq!(err.to_string(), "validation error: missing chain_id");
    }
}
