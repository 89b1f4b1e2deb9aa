//! Errors surfaced by the upstream GraphQL client.

use thiserror::Error;

pub type UpstreamResult<T> = std::result::Result<T, UpstreamError>;

/// Failures talking to the chain indexer's GraphQL endpoint.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UpstreamError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("request to upstream indexer failed: {0}")]
    Request(String),

    /// Non-2xx HTTP status.
    #[error("upstream indexer returned status {status}: {body}")]
    Http { status: u16, body: String },

    /// The response body was not valid JSON, or not a `GraphQLResponse`.
    #[error("could not parse upstream indexer response: {0}")]
    Decode(String),

    /// The GraphQL response carried an `errors` array.
    #[error("upstream indexer returned GraphQL errors: {0}")]
    GraphQl(String),
}

impl From<UpstreamError> for gateway_core::GatewayError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Request(msg) => gateway_core::GatewayError::UpstreamTransient(msg),
            UpstreamError::Http { status, body } if status >= 500 || status == 429 => {
                gateway_core::GatewayError::UpstreamTransient(format!("HTTP {status}: {body}"))
            }
            UpstreamError::Http { status, body } => {
                gateway_core::GatewayError::UpstreamPermanent(format!("HTTP {status}: {body}"))
            }
            UpstreamError::Decode(msg) => gateway_core::GatewayError::UpstreamPermanent(msg),
            UpstreamError::GraphQl(msg) => gateway_core::GatewayError::UpstreamPermanent(msg),
        }
    }
}
