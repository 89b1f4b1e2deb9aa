use thiserror::Error;

pub type EmbeddingResult<T> = std::result::Result<T, EmbeddingError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EmbeddingError {
    #[error("no embedding provider configured")]
    NoProviderConfigured,

    #[error("primary provider failed: {primary}; fallback provider failed: {fallback}")]
    BothProvidersFailed { primary: String, fallback: String },

    #[error("embedding provider returned {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },

    #[error("embedding provider request failed: {0}")]
    Provider(String),
}

impl From<EmbeddingError> for gateway_core::GatewayError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::NoProviderConfigured => {
                gateway_core::GatewayError::Invariant(err.to_string())
            }
            _ => gateway_core::GatewayError::UpstreamTransient(err.to_string()),
        }
    }
}
