use thiserror::Error;

pub type VectorResult<T> = std::result::Result<T, VectorError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VectorError {
    #[error("vector store request failed: {0}")]
    Store(String),
}

impl From<VectorError> for gateway_core::GatewayError {
    fn from(err: VectorError) -> Self {
        gateway_core::GatewayError::UpstreamTransient(err.to_string())
    }
}
