//! Errors surfaced by the search service.

use thiserror::Error;

pub type SearchResult<T> = std::result::Result<T, SearchError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SearchError {
    #[error("invalid search request: {0}")]
    Validation(String),

    #[error("vector store error: {0}")]
    Vector(String),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("generative provider error: {0}")]
    Generative(String),

    #[error("reranker error: {0}")]
    Reranker(String),
}

impl From<gateway_vector::VectorError> for SearchError {
    fn from(err: gateway_vector::VectorError) -> Self {
        SearchError::Vector(err.to_string())
    }
}

impl From<gateway_embeddings::EmbeddingError> for SearchError {
    fn from(err: gateway_embeddings::EmbeddingError) -> Self {
        SearchError::Embedding(err.to_string())
    }
}

impl From<SearchError> for gateway_core::GatewayError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Validation(msg) => gateway_core::GatewayError::Validation(msg),
            SearchError::Vector(msg) | SearchError::Embedding(msg) => {
                gateway_core::GatewayError::UpstreamTransient(msg)
            }
            SearchError::Generative(msg) | SearchError::Reranker(msg) => {
                gateway_core::GatewayError::UpstreamPermanent(msg)
            }
        }
    }
}
