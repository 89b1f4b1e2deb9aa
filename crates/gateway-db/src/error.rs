//! Errors surfaced by the relational store.

use thiserror::Error;

pub type DbResult<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DbError {
    #[error("database connection failed: {0}")]
    Connection(String),

    #[error("database query failed: {0}")]
    Query(String),

    #[error("row did not satisfy an expected invariant: {0}")]
    Invariant(String),

    #[error("could not (de)serialize a JSON column: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => DbError::Connection(err.to_string()),
            other => DbError::Query(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

impl From<DbError> for gateway_core::GatewayError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Connection(msg) => gateway_core::GatewayError::UpstreamTransient(msg),
            DbError::Query(msg) => gateway_core::GatewayError::UpstreamPermanent(msg),
            DbError::Invariant(msg) => gateway_core::GatewayError::Invariant(msg),
            DbError::Serialization(msg) => gateway_core::GatewayError::Serialization(msg),
        }
    }
}
