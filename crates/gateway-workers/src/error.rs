//! Per-worker error accumulation (§7 "Sync workers never surface
//! per-record errors; they accumulate an `errors` list and continue").

use gateway_core::AgentId;
use thiserror::Error;

/// A single record-level failure recorded by a worker run. Never aborts
/// the run on its own; the worker logs it, counts it, and moves on.
#[derive(Debug, Clone)]
pub struct WorkerError {
    pub agent_id: Option<AgentId>,
    pub message: String,
}

impl WorkerError {
    pub fn new(agent_id: Option<AgentId>, message: impl Into<String>) -> Self {
        Self { agent_id, message: message.into() }
    }
}

impl std::fmt::Display for WorkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.agent_id {
            Some(id) => write!(f, "{id}: {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// A worker-level exception (§7 "A worker-level exception causes the
/// worker to abort its run, record the failure in sync state, and allow
/// the next scheduled invocation to retry").
#[derive(Debug, Error)]
pub enum RunError {
    #[error("database error: {0}")]
    Db(#[from] gateway_db::error::DbError),
    #[error("upstream error: {0}")]
    Upstream(#[from] gateway_upstream::UpstreamError),
    #[error("vector store error: {0}")]
    Vector(#[from] gateway_vector::VectorError),
    #[error("gateway error: {0}")]
    Gateway(#[from] gateway_core::GatewayError),
}

pub type RunResult<T> = Result<T, RunError>;
