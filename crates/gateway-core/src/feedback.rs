//! Immutable feedback events (§3 "Feedback Event").

use crate::agent::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One immutable feedback submission against an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    /// Stable external identifier, used for dedupe (I5).
    pub external_id: String,
    pub agent_id: AgentId,
    pub chain_id: u64,
    pub score: u8,
    pub tags: Vec<String>,
    pub context: Option<String>,
    pub uri: Option<String>,
    pub submitter_address: String,
    pub created_at: DateTime<Utc>,
    pub transaction_hash: String,
}

impl FeedbackEvent {
    /// `score` must be in `[0, 100]`; this is checked at construction so
    /// every event in the system is already valid.
    pub fn new(
        external_id: impl Into<String>,
        agent_id: AgentId,
        chain_id: u64,
        score: u8,
        tags: Vec<String>,
        submitter_address: impl Into<String>,
        created_at: DateTime<Utc>,
        transaction_hash: impl Into<String>,
    ) -> Result<Self, crate::error::GatewayError> {
        if score > 100 {
            return Err(crate::error::GatewayError::Validation(format!(
                "feedback score {score} out of range [0, 100]"
            )));
        }
        Ok(Self {
            external_id: external_id.into(),
            agent_id,
            chain_id,
            score,
            tags,
            context: None,
            uri: None,
            submitter_address: submitter_address.into().to_lowercase(),
            created_at,
            transaction_hash: transaction_hash.into(),
        })
    }

    /// Prefixed external identifier for upstream-sourced feedback,
    /// `graph:<id>` (§4.12), used for the dedupe check against the store.
    pub fn graph_external_id(raw_id: &str) -> String {
        format!("graph:{raw_id}")
    }
}
