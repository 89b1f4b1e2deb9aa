//! Request/response shapes for the Query Planner (§4.14, §6).

use gateway_core::filter::StructuredFilter;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Relevance,
    Name,
    CreatedAt,
    Reputation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub order: SortOrder,
}

impl Default for SortSpec {
    fn default() -> Self {
        SortSpec { field: SortField::Relevance, order: SortOrder::Desc }
    }
}

pub const DEFAULT_LIMIT: u64 = 20;
pub const MAX_LIMIT: u64 = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: Option<String>,
    #[serde(default)]
    pub filters: StructuredFilter,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub cursor: Option<String>,
    pub min_score: Option<f32>,
    pub sort: Option<SortSpec>,
    pub use_hyde: Option<bool>,
    pub use_reranker: Option<bool>,
}

impl SearchRequest {
    /// Clamps the caller's limit into `[1, MAX_LIMIT]`, defaulting to
    /// [`DEFAULT_LIMIT`] when unset.
    pub fn effective_limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// The cursor and the numeric offset are isomorphic (§6); the cursor
    /// wins when both are present.
    pub fn effective_offset(&self) -> gateway_core::Result<u64> {
        if let Some(cursor) = &self.cursor {
            return Ok(gateway_core::cursor::decode_cursor(cursor)?.offset);
        }
        Ok(self.offset.unwrap_or(0))
    }

    pub fn effective_sort(&self) -> SortSpec {
        self.sort.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
    pub agent_id: String,
    pub chain_id: u64,
    pub token_id: String,
    pub score: Option<f32>,
    pub match_reasons: Vec<String>,
    pub payload: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HydeMetadata {
    pub used: bool,
    pub hypothetical_description: Option<String>,
    pub from_cache: bool,
    pub fallback: bool,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RerankerMetadata {
    pub used: bool,
    pub candidates_considered: usize,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChainBreakdown {
    pub chain_id: u64,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<AgentSummary>,
    pub total: u64,
    pub has_more: bool,
    pub next_cursor: Option<String>,
    pub by_chain: Vec<ChainBreakdown>,
    pub hyde: HydeMetadata,
    pub reranker: RerankerMetadata,
}
