//! Optional cross-encoder-style reranking of the top vector-search hits
//! (§4.14 step 4). Disabled by default (`RERANKER_ENABLED=false`); when
//! enabled, calls out to an external reranking endpoint that takes the
//! query plus a batch of candidate documents and returns a relevance
//! score per candidate, which replaces the vector similarity score as the
//! sort key.

use async_trait::async_trait;
use gateway_vector::SearchHit;
use serde::{Deserialize, Serialize};

use crate::error::{SearchError, SearchResult};

#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &str, hits: Vec<SearchHit>) -> SearchResult<Vec<SearchHit>>;
}

/// The default reranker: a passthrough that leaves vector-similarity
/// ordering untouched. Used whenever reranking is disabled or a caller
/// didn't opt in for a given request.
pub struct NoopReranker;

#[async_trait]
impl Reranker for NoopReranker {
    async fn rerank(&self, _query: &str, hits: Vec<SearchHit>) -> SearchResult<Vec<SearchHit>> {
        Ok(hits)
    }
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    documents: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    scores: Vec<f32>,
}

/// Calls an HTTP reranking endpoint with the query and a flattened
/// name+description document per hit, then reorders hits by the returned
/// scores (falling back to the original order if the response doesn't
/// line up with the request).
pub struct HttpReranker {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpReranker {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), endpoint: endpoint.into() }
    }

    fn document_for(hit: &SearchHit) -> String {
        let name = hit.payload.get("name").and_then(|v| v.as_str()).unwrap_or_default();
        let description = hit.payload.get("description").and_then(|v| v.as_str()).unwrap_or_default();
        format!("{name}\n\n{description}")
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn rerank(&self, query: &str, hits: Vec<SearchHit>) -> SearchResult<Vec<SearchHit>> {
        if hits.is_empty() {
            return Ok(hits);
        }

        let documents: Vec<String> = hits.iter().map(Self::document_for).collect();
        let request = RerankRequest { query, documents };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| SearchError::Reranker(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SearchError::Reranker(format!("reranker returned status {}", response.status())));
        }

        let parsed: RerankResponse = response.json().await.map_err(|e| SearchError::Reranker(e.to_string()))?;

        if parsed.scores.len() != hits.len() {
            return Err(SearchError::Reranker(format!(
                "reranker returned {} scores for {} documents",
                parsed.scores.len(),
                hits.len()
            )));
        }

        let mut scored: Vec<(f32, SearchHit)> = parsed.scores.into_iter().zip(hits).collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .map(|(score, mut hit)| {
                hit.score = score;
                hit
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use gateway_core::AgentId;

    use super::*;

    fn hit(token_id: &str, score: f32) -> SearchHit {
        SearchHit {
            agent_id: AgentId::new(1, token_id).expect("valid agent id"),
            score,
            payload: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn noop_reranker_preserves_order() {
        let hits = vec![hit("a", 0.9), hit("b", 0.5)];
        let result = NoopReranker.rerank("query", hits.clone()).await.expect("rerank ok");
        assert_eq!(result.len(), hits.len());
        assert_eq!(result[0].agent_id, hits[0].agent_id);
    }
}
