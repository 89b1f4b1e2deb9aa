//! The Query Planner (§4.14): the request-time orchestration of query
//! expansion, embedding, filter compilation, vector search, reranking,
//! and response assembly.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use gateway_core::filter::{compile, StructuredFilter};
use gateway_core::{cursor, AgentId};
use gateway_embeddings::EmbeddingClient;
use gateway_vector::{SearchHit, VectorStoreAdapter};
use tracing::instrument;

use crate::error::{SearchError, SearchResult};
use crate::hyde::{merge_filters, HydeCache, HydeExpander};
use crate::match_reasons;
use crate::reranker::Reranker;
use crate::types::{
    AgentSummary, ChainBreakdown, HydeMetadata, RerankerMetadata, SearchRequest, SearchResponse, SortField, SortOrder,
};

/// Upper bound on in-memory sort/scroll fan-out (§4.14 steps 6/"name"
/// sort): the store can order numerically/temporally itself, but keyword
/// ("name") sort and non-relevance semantic-search sort both require
/// pulling a bounded page into memory first.
const IN_MEMORY_SORT_CAP: u32 = 1000;

/// Planner used when a reranker is enabled — the raw vector-search fetch
/// widens to cover the reranker's candidate pool before the top `limit`
/// is sliced back off.
const RERANKER_TOP_K: u64 = 50;

pub struct QueryPlanner {
    vector_store: Arc<dyn VectorStoreAdapter>,
    embedding_client: Arc<EmbeddingClient>,
    hyde_cache: HydeCache,
    generative: Option<Arc<dyn crate::generative::GenerativeProvider>>,
    reranker: Arc<dyn Reranker>,
    hyde_enabled: bool,
    reranker_enabled: bool,
}

impl QueryPlanner {
    pub fn new(
        vector_store: Arc<dyn VectorStoreAdapter>,
        embedding_client: Arc<EmbeddingClient>,
        generative: Option<Arc<dyn crate::generative::GenerativeProvider>>,
        reranker: Arc<dyn Reranker>,
        hyde_enabled: bool,
        reranker_enabled: bool,
    ) -> Self {
        Self {
            vector_store,
            embedding_client,
            hyde_cache: HydeCache::new(),
            generative,
            reranker,
            hyde_enabled,
            reranker_enabled,
        }
    }

    #[instrument(skip(self, request), fields(has_query = request.query.is_some()))]
    pub async fn search(&self, request: &SearchRequest) -> SearchResult<SearchResponse> {
        let limit = request.effective_limit();
        let offset = request.effective_offset().map_err(|e| SearchError::Validation(e.to_string()))?;
        let sort = request.effective_sort();

        match request.query.as_deref().filter(|q| !q.trim().is_empty()) {
            None => self.filtered_listing(&request.filters, limit, offset, sort.field, sort.order).await,
            Some(query) => {
                self.semantic_search(
                    query,
                    &request.filters,
                    limit,
                    offset,
                    request.min_score,
                    sort.field,
                    sort.order,
                    request.use_hyde.unwrap_or(self.hyde_enabled),
                    request.use_reranker.unwrap_or(self.reranker_enabled),
                )
                .await
            }
        }
    }

    /// §4.14 "no query text" branch: pure filtered listing, no embedding
    /// or reranking involved.
    async fn filtered_listing(
        &self,
        filters: &StructuredFilter,
        limit: u64,
        offset: u64,
        sort_field: SortField,
        sort_order: SortOrder,
    ) -> SearchResult<SearchResponse> {
        let tree = compile(filters, Utc::now());
        let effective_field = if sort_field == SortField::Relevance { SortField::CreatedAt } else { sort_field };

        let total = self.vector_store.count(tree.as_ref()).await?;

        let (hits, has_more) = match effective_field {
            SortField::Name => self.scroll_sorted_by_name(tree.as_ref(), offset, limit).await?,
            _ => self.scroll_sorted_numeric(tree.as_ref(), effective_field, sort_order, offset, limit).await?,
        };

        let results = hits.into_iter().map(|(agent_id, payload)| to_summary(agent_id, None, &payload)).collect();

        Ok(build_response(
            results,
            total,
            has_more,
            offset,
            limit,
            HydeMetadata::default(),
            RerankerMetadata::default(),
        ))
    }

    /// Numeric/datetime sort fields: the store can't `order_by` directly
    /// through this trait's scroll surface (its cursor is opaque), so this
    /// pulls a bounded page via `get_by_ids` after scrolling ids, then
    /// sorts/pages in memory — same shape as the keyword-sort path, just
    /// keyed by a different field.
    async fn scroll_sorted_numeric(
        &self,
        filter: Option<&gateway_core::FilterTree>,
        field: SortField,
        order: SortOrder,
        offset: u64,
        limit: u64,
    ) -> SearchResult<(Vec<(AgentId, BTreeMap<String, serde_json::Value>)>, bool)> {
        let mut rows = self.collect_filtered(filter).await?;
        sort_rows(&mut rows, field, order);
        Ok(page(rows, offset, limit))
    }

    async fn scroll_sorted_by_name(
        &self,
        filter: Option<&gateway_core::FilterTree>,
        offset: u64,
        limit: u64,
    ) -> SearchResult<(Vec<(AgentId, BTreeMap<String, serde_json::Value>)>, bool)> {
        let mut rows = self.collect_filtered(filter).await?;
        sort_rows(&mut rows, SortField::Name, SortOrder::Asc);
        Ok(page(rows, offset, limit))
    }

    /// Scrolls up to [`IN_MEMORY_SORT_CAP`] matching agent ids, then
    /// fetches their payloads via `get_by_ids` (scroll pages carry no
    /// payload on this adapter).
    async fn collect_filtered(
        &self,
        filter: Option<&gateway_core::FilterTree>,
    ) -> SearchResult<Vec<(AgentId, BTreeMap<String, serde_json::Value>)>> {
        let mut ids = Vec::new();
        let mut cursor_token: Option<String> = None;

        loop {
            let page = self.vector_store.scroll(IN_MEMORY_SORT_CAP, cursor_token.clone(), filter).await?;
            ids.extend(page.agent_ids);
            if ids.len() >= IN_MEMORY_SORT_CAP as usize || page.next_offset.is_none() {
                break;
            }
            cursor_token = page.next_offset;
        }
        ids.truncate(IN_MEMORY_SORT_CAP as usize);

        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.vector_store.get_by_ids(&ids).await?)
    }

    /// §4.14 "query text present" branch.
    #[allow(clippy::too_many_arguments)]
    async fn semantic_search(
        &self,
        query: &str,
        filters: &StructuredFilter,
        limit: u64,
        offset: u64,
        min_score: Option<f32>,
        sort_field: SortField,
        sort_order: SortOrder,
        use_hyde: bool,
        use_reranker: bool,
    ) -> SearchResult<SearchResponse> {
        let hyde_expansion = if use_hyde {
            match &self.generative {
                Some(provider) => HydeExpander::new(provider.as_ref(), &self.hyde_cache).expand(query).await,
                None => None,
            }
        } else {
            None
        };

        let (embed_text, hyde_metadata, effective_filters) = match &hyde_expansion {
            Some(expansion) => (
                expansion.hypothetical_description.clone(),
                HydeMetadata {
                    used: true,
                    hypothetical_description: Some(expansion.hypothetical_description.clone()),
                    from_cache: expansion.from_cache,
                    fallback: expansion.fallback,
                },
                merge_filters(filters.clone(), &expansion.filters),
            ),
            None => (query.to_string(), HydeMetadata::default(), filters.clone()),
        };

        let vectors = self.embedding_client.embed(&[embed_text]).await?;
        let vector = vectors.vectors.into_iter().next().ok_or_else(|| {
            SearchError::Embedding("embedding provider returned no vectors for query text".to_string())
        })?;

        let tree = compile(&effective_filters, Utc::now());
        let total = self.vector_store.count(tree.as_ref()).await?;

        let fetch_limit = if use_reranker { limit.max(RERANKER_TOP_K) } else { limit };

        let mut hits =
            self.vector_store.search(vector, fetch_limit + offset, 0, tree.as_ref()).await?;

        if let Some(threshold) = min_score {
            hits.retain(|hit| hit.score >= threshold);
        }

        let candidates_considered = hits.len();

        let hits = if sort_field != SortField::Relevance {
            reorder_hits_in_memory(hits, sort_field, sort_order)
        } else {
            hits
        };

        let hits = if use_reranker && !hits.is_empty() {
            self.reranker.rerank(query, hits).await?
        } else {
            hits
        };

        let mut hits = hits;
        if sort_field == SortField::Relevance && sort_order == SortOrder::Asc {
            hits.reverse();
        }

        let windowed: Vec<SearchHit> = hits.into_iter().skip(offset as usize).take(limit as usize).collect();
        let has_more = offset + windowed.len() as u64 < total;

        let by_chain = chain_breakdown(&windowed);
        let results = windowed
            .into_iter()
            .map(|hit| to_summary(hit.agent_id, Some(hit.score), &hit.payload))
            .collect();

        let reranker_metadata = RerankerMetadata { used: use_reranker, candidates_considered };

        let mut response = build_response(results, total, has_more, offset, limit, hyde_metadata, reranker_metadata);
        response.by_chain = by_chain;
        Ok(response)
    }
}

fn sort_rows(
    rows: &mut [(AgentId, BTreeMap<String, serde_json::Value>)],
    field: SortField,
    order: SortOrder,
) {
    rows.sort_by(|(a_id, a_payload), (b_id, b_payload)| {
        let ordering = match field {
            SortField::Name => compare_string_field(a_payload, b_payload, "name"),
            SortField::CreatedAt => compare_string_field(a_payload, b_payload, "created_at"),
            SortField::Reputation => compare_f64_field(a_payload, b_payload, "reputation"),
            SortField::Relevance => std::cmp::Ordering::Equal,
        };
        let ordering = if order == SortOrder::Desc { ordering.reverse() } else { ordering };
        ordering.then_with(|| a_id.cmp(b_id))
    });
}

fn compare_string_field(a: &BTreeMap<String, serde_json::Value>, b: &BTreeMap<String, serde_json::Value>, key: &str) -> std::cmp::Ordering {
    let a_val = a.get(key).and_then(|v| v.as_str()).unwrap_or_default();
    let b_val = b.get(key).and_then(|v| v.as_str()).unwrap_or_default();
    a_val.cmp(b_val)
}

fn compare_f64_field(a: &BTreeMap<String, serde_json::Value>, b: &BTreeMap<String, serde_json::Value>, key: &str) -> std::cmp::Ordering {
    let a_val = a.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0);
    let b_val = b.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0);
    a_val.partial_cmp(&b_val).unwrap_or(std::cmp::Ordering::Equal)
}

fn reorder_hits_in_memory(hits: Vec<SearchHit>, field: SortField, order: SortOrder) -> Vec<SearchHit> {
    let mut hits = hits;
    hits.sort_by(|a, b| {
        let ordering = match field {
            SortField::Name => compare_string_field(&a.payload, &b.payload, "name"),
            SortField::CreatedAt => compare_string_field(&a.payload, &b.payload, "created_at"),
            SortField::Reputation => compare_f64_field(&a.payload, &b.payload, "reputation"),
            SortField::Relevance => a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal),
        };
        let ordering = if order == SortOrder::Desc { ordering.reverse() } else { ordering };
        ordering.then_with(|| a.agent_id.cmp(&b.agent_id))
    });
    hits
}

fn page(
    rows: Vec<(AgentId, BTreeMap<String, serde_json::Value>)>,
    offset: u64,
    limit: u64,
) -> (Vec<(AgentId, BTreeMap<String, serde_json::Value>)>, bool) {
    let total = rows.len() as u64;
    let windowed: Vec<_> = rows.into_iter().skip(offset as usize).take(limit as usize).collect();
    let has_more = offset + windowed.len() as u64 < total;
    (windowed, has_more)
}

fn to_summary(agent_id: AgentId, score: Option<f32>, payload: &BTreeMap<String, serde_json::Value>) -> AgentSummary {
    let match_reasons = match_reasons::derive(score, payload);
    AgentSummary {
        agent_id: agent_id.to_string(),
        chain_id: agent_id.chain_id(),
        token_id: agent_id.token_id().to_string(),
        score,
        match_reasons,
        payload: payload.clone().into_iter().collect(),
    }
}

fn chain_breakdown(hits: &[SearchHit]) -> Vec<ChainBreakdown> {
    let mut counts: BTreeMap<u64, u64> = BTreeMap::new();
    for hit in hits {
        *counts.entry(hit.agent_id.chain_id()).or_insert(0) += 1;
    }
    counts.into_iter().map(|(chain_id, count)| ChainBreakdown { chain_id, count }).collect()
}

fn build_response(
    results: Vec<AgentSummary>,
    total: u64,
    has_more: bool,
    offset: u64,
    limit: u64,
    hyde: HydeMetadata,
    reranker: RerankerMetadata,
) -> SearchResponse {
    let by_chain = {
        let mut counts: BTreeMap<u64, u64> = BTreeMap::new();
        for result in &results {
            *counts.entry(result.chain_id).or_insert(0) += 1;
        }
        counts.into_iter().map(|(chain_id, count)| ChainBreakdown { chain_id, count }).collect()
    };

    SearchResponse {
        results,
        total,
        has_more,
        next_cursor: has_more.then(|| cursor::encode_cursor(offset + limit)),
        by_chain,
        hyde,
        reranker,
    }
}
