//! Reconciliation Worker (§4.13): a full-set diff between the upstream
//! indexer and the vector store. Orphans (in the store but no longer
//! upstream) are hard-deleted; missing agents (upstream but absent from
//! the store) are backfilled in batches.
//!
//! The source fetches every id from both sides on every run; for large
//! catalogs this should become a bloom-filter diff or paginated
//! merge-join instead, but that rework is out of scope here too (flagged,
//! not fixed, upstream).

use std::collections::HashSet;

use chrono::Utc;
use gateway_core::{build_payload, AgentId, SyncMetadata};
use gateway_db::SyncMetadataRepository;
use gateway_embeddings::assemble_embed_text;
use tracing::{info, instrument, warn};

use crate::context::AppContext;
use crate::error::{RunResult, WorkerError};

/// Batch size for backfilling missing agents (§4.13).
pub const RECONCILIATION_BATCH_SIZE: usize = 50;

/// Page size used while scrolling the vector store for its full id set.
const SCROLL_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Default)]
pub struct ReconciliationSummary {
    pub orphans_removed: u64,
    pub missing_indexed: u64,
    pub errors: Vec<WorkerError>,
}

/// Run one reconciliation pass (§4.13).
#[instrument(skip(ctx), name = "reconciliation")]
pub async fn run(ctx: &AppContext) -> RunResult<ReconciliationSummary> {
    let now = Utc::now();

    let pull = gateway_upstream::pull_agents(&ctx.upstream).await?;
    if pull.truncated {
        warn!(worker = "reconciliation", "upstream agents pull hit the safety cap");
    }

    let upstream_ids: HashSet<AgentId> = pull.agents.iter().map(|p| p.record.id.clone()).collect();
    let store_ids: HashSet<AgentId> = scroll_all_ids(ctx).await?.into_iter().collect();

    let orphans: Vec<AgentId> = store_ids.difference(&upstream_ids).cloned().collect();
    let missing: HashSet<&AgentId> = upstream_ids.difference(&store_ids).collect();

    let mut summary = ReconciliationSummary::default();

    if !orphans.is_empty() {
        match ctx.vector_store.delete(&orphans).await {
            Ok(()) => summary.orphans_removed = orphans.len() as u64,
            Err(e) => {
                warn!(worker = "reconciliation", error = %e, count = orphans.len(), "orphan delete failed");
                summary.errors.push(WorkerError::new(None, format!("orphan delete failed: {e}")));
            }
        }
        if summary.orphans_removed > 0 {
            let meta_repo = SyncMetadataRepository::new(&ctx.pool);
            if let Err(e) = meta_repo.delete_many(&orphans).await {
                warn!(worker = "reconciliation", error = %e, "failed to delete orphan sync metadata");
                summary.errors.push(WorkerError::new(None, format!("orphan metadata delete failed: {e}")));
            }
        }
    }

    let missing_records: Vec<_> = pull.agents.into_iter().filter(|p| missing.contains(&p.record.id)).collect();
    let meta_repo = SyncMetadataRepository::new(&ctx.pool);

    for batch in missing_records.chunks(RECONCILIATION_BATCH_SIZE) {
        for parsed in batch {
            let record = &parsed.record;
            let payload = build_payload(record, None);
            let text = assemble_embed_text(&record.name, &record.description);

            let outcome = async {
                let response = ctx.embeddings.embed(&[text]).await.map_err(gateway_core::GatewayError::from)?;
                let vector = response.vectors.into_iter().next().unwrap_or_default();
                ctx.vector_store.upsert(vec![(record.id.clone(), vector, payload.clone())]).await?;
                let embed_hash = gateway_core::hash::embed_hash(record);
                let content_hash = gateway_core::hash::content_hash(record);
                let meta = SyncMetadata::new(record.id.clone(), embed_hash, content_hash, now);
                meta_repo.upsert(&meta).await?;
                Ok::<(), crate::error::RunError>(())
            }
            .await;

            match outcome {
                Ok(()) => summary.missing_indexed += 1,
                Err(e) => {
                    warn!(worker = "reconciliation", agent_id = %record.id, error = %e, "backfill failed");
                    summary.errors.push(WorkerError::new(Some(record.id.clone()), e.to_string()));
                }
            }
        }
    }

    let state_repo = gateway_db::SyncStateRepository::new(&ctx.pool);
    let mut state = state_repo.load().await?;
    state.last_reconciliation = Some(now);
    state.agents_deleted += summary.orphans_removed;
    state.agents_synced += summary.missing_indexed;
    if !summary.errors.is_empty() {
        state.last_error = Some(format!("{} error(s) during reconciliation", summary.errors.len()));
    }
    state_repo.save(&state).await?;

    info!(
        worker = "reconciliation",
        orphans_removed = summary.orphans_removed,
        missing_indexed = summary.missing_indexed,
        errors = summary.errors.len(),
        "run complete"
    );

    Ok(summary)
}

/// Scroll the vector store to completion with no filter, collecting every
/// agent id it currently holds (the `V` set in §4.13).
async fn scroll_all_ids(ctx: &AppContext) -> RunResult<Vec<AgentId>> {
    let mut ids = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = ctx.vector_store.scroll(SCROLL_PAGE_SIZE, cursor.clone(), None).await?;
        let got_full_page = page.agent_ids.len() == SCROLL_PAGE_SIZE as usize;
        ids.extend(page.agent_ids);
        if page.next_offset.is_none() || !got_full_page {
            break;
        }
        cursor = page.next_offset;
    }

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gateway_core::{FilterTree, Payload};
    use gateway_embeddings::{EmbeddingClient, EmbeddingProvider, EmbeddingResponse};
    use gateway_upstream::UpstreamClient;
    use gateway_vector::{ScrollPage, SearchHit, VectorError, VectorResult, VectorStoreAdapter};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// In-memory vector store seeded with a fixed set of ids, enough surface
    /// for the full-set diff to exercise delete/upsert/scroll.
    #[derive(Default)]
    struct FakeVectorStore {
        ids: Mutex<HashSet<AgentId>>,
        deleted: Mutex<Vec<AgentId>>,
        upserted: Mutex<Vec<AgentId>>,
    }

    #[async_trait]
    impl VectorStoreAdapter for FakeVectorStore {
        async fn upsert(&self, points: Vec<(AgentId, Vec<f32>, Payload)>) -> VectorResult<()> {
            let mut ids = self.ids.lock().unwrap_or_else(|e| e.into_inner());
            let mut upserted = self.upserted.lock().unwrap_or_else(|e| e.into_inner());
            for (id, _v, _p) in points {
                ids.insert(id.clone());
                upserted.push(id);
            }
            Ok(())
        }
        async fn set_payload_by_agent_id(&self, _agent_id: &AgentId, _payload: &Payload) -> VectorResult<()> {
            Ok(())
        }
        async fn search(
            &self,
            _vector: Vec<f32>,
            _limit: u64,
            _offset: u64,
            _filter: Option<&FilterTree>,
        ) -> VectorResult<Vec<SearchHit>> {
            Ok(Vec::new())
        }
        async fn scroll(&self, _limit: u32, _offset: Option<String>, _filter: Option<&FilterTree>) -> VectorResult<ScrollPage> {
            let ids: Vec<AgentId> = self.ids.lock().unwrap_or_else(|e| e.into_inner()).iter().cloned().collect();
            Ok(ScrollPage { agent_ids: ids, next_offset: None })
        }
        async fn count(&self, _filter: Option<&FilterTree>) -> VectorResult<u64> {
            Ok(self.ids.lock().unwrap_or_else(|e| e.into_inner()).len() as u64)
        }
        async fn get_by_ids(&self, _ids: &[AgentId]) -> VectorResult<Vec<(AgentId, BTreeMap<String, serde_json::Value>)>> {
            Ok(Vec::new())
        }
        async fn delete(&self, ids: &[AgentId]) -> VectorResult<()> {
            let mut store_ids = self.ids.lock().unwrap_or_else(|e| e.into_inner());
            let mut deleted = self.deleted.lock().unwrap_or_else(|e| e.into_inner());
            for id in ids {
                store_ids.remove(id);
                deleted.push(id.clone());
            }
            Ok(())
        }
        async fn delete_by_filter(&self, _filter: &FilterTree) -> VectorResult<()> {
            Err(VectorError::Store("not implemented in fake".into()))
        }
    }

    struct FakeEmbeddingProvider;

    #[async_trait]
    impl EmbeddingProvider for FakeEmbeddingProvider {
        fn name(&self) -> &str {
            "fake"
        }
        async fn embed(&self, inputs: &[String]) -> gateway_embeddings::EmbeddingResult<EmbeddingResponse> {
            Ok(EmbeddingResponse {
                vectors: inputs.iter().map(|_| vec![0.1_f32, 0.2, 0.3]).collect(),
                model: "fake-embed".into(),
                provider: "fake".into(),
                total_tokens: Some(0),
            })
        }
    }

    fn agent_node(chain_id: u64, token_id: &str) -> serde_json::Value {
        json!({
            "chainId": chain_id,
            "tokenId": token_id,
            "name": format!("Agent {token_id}"),
            "description": "a test agent",
            "active": true,
            "owner": "0xAAA",
            "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": "2026-01-01T00:00:00Z",
        })
    }

    async fn build_ctx(pool: sqlx::PgPool, server: &MockServer, store: Arc<FakeVectorStore>) -> AppContext {
        let upstream = UpstreamClient::with_endpoint_for_test(format!("{}/graphql", server.uri()));
        let embeddings = Arc::new(EmbeddingClient::new(Arc::new(FakeEmbeddingProvider), None));
        AppContext::new(pool, store, Arc::new(upstream), reqwest::Client::new(), embeddings, None)
    }

    #[sqlx::test]
    async fn orphans_are_deleted_and_missing_are_backfilled(pool: sqlx::PgPool) {
        gateway_db::migrate(&pool).await.expect("schema migration");

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"agents": [agent_node(1, "alpha")]}})))
            .mount(&server)
            .await;

        let store = Arc::new(FakeVectorStore::default());
        store.ids.lock().unwrap().insert(AgentId::new(1, "stale").unwrap());

        let ctx = build_ctx(pool, &server, store.clone()).await;
        let summary = run(&ctx).await.expect("reconciliation run");

        assert_eq!(summary.orphans_removed, 1);
        assert_eq!(summary.missing_indexed, 1);
        assert!(summary.errors.is_empty());

        let remaining = store.ids.lock().unwrap();
        assert!(!remaining.contains(&AgentId::new(1, "stale").unwrap()));
        assert!(remaining.contains(&AgentId::new(1, "alpha").unwrap()));
    }

    /// P9: running reconciliation twice against a stable upstream with a
    /// store that already matches makes no further changes the second time.
    #[sqlx::test]
    async fn property_p9_second_run_over_stable_state_is_a_fixpoint(pool: sqlx::PgPool) {
        gateway_db::migrate(&pool).await.expect("schema migration");

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"agents": [agent_node(1, "alpha")]}})))
            .mount(&server)
            .await;

        let store = Arc::new(FakeVectorStore::default());
        let ctx = build_ctx(pool, &server, store.clone()).await;

        let first = run(&ctx).await.expect("first run");
        assert_eq!(first.missing_indexed, 1);

        let second = run(&ctx).await.expect("second run");
        assert_eq!(second.missing_indexed, 0);
        assert_eq!(second.orphans_removed, 0);
    }
}
