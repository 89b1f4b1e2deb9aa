//! Graph Sync Worker (§4.10, "the hardest path"): pull every agent from
//! the upstream indexer, diff against sync metadata by content hash, and
//! push the changed subset (capped at [`GRAPH_SYNC_BATCH_CAP`] per run)
//! through capability enrichment, embedding and the vector store.

use std::collections::HashMap;

use chrono::Utc;
use gateway_capability::{fetch_a2a_agent_card, run_bounded, A2aFetchResult, DEFAULT_CONCURRENCY};
use gateway_core::hash::{content_hash, embed_hash};
use gateway_core::{build_payload, AgentId, AgentRecord, DiffBucket, Payload, PayloadEnrichment, SyncMetadata};
use gateway_db::{FeedbackRepository, SyncMetadataRepository, SyncStateRepository};
use gateway_embeddings::assemble_embed_text;
use tracing::{info, instrument, warn};

use crate::context::AppContext;
use crate::error::{RunError, RunResult, WorkerError};

/// Upper bound on agents enqueued for work in a single run (§4.10, §5
/// "no more than 100 agents enqueued"; respects the host's sub-request
/// ceiling).
pub const GRAPH_SYNC_BATCH_CAP: usize = 100;

/// Counters and accumulated per-record failures for one run.
#[derive(Debug, Default)]
pub struct GraphSyncSummary {
    pub synced: u64,
    pub embedded: u64,
    pub skipped: u64,
    pub has_more: bool,
    pub errors: Vec<WorkerError>,
}

struct QueuedAgent {
    record: AgentRecord,
    bucket: DiffBucket,
    embed_hash: String,
    content_hash: String,
    existing_meta: Option<SyncMetadata>,
}

/// Run one graph-sync pass (§4.10 steps 1-7).
#[instrument(skip(ctx), name = "graph_sync")]
pub async fn run(ctx: &AppContext) -> RunResult<GraphSyncSummary> {
    let now = Utc::now();

    // Step 1: pull every agent record from the upstream indexer.
    let pull = gateway_upstream::pull_agents(&ctx.upstream).await?;
    if pull.truncated {
        warn!(worker = "graph_sync", "upstream agents pull hit the safety cap");
    }
    for parsed in &pull.agents {
        for w in &parsed.warnings {
            warn!(worker = "graph_sync", agent_id = %parsed.record.id, field = %w.field, message = %w.message, "parse warning");
        }
    }

    let ids: Vec<AgentId> = pull.agents.iter().map(|p| p.record.id.clone()).collect();

    // Step 2: load sync metadata for all returned ids, in batches.
    let meta_repo = SyncMetadataRepository::new(&ctx.pool);
    let existing: Vec<SyncMetadata> = meta_repo.get_many(&ids).await?;
    let mut meta_map: HashMap<AgentId, SyncMetadata> =
        existing.into_iter().map(|m| (m.agent_id.clone(), m)).collect();

    // Step 3: classify each record, capping enqueueing at GRAPH_SYNC_BATCH_CAP.
    let mut queue = Vec::new();
    let mut skipped = 0u64;
    let mut has_more = false;

    for parsed in pull.agents {
        let record = parsed.record;
        let new_embed_hash = embed_hash(&record);
        let new_content_hash = content_hash(&record);

        let existing_meta = meta_map.remove(&record.id);
        let bucket = match &existing_meta {
            None => DiffBucket::Missing,
            Some(meta) => meta.diff(&new_embed_hash, &new_content_hash),
        };

        if bucket == DiffBucket::Unchanged {
            skipped += 1;
            continue;
        }

        if queue.len() >= GRAPH_SYNC_BATCH_CAP {
            has_more = true;
            skipped += 1;
            continue;
        }

        queue.push(QueuedAgent { record, bucket, embed_hash: new_embed_hash, content_hash: new_content_hash, existing_meta });
    }

    // Step 4: fetch A2A capability cards for queued agents declaring A2A.
    let a2a_targets: Vec<(AgentId, String)> = queue
        .iter()
        .filter(|q| q.record.has_a2a && !q.record.a2a_endpoint.is_empty())
        .map(|q| (q.record.id.clone(), q.record.a2a_endpoint.clone()))
        .collect();

    let a2a_results = run_bounded(a2a_targets, DEFAULT_CONCURRENCY, |(agent_id, endpoint)| {
        let client = ctx.capability_client.clone();
        async move {
            let result = fetch_a2a_agent_card(&client, &endpoint).await;
            (agent_id, result)
        }
    })
    .await;
    let a2a_map: HashMap<AgentId, A2aFetchResult> = a2a_results.into_iter().collect();

    // Step 5: fetch reachability for all queued agents.
    let feedback_repo = FeedbackRepository::new(&ctx.pool);
    let since = now - gateway_core::reachability::REACHABILITY_WINDOW;
    let mut reachability_map = HashMap::new();
    for queued in &queue {
        let probes = feedback_repo.recent_probes_for_agent(&queued.record.id, since).await?;
        let reachability = gateway_core::reachability::derive(&probes, now);
        reachability_map.insert(queued.record.id.clone(), reachability);
    }

    // Step 6: process each queued agent, serialized (hash -> embed -> upsert -> metadata write).
    let mut synced = 0u64;
    let mut embedded = 0u64;
    let mut errors = Vec::new();

    for queued in queue {
        let agent_id = queued.record.id.clone();
        match process_one(ctx, &queued, a2a_map.get(&agent_id), reachability_map.get(&agent_id).copied(), now).await
        {
            Ok(did_embed) => {
                synced += 1;
                if did_embed {
                    embedded += 1;
                }
            }
            Err(e) => {
                warn!(worker = "graph_sync", agent_id = %agent_id, error = %e, "agent sync failed, recording and continuing");
                let mut meta = queued.existing_meta.unwrap_or_else(|| {
                    SyncMetadata::new(agent_id.clone(), String::new(), String::new(), now)
                });
                meta.mark_error(e.to_string(), now);
                if let Err(write_err) = meta_repo.upsert(&meta).await {
                    warn!(worker = "graph_sync", agent_id = %agent_id, error = %write_err, "failed to persist error metadata");
                }
                errors.push(WorkerError::new(Some(agent_id), e.to_string()));
            }
        }
    }

    // Step 7: update global sync state.
    let state_repo = SyncStateRepository::new(&ctx.pool);
    let mut state = state_repo.load().await?;
    state.last_graph_sync = Some(now);
    state.agents_synced += synced;
    state.embeddings_generated += embedded;
    if !errors.is_empty() {
        state.last_error = Some(format!("{} agent(s) failed during graph sync", errors.len()));
    }
    state_repo.save(&state).await?;

    info!(worker = "graph_sync", synced, embedded, skipped, has_more, errors = errors.len(), "run complete");

    Ok(GraphSyncSummary { synced, embedded, skipped, has_more, errors })
}

/// Process one queued agent. Returns `Ok(true)` if an embedding was
/// generated (full path), `Ok(false)` for a payload-only update.
async fn process_one(
    ctx: &AppContext,
    queued: &QueuedAgent,
    a2a: Option<&A2aFetchResult>,
    reachability: Option<gateway_core::Reachability>,
    now: chrono::DateTime<Utc>,
) -> RunResult<bool> {
    let record = &queued.record;

    let enrichment = PayloadEnrichment {
        reachability,
        last_reachability_check_at: Some(now),
        input_modes: a2a.filter(|r| r.success).map(|r| r.input_modes.clone()),
        output_modes: a2a.filter(|r| r.success).map(|r| r.output_modes.clone()),
        ..Default::default()
    };
    let payload: Payload = build_payload(record, Some(&enrichment));

    let did_embed = match queued.bucket {
        DiffBucket::Missing | DiffBucket::EmbedAndPayloadChanged => {
            let text = assemble_embed_text(&record.name, &record.description);
            let response = ctx.embeddings.embed(&[text]).await.map_err(gateway_core::GatewayError::from)?;
            let vector = response.vectors.into_iter().next().unwrap_or_default();
            ctx.vector_store.upsert(vec![(record.id.clone(), vector, payload)]).await?;
            true
        }
        DiffBucket::PayloadOnlyChanged => {
            ctx.vector_store.set_payload_by_agent_id(&record.id, &payload).await?;
            false
        }
        DiffBucket::Unchanged => return Err(RunError::Gateway(gateway_core::GatewayError::Invariant(
            "unchanged agent should never reach process_one".to_string(),
        ))),
    };

    let mut meta = queued.existing_meta.clone().unwrap_or_else(|| {
        SyncMetadata::new(record.id.clone(), queued.embed_hash.clone(), queued.content_hash.clone(), now)
    });
    meta.mark_synced(queued.embed_hash.clone(), queued.content_hash.clone(), now);
    SyncMetadataRepository::new(&ctx.pool).upsert(&meta).await?;

    Ok(did_embed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gateway_core::FilterTree;
    use gateway_embeddings::{EmbeddingClient, EmbeddingProvider, EmbeddingResponse};
    use gateway_upstream::UpstreamClient;
    use gateway_vector::{ScrollPage, SearchHit, VectorError, VectorResult};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// In-memory stand-in for [`gateway_vector::QdrantVectorStore`], just
    /// enough surface to count writes (§8 P4).
    #[derive(Default)]
    struct FakeVectorStore {
        upsert_calls: Mutex<u32>,
        payload_calls: Mutex<u32>,
        payloads: Mutex<BTreeMap<String, Payload>>,
    }

    #[async_trait]
    impl VectorStoreAdapter for FakeVectorStore {
        async fn upsert(&self, points: Vec<(AgentId, Vec<f32>, Payload)>) -> VectorResult<()> {
            *self.upsert_calls.lock().unwrap_or_else(|e| e.into_inner()) += 1;
            let mut payloads = self.payloads.lock().unwrap_or_else(|e| e.into_inner());
            for (id, _vector, payload) in points {
                payloads.insert(id.to_string(), payload);
            }
            Ok(())
        }

        async fn set_payload_by_agent_id(&self, agent_id: &AgentId, payload: &Payload) -> VectorResult<()> {
            *self.payload_calls.lock().unwrap_or_else(|e| e.into_inner()) += 1;
            self.payloads
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(agent_id.to_string(), payload.clone());
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

        async fn scroll(
            &self,
            _limit: u32,
            _offset: Option<String>,
            _filter: Option<&FilterTree>,
        ) -> VectorResult<ScrollPage> {
            Ok(ScrollPage { agent_ids: Vec::new(), next_offset: None })
        }

        async fn count(&self, _filter: Option<&FilterTree>) -> VectorResult<u64> {
            Ok(0)
        }

        async fn get_by_ids(
            &self,
            _ids: &[AgentId],
        ) -> VectorResult<Vec<(AgentId, BTreeMap<String, serde_json::Value>)>> {
            Ok(Vec::new())
        }

        async fn delete(&self, _ids: &[AgentId]) -> VectorResult<()> {
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

    fn agent_node(chain_id: u64, token_id: &str, name: &str, owner: &str) -> serde_json::Value {
        json!({
            "chainId": chain_id,
            "tokenId": token_id,
            "name": name,
            "description": "a test agent",
            "imageUrl": "",
            "active": true,
            "hasMcp": false,
            "hasA2a": false,
            "hasX402": false,
            "hasRegistrationFile": false,
            "mcpEndpoint": "",
            "a2aEndpoint": "",
            "oasfEndpoint": "",
            "email": "",
            "mcpVersion": "",
            "a2aVersion": "",
            "mcpTools": [],
            "mcpPrompts": [],
            "mcpResources": [],
            "a2aSkills": [],
            "declaredSkills": [],
            "declaredDomains": [],
            "ens": "",
            "did": "",
            "owner": owner,
            "walletAddress": owner,
            "operatorAddresses": [],
            "supportedTrustSystems": [],
            "agentUri": "",
            "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": "2026-01-01T00:00:00Z",
        })
    }

    async fn mount_agents_page(server: &MockServer, nodes: Vec<serde_json::Value>) {
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"agents": nodes}})))
            .mount(server)
            .await;
    }

    async fn build_ctx(pool: sqlx::PgPool, server: &MockServer) -> AppContext {
        let upstream = UpstreamClient::with_endpoint_for_test(format!("{}/graphql", server.uri()));
        let vector_store: Arc<dyn VectorStoreAdapter> = Arc::new(FakeVectorStore::default());
        let embeddings = Arc::new(EmbeddingClient::new(Arc::new(FakeEmbeddingProvider), None));
        AppContext::new(pool, vector_store, Arc::new(upstream), reqwest::Client::new(), embeddings, None)
    }

    #[sqlx::test]
    async fn first_run_embeds_every_new_agent(pool: sqlx::PgPool) {
        gateway_db::migrate(&pool).await.expect("schema migration");

        let server = MockServer::start().await;
        mount_agents_page(&server, vec![agent_node(1, "alpha", "Alpha Agent", "0xAAA")]).await;

        let ctx = build_ctx(pool, &server).await;
        let summary = run(&ctx).await.expect("graph sync run");

        assert_eq!(summary.synced, 1);
        assert_eq!(summary.embedded, 1);
        assert_eq!(summary.skipped, 0);
        assert!(summary.errors.is_empty());
    }

    /// Property P4: a second run over upstream data that has not changed
    /// writes nothing and counts everything as skipped.
    #[sqlx::test]
    async fn property_p4_second_run_over_unchanged_data_is_a_no_op(pool: sqlx::PgPool) {
        gateway_db::migrate(&pool).await.expect("schema migration");

        let server = MockServer::start().await;
        mount_agents_page(&server, vec![agent_node(1, "alpha", "Alpha Agent", "0xAAA")]).await;

        let ctx = build_ctx(pool, &server).await;

        let first = run(&ctx).await.expect("first run");
        assert_eq!(first.synced, 1);

        let second = run(&ctx).await.expect("second run");
        assert_eq!(second.synced, 0);
        assert_eq!(second.embedded, 0);
        assert_eq!(second.skipped, 1);
        assert!(second.errors.is_empty());
    }

    /// An `active` flip changes `content_hash` but not `embed_hash` (the
    /// field is not a member of `EmbedFields`): the record takes the
    /// payload-only path, no re-embed.
    #[sqlx::test]
    async fn active_flag_change_takes_payload_only_path(pool: sqlx::PgPool) {
        gateway_db::migrate(&pool).await.expect("schema migration");

        let server = MockServer::start().await;
        let mut node = agent_node(1, "alpha", "Alpha Agent", "0xAAA");
        node["active"] = json!(true);
        mount_agents_page(&server, vec![node]).await;

        let ctx = build_ctx(pool, &server).await;
        let first = run(&ctx).await.expect("first run");
        assert_eq!(first.embedded, 1);

        server.reset().await;
        let mut changed = agent_node(1, "alpha", "Alpha Agent", "0xAAA");
        changed["active"] = json!(false);
        mount_agents_page(&server, vec![changed]).await;
        let second = run(&ctx).await.expect("second run");

        assert_eq!(second.synced, 1);
        assert_eq!(second.embedded, 0, "an active-flag change alone must not trigger re-embedding");
    }
}
