//! Relational → Vector Sync Worker (§4.11): propagate classification,
//! reputation and trust-score rows from the relational store onto the
//! vector store's payloads without touching the embedding itself.

use chrono::{DateTime, Utc};
use gateway_core::payload::Payload;
use gateway_core::{AgentId, Classification, GatewayError, ScoredSlug};
use gateway_db::{
    normalize_legacy_scale, ClassificationRepository, ReputationRepository, SyncMetadataRepository,
    SyncStateRepository, TrustRepository,
};
use tracing::{info, instrument, warn};

use crate::context::AppContext;
use crate::error::{RunResult, WorkerError};

/// Counters for one relational-sync pass.
#[derive(Debug, Default)]
pub struct RelationalSyncSummary {
    pub classifications_applied: u64,
    pub reputation_applied: u64,
    pub trust_applied: u64,
    pub skipped_not_indexed: u64,
    pub errors: Vec<WorkerError>,
}

/// Run one relational-sync pass (§4.11).
#[instrument(skip(ctx), name = "relational_sync")]
pub async fn run(ctx: &AppContext) -> RunResult<RelationalSyncSummary> {
    let state_repo = SyncStateRepository::new(&ctx.pool);
    let mut state = state_repo.load().await?;
    let since = state.last_d1_sync.unwrap_or_else(|| DateTime::<Utc>::MIN_UTC);

    let mut summary = RelationalSyncSummary::default();
    let mut processed_timestamps = Vec::new();

    let classification_repo = ClassificationRepository::new(&ctx.pool);
    for row in classification_repo.list_updated_since(since).await? {
        match apply_classification(ctx, &row.agent_id, row.classification).await {
            Ok(true) => {
                summary.classifications_applied += 1;
                processed_timestamps.push(row.updated_at);
            }
            Ok(false) => summary.skipped_not_indexed += 1,
            Err(e) => {
                warn!(worker = "relational_sync", agent_id = %row.agent_id, error = %e, "classification apply failed");
                summary.errors.push(WorkerError::new(Some(row.agent_id), e.to_string()));
            }
        }
    }

    let reputation_repo = ReputationRepository::new(&ctx.pool);
    for row in reputation_repo.list_updated_since(since).await? {
        let reputation = normalize_legacy_scale(row.aggregate.average_score) as f64;
        match apply_field_update(ctx, &row.agent_id, |payload| payload.reputation = reputation).await {
            Ok(true) => {
                summary.reputation_applied += 1;
                processed_timestamps.push(row.updated_at);
            }
            Ok(false) => summary.skipped_not_indexed += 1,
            Err(e) => {
                warn!(worker = "relational_sync", agent_id = %row.agent_id, error = %e, "reputation apply failed");
                summary.errors.push(WorkerError::new(Some(row.agent_id), e.to_string()));
            }
        }
    }

    let trust_repo = TrustRepository::new(&ctx.pool);
    for row in trust_repo.list_updated_since(since).await? {
        match apply_field_update(ctx, &row.agent_id, |payload| payload.trust_score = row.trust_score).await {
            Ok(true) => {
                summary.trust_applied += 1;
                processed_timestamps.push(row.updated_at);
            }
            Ok(false) => summary.skipped_not_indexed += 1,
            Err(e) => {
                warn!(worker = "relational_sync", agent_id = %row.agent_id, error = %e, "trust apply failed");
                summary.errors.push(WorkerError::new(Some(row.agent_id), e.to_string()));
            }
        }
    }

    // Advance only if at least one row across all three sources was
    // actually applied, and only to the max timestamp seen (§4.11, P5).
    state.advance_d1_sync(&processed_timestamps);
    if !summary.errors.is_empty() {
        state.last_error = Some(format!("{} row(s) failed during relational sync", summary.errors.len()));
    }
    state_repo.save(&state).await?;

    info!(
        worker = "relational_sync",
        classifications = summary.classifications_applied,
        reputation = summary.reputation_applied,
        trust = summary.trust_applied,
        skipped = summary.skipped_not_indexed,
        errors = summary.errors.len(),
        "run complete"
    );

    Ok(summary)
}

/// Load the current payload for `agent_id`, apply `classification`'s
/// skill/domain lists to it, and write it back. Returns `Ok(false)` if the
/// agent has no vector-store point yet (graph sync has not indexed it).
async fn apply_classification(
    ctx: &AppContext,
    agent_id: &AgentId,
    classification: Classification,
) -> RunResult<bool> {
    let skills = classification.indexed_skills().into_iter().map(|s| s.slug).collect::<Vec<_>>();
    let domains = classification.indexed_domains().into_iter().map(|s| s.slug).collect::<Vec<_>>();
    let skills_with_confidence: Vec<ScoredSlug> =
        classification.skills.iter().map(|e| ScoredSlug { slug: e.slug.clone(), confidence: e.confidence }).collect();
    let domains_with_confidence: Vec<ScoredSlug> =
        classification.domains.iter().map(|e| ScoredSlug { slug: e.slug.clone(), confidence: e.confidence }).collect();

    let applied = apply_field_update(ctx, agent_id, move |payload| {
        payload.skills = skills;
        payload.domains = domains;
        payload.skills_with_confidence = skills_with_confidence;
        payload.domains_with_confidence = domains_with_confidence;
    })
    .await?;

    if applied {
        // Text that affects retrieval may have changed (§4.11): force a
        // re-embed on the next graph-sync pass.
        let meta_repo = SyncMetadataRepository::new(&ctx.pool);
        if let Some(mut meta) = meta_repo.get(agent_id).await? {
            meta.needs_reembed = true;
            meta.d1_classification_at = Some(Utc::now());
            meta_repo.upsert(&meta).await?;
        }
    }

    Ok(applied)
}

/// Fetch the current payload for `agent_id` from the vector store, apply
/// `mutate` to it, and write it back with `set_payload_by_agent_id`.
/// Returns `Ok(false)` without writing if the agent has no point yet.
async fn apply_field_update(
    ctx: &AppContext,
    agent_id: &AgentId,
    mutate: impl FnOnce(&mut Payload),
) -> RunResult<bool> {
    let existing = ctx.vector_store.get_by_ids(std::slice::from_ref(agent_id)).await?;
    let Some((_, map)) = existing.into_iter().next() else {
        return Ok(false);
    };

    let value = serde_json::Value::Object(map.into_iter().collect());
    let mut payload: Payload = serde_json::from_value(value).map_err(GatewayError::from)?;

    mutate(&mut payload);
    ctx.vector_store.set_payload_by_agent_id(agent_id, &payload).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use gateway_core::{build_payload, AgentRecord, ClassificationEntry, ClassificationSource, FilterTree, SyncMetadata};
    use gateway_embeddings::{EmbeddingClient, EmbeddingProvider, EmbeddingResult};
    use gateway_upstream::UpstreamClient;
    use gateway_vector::{ScrollPage, SearchHit, VectorError, VectorResult, VectorStoreAdapter};
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeVectorStore {
        payloads: Mutex<BTreeMap<String, Payload>>,
        set_payload_calls: Mutex<u32>,
    }

    impl FakeVectorStore {
        fn seed(&self, payload: Payload) {
            self.payloads.lock().unwrap_or_else(|e| e.into_inner()).insert(payload.agent_id.clone(), payload);
        }

        fn get(&self, agent_id: &AgentId) -> Option<Payload> {
            self.payloads.lock().unwrap_or_else(|e| e.into_inner()).get(&agent_id.to_string()).cloned()
        }
    }

    #[async_trait]
    impl VectorStoreAdapter for FakeVectorStore {
        async fn upsert(&self, points: Vec<(AgentId, Vec<f32>, Payload)>) -> VectorResult<()> {
            for (id, _vector, payload) in points {
                self.payloads.lock().unwrap_or_else(|e| e.into_inner()).insert(id.to_string(), payload);
            }
            Ok(())
        }

        async fn set_payload_by_agent_id(&self, agent_id: &AgentId, payload: &Payload) -> VectorResult<()> {
            *self.set_payload_calls.lock().unwrap_or_else(|e| e.into_inner()) += 1;
            self.payloads.lock().unwrap_or_else(|e| e.into_inner()).insert(agent_id.to_string(), payload.clone());
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
            ids: &[AgentId],
        ) -> VectorResult<Vec<(AgentId, BTreeMap<String, serde_json::Value>)>> {
            let payloads = self.payloads.lock().unwrap_or_else(|e| e.into_inner());
            Ok(ids
                .iter()
                .filter_map(|id| payloads.get(&id.to_string()).map(|p| (id.clone(), p.to_value_map())))
                .collect())
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

        async fn embed(&self, _inputs: &[String]) -> EmbeddingResult<gateway_embeddings::EmbeddingResponse> {
            panic!("relational sync never calls the embedding provider");
        }
    }

    fn agent_record(id: AgentId) -> AgentRecord {
        AgentRecord {
            id,
            name: "Alpha".into(),
            description: "an indexed agent".into(),
            image_url: String::new(),
            active: true,
            has_mcp: false,
            has_a2a: false,
            has_x402: false,
            has_registration_file: false,
            mcp_endpoint: String::new(),
            a2a_endpoint: String::new(),
            oasf_endpoint: String::new(),
            email: String::new(),
            mcp_version: String::new(),
            a2a_version: String::new(),
            mcp_tools: vec![],
            mcp_prompts: vec![],
            mcp_resources: vec![],
            a2a_skills: vec![],
            declared_skills: vec![],
            declared_domains: vec![],
            ens: String::new(),
            did: String::new(),
            owner: "0xabc".into(),
            wallet_address: String::new(),
            operator_addresses: vec![],
            supported_trust_systems: vec![],
            agent_uri: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            resolved_skills: vec![],
            resolved_domains: vec![],
            reputation: 0.0,
            trust_score: 0.0,
            reachable_mcp: false,
            reachable_a2a: false,
            last_reachability_check_at: None,
            curated_by: vec![],
            input_modes: vec![],
            output_modes: vec![],
        }
    }

    fn build_ctx(pool: sqlx::PgPool, store: Arc<FakeVectorStore>) -> AppContext {
        let upstream = UpstreamClient::new("http://unused.invalid/graphql");
        let embeddings = Arc::new(EmbeddingClient::new(Arc::new(FakeEmbeddingProvider), None));
        AppContext::new(pool, store, Arc::new(upstream), reqwest::Client::new(), embeddings, None)
    }

    #[sqlx::test]
    async fn classification_row_updates_payload_and_flags_reembed(pool: sqlx::PgPool) {
        gateway_db::migrate(&pool).await.expect("schema migration");

        let agent_id = AgentId::new(1, "alpha").unwrap();
        let store = Arc::new(FakeVectorStore::default());
        store.seed(build_payload(&agent_record(agent_id.clone()), None));

        SyncMetadataRepository::new(&pool)
            .upsert(&SyncMetadata::new(agent_id.clone(), "e0".into(), "c0".into(), Utc::now()))
            .await
            .expect("seed sync metadata");

        let classification = Classification {
            skills: vec![
                ClassificationEntry { slug: "nlp".into(), confidence: 0.9, reasoning: None },
                ClassificationEntry { slug: "low-conf".into(), confidence: 0.3, reasoning: None },
            ],
            domains: vec![],
            overall_confidence: 0.9,
            source: ClassificationSource::LlmClassification,
            model_version: Some("v1".into()),
            classified_at: Utc::now(),
        };
        ClassificationRepository::new(&pool).upsert(&agent_id, &classification).await.expect("seed classification");

        let ctx = build_ctx(pool.clone(), store.clone());
        let summary = run(&ctx).await.expect("relational sync run");

        assert_eq!(summary.classifications_applied, 1);
        assert!(summary.errors.is_empty());

        let payload = store.get(&agent_id).expect("payload exists");
        assert_eq!(payload.skills, vec!["nlp".to_string()]);
        assert_eq!(payload.skills_with_confidence.len(), 2);

        let meta = SyncMetadataRepository::new(&pool).get(&agent_id).await.expect("load metadata").expect("row exists");
        assert!(meta.needs_reembed);

        let state = SyncStateRepository::new(&pool).load().await.expect("load state");
        assert!(state.last_d1_sync.is_some());
    }

    /// Property P5: a run with nothing to process leaves `last_d1_sync` untouched.
    #[sqlx::test]
    async fn property_p5_zero_rows_leaves_cursor_unchanged(pool: sqlx::PgPool) {
        gateway_db::migrate(&pool).await.expect("schema migration");

        let store = Arc::new(FakeVectorStore::default());
        let ctx = build_ctx(pool.clone(), store);
        let summary = run(&ctx).await.expect("relational sync run");

        assert_eq!(summary.classifications_applied, 0);
        assert_eq!(summary.reputation_applied, 0);
        assert_eq!(summary.trust_applied, 0);

        let state = SyncStateRepository::new(&pool).load().await.expect("load state");
        assert!(state.last_d1_sync.is_none());
    }
}
