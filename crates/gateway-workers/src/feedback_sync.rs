//! Feedback Sync Worker (§4.12): pull new feedback events from the
//! upstream indexer, dedupe against the feedback table, and fold each new
//! event into the reputation aggregate incrementally.

use chrono::{DateTime, Utc};
use gateway_core::ReputationAggregate;
use gateway_db::{FeedbackRepository, ReputationRepository, SyncStateRepository};
use tracing::{info, instrument, warn};

use crate::context::AppContext;
use crate::error::{RunResult, WorkerError};

/// Counters for one feedback-sync pass.
#[derive(Debug, Default)]
pub struct FeedbackSyncSummary {
    pub pulled: u64,
    pub inserted: u64,
    pub duplicates: u64,
    pub errors: Vec<WorkerError>,
}

/// Run one feedback-sync pass (§4.12).
#[instrument(skip(ctx), name = "feedback_sync")]
pub async fn run(ctx: &AppContext) -> RunResult<FeedbackSyncSummary> {
    let state_repo = SyncStateRepository::new(&ctx.pool);
    let mut state = state_repo.load().await?;
    let since = state.last_feedback_created_at.unwrap_or_else(|| DateTime::<Utc>::MIN_UTC);

    let pull = gateway_upstream::pull_feedback(&ctx.upstream, since).await?;
    if pull.truncated {
        warn!(worker = "feedback_sync", "upstream feedback pull hit the safety cap");
    }

    let feedback_repo = FeedbackRepository::new(&ctx.pool);
    let reputation_repo = ReputationRepository::new(&ctx.pool);

    let mut summary = FeedbackSyncSummary::default();
    let mut max_created_at = since;

    for parsed in pull.feedback {
        for w in &parsed.warnings {
            warn!(worker = "feedback_sync", field = %w.field, message = %w.message, "parse warning");
        }
        let Some(event) = parsed.event else {
            continue;
        };
        summary.pulled += 1;
        if event.created_at > max_created_at {
            max_created_at = event.created_at;
        }

        match apply_event(&feedback_repo, &reputation_repo, &event).await {
            Ok(true) => summary.inserted += 1,
            Ok(false) => summary.duplicates += 1,
            Err(e) => {
                warn!(worker = "feedback_sync", agent_id = %event.agent_id, error = %e, "feedback apply failed");
                summary.errors.push(WorkerError::new(Some(event.agent_id.clone()), e.to_string()));
            }
        }
    }

    state.last_graph_feedback_sync = Some(Utc::now());
    if max_created_at > since {
        state.last_feedback_created_at = Some(max_created_at);
    }
    state.feedback_synced += summary.inserted;
    if !summary.errors.is_empty() {
        state.last_error = Some(format!("{} feedback event(s) failed during sync", summary.errors.len()));
    }
    state_repo.save(&state).await?;

    info!(
        worker = "feedback_sync",
        pulled = summary.pulled,
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        errors = summary.errors.len(),
        "run complete"
    );

    Ok(summary)
}

/// Insert one event if new, then fold its score into the agent's
/// reputation aggregate. Returns `Ok(false)` for a duplicate (I5).
async fn apply_event(
    feedback_repo: &FeedbackRepository<'_>,
    reputation_repo: &ReputationRepository<'_>,
    event: &gateway_core::FeedbackEvent,
) -> RunResult<bool> {
    let inserted = feedback_repo.insert_if_new(event).await?;
    if !inserted {
        return Ok(false);
    }

    let now = Utc::now();
    let current = reputation_repo.get(&event.agent_id).await?.unwrap_or_else(|| ReputationAggregate::zero(now));
    let updated = current.apply_feedback(event.score, now);
    reputation_repo.upsert(&event.agent_id, &updated).await?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::AgentId;
    use gateway_embeddings::{EmbeddingClient, EmbeddingProvider, EmbeddingResult};
    use gateway_upstream::UpstreamClient;
    use gateway_vector::{ScrollPage, SearchHit, VectorError, VectorResult, VectorStoreAdapter};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct NullVectorStore;

    #[async_trait::async_trait]
    impl VectorStoreAdapter for NullVectorStore {
        async fn upsert(&self, _points: Vec<(AgentId, Vec<f32>, gateway_core::Payload)>) -> VectorResult<()> {
            Ok(())
        }
        async fn set_payload_by_agent_id(
            &self,
            _agent_id: &AgentId,
            _payload: &gateway_core::Payload,
        ) -> VectorResult<()> {
            Ok(())
        }
        async fn search(
            &self,
            _vector: Vec<f32>,
            _limit: u64,
            _offset: u64,
            _filter: Option<&gateway_core::FilterTree>,
        ) -> VectorResult<Vec<SearchHit>> {
            Ok(Vec::new())
        }
        async fn scroll(
            &self,
            _limit: u32,
            _offset: Option<String>,
            _filter: Option<&gateway_core::FilterTree>,
        ) -> VectorResult<ScrollPage> {
            Ok(ScrollPage { agent_ids: Vec::new(), next_offset: None })
        }
        async fn count(&self, _filter: Option<&gateway_core::FilterTree>) -> VectorResult<u64> {
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
        async fn delete_by_filter(&self, _filter: &gateway_core::FilterTree) -> VectorResult<()> {
            Err(VectorError::Store("not implemented in fake".into()))
        }
    }

    struct PanicEmbeddingProvider;

    #[async_trait::async_trait]
    impl EmbeddingProvider for PanicEmbeddingProvider {
        fn name(&self) -> &str {
            "panic"
        }
        async fn embed(&self, _inputs: &[String]) -> EmbeddingResult<gateway_embeddings::EmbeddingResponse> {
            panic!("feedback sync never calls the embedding provider");
        }
    }

    fn build_ctx(pool: sqlx::PgPool, server: &MockServer) -> AppContext {
        let upstream = UpstreamClient::with_endpoint_for_test(format!("{}/graphql", server.uri()));
        let embeddings = Arc::new(EmbeddingClient::new(Arc::new(PanicEmbeddingProvider), None));
        AppContext::new(pool, Arc::new(NullVectorStore), Arc::new(upstream), reqwest::Client::new(), embeddings, None)
    }

    #[sqlx::test]
    async fn new_feedback_is_inserted_and_folded_into_reputation(pool: sqlx::PgPool) {
        gateway_db::migrate(&pool).await.expect("schema migration");

        let server = MockServer::start().await;
        let node = json!({
            "id": "1",
            "chainId": 1,
            "tokenId": "alpha",
            "score": 80,
            "tag1": "",
            "tag2": "",
            "submitterAddress": "0xABC",
            "createdAt": 1_700_000_000,
            "transactionHash": "0xdead",
            "isRevoked": false,
        });
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"feedbacks": [node]}})))
            .mount(&server)
            .await;

        let ctx = build_ctx(pool.clone(), &server);
        let summary = run(&ctx).await.expect("feedback sync run");

        assert_eq!(summary.pulled, 1);
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.duplicates, 0);

        let agent_id = AgentId::new(1, "alpha").unwrap();
        let aggregate = ReputationRepository::new(&pool).get(&agent_id).await.expect("load aggregate").expect("row exists");
        assert_eq!(aggregate.feedback_count, 1);
        assert_eq!(aggregate.average_score, 80.0);

        let state = SyncStateRepository::new(&pool).load().await.expect("load state");
        assert_eq!(state.feedback_synced, 1);
        assert!(state.last_feedback_created_at.is_some());
    }

    /// I5: re-running against the same upstream data a second time (the
    /// indexer re-serves the same page because the cursor has not moved
    /// far enough to exclude it) must not double-count reputation.
    #[sqlx::test]
    async fn duplicate_external_id_is_not_recounted(pool: sqlx::PgPool) {
        gateway_db::migrate(&pool).await.expect("schema migration");

        let server = MockServer::start().await;
        let node = json!({
            "id": "1",
            "chainId": 1,
            "tokenId": "alpha",
            "score": 80,
            "submitterAddress": "0xABC",
            "createdAt": 1_700_000_000,
            "transactionHash": "0xdead",
            "isRevoked": false,
        });
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"feedbacks": [node]}})))
            .mount(&server)
            .await;

        let ctx = build_ctx(pool.clone(), &server);
        run(&ctx).await.expect("first run");
        let second = run(&ctx).await.expect("second run");

        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 1);

        let agent_id = AgentId::new(1, "alpha").unwrap();
        let aggregate = ReputationRepository::new(&pool).get(&agent_id).await.expect("load aggregate").expect("row exists");
        assert_eq!(aggregate.feedback_count, 1, "duplicate event must not be recounted");
    }
}
