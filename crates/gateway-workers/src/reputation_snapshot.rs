//! Reputation Snapshot Worker (§4.15, 24-hour cadence): a full recompute
//! of every agent's reputation aggregate from its raw feedback history,
//! refreshing trending buckets and correcting any drift the incremental
//! updater (§4.7) accumulated between snapshots.
//!
//! The source names this job only as "reputation snapshot (for
//! trending)" with no further contract; this reuses
//! `ReputationAggregate::recompute` (already exact-equal to the
//! incremental path per its own test) as the obvious batch counterpart.

use chrono::Utc;
use gateway_db::{FeedbackRepository, ReputationRepository};
use tracing::{info, instrument, warn};

use crate::context::AppContext;
use crate::error::{RunResult, WorkerError};

#[derive(Debug, Default)]
pub struct ReputationSnapshotSummary {
    pub agents_recomputed: u64,
    pub errors: Vec<WorkerError>,
}

/// Run one reputation-snapshot pass (§4.15).
#[instrument(skip(ctx), name = "reputation_snapshot")]
pub async fn run(ctx: &AppContext) -> RunResult<ReputationSnapshotSummary> {
    let now = Utc::now();
    let feedback_repo = FeedbackRepository::new(&ctx.pool);
    let reputation_repo = ReputationRepository::new(&ctx.pool);

    let agent_ids = feedback_repo.distinct_agent_ids().await?;
    let mut summary = ReputationSnapshotSummary::default();

    for agent_id in agent_ids {
        let scores = match feedback_repo.scores_for_agent(&agent_id).await {
            Ok(scores) => scores,
            Err(e) => {
                warn!(worker = "reputation_snapshot", agent_id = %agent_id, error = %e, "failed to load scores");
                summary.errors.push(WorkerError::new(Some(agent_id), e.to_string()));
                continue;
            }
        };

        let recomputed = gateway_core::ReputationAggregate::recompute(&scores, now);
        if let Err(e) = reputation_repo.upsert(&agent_id, &recomputed).await {
            warn!(worker = "reputation_snapshot", agent_id = %agent_id, error = %e, "failed to persist recomputed aggregate");
            summary.errors.push(WorkerError::new(Some(agent_id), e.to_string()));
            continue;
        }
        summary.agents_recomputed += 1;
    }

    info!(
        worker = "reputation_snapshot",
        agents_recomputed = summary.agents_recomputed,
        errors = summary.errors.len(),
        "run complete"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::{AgentId, FeedbackEvent};

    async fn build_ctx(pool: sqlx::PgPool) -> AppContext {
        use gateway_embeddings::{EmbeddingClient, EmbeddingProvider, EmbeddingResult};
        use gateway_upstream::UpstreamClient;
        use gateway_vector::{ScrollPage, SearchHit, VectorError, VectorResult, VectorStoreAdapter};
        use std::collections::BTreeMap;
        use std::sync::Arc;

        struct NullVectorStore;
        #[async_trait::async_trait]
        impl VectorStoreAdapter for NullVectorStore {
            async fn upsert(&self, _points: Vec<(AgentId, Vec<f32>, gateway_core::Payload)>) -> VectorResult<()> {
                Ok(())
            }
            async fn set_payload_by_agent_id(&self, _agent_id: &AgentId, _payload: &gateway_core::Payload) -> VectorResult<()> {
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
            async fn scroll(&self, _limit: u32, _offset: Option<String>, _filter: Option<&gateway_core::FilterTree>) -> VectorResult<ScrollPage> {
                Ok(ScrollPage { agent_ids: Vec::new(), next_offset: None })
            }
            async fn count(&self, _filter: Option<&gateway_core::FilterTree>) -> VectorResult<u64> {
                Ok(0)
            }
            async fn get_by_ids(&self, _ids: &[AgentId]) -> VectorResult<Vec<(AgentId, BTreeMap<String, serde_json::Value>)>> {
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
                panic!("reputation snapshot never calls the embedding provider");
            }
        }

        let upstream = UpstreamClient::with_endpoint_for_test("http://127.0.0.1:1/graphql".to_string());
        let embeddings = Arc::new(EmbeddingClient::new(Arc::new(PanicEmbeddingProvider), None));
        AppContext::new(pool, Arc::new(NullVectorStore), Arc::new(upstream), reqwest::Client::new(), embeddings, None)
    }

    #[sqlx::test]
    async fn recompute_matches_incremental_history(pool: sqlx::PgPool) {
        gateway_db::migrate(&pool).await.expect("schema migration");
        let ctx = build_ctx(pool.clone()).await;

        let agent_id = AgentId::new(1, "alpha").unwrap();
        let feedback_repo = FeedbackRepository::new(&pool);
        let reputation_repo = ReputationRepository::new(&pool);

        let mut aggregate = gateway_core::ReputationAggregate::zero(Utc::now());
        for (i, score) in [80u8, 40, 95].into_iter().enumerate() {
            let event = FeedbackEvent {
                external_id: format!("graph:{i}"),
                agent_id: agent_id.clone(),
                chain_id: 1,
                score,
                tags: vec![],
                context: None,
                uri: None,
                submitter_address: "0xabc".into(),
                created_at: Utc::now(),
                transaction_hash: format!("0x{i}"),
            };
            feedback_repo.insert_if_new(&event).await.unwrap();
            aggregate = aggregate.apply_feedback(score, Utc::now());
        }
        reputation_repo.upsert(&agent_id, &aggregate).await.unwrap();

        let summary = run(&ctx).await.expect("snapshot run");
        assert_eq!(summary.agents_recomputed, 1);

        let recomputed = reputation_repo.get(&agent_id).await.unwrap().unwrap();
        assert_eq!(recomputed.feedback_count, 3);
        assert_eq!(recomputed.average_score, aggregate.average_score);
    }
}
