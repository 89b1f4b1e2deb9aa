//! Vector Store Adapter (§4.6): wraps `qdrant-client` and translates the
//! store-agnostic [`gateway_core::FilterTree`] into Qdrant's native filter
//! representation.
//!
//! The upsert/search/delete/get-by-ids shapes below mirror the builder
//! pattern the teacher crate uses for its own Qdrant integration. Scroll,
//! count, and payload-only updates have no teacher counterpart and are
//! extended here following the same builder conventions.

mod error;
mod filter;

pub use error::{VectorError, VectorResult};

use async_trait::async_trait;
use gateway_core::payload::Payload;
use gateway_core::{AgentId, FilterTree};
use qdrant_client::qdrant::{
    CountPointsBuilder, DeletePointsBuilder, GetPointsBuilder, PointId, PointStruct, PointsIdsList,
    ScrollPointsBuilder, SetPayloadPointsBuilder, UpsertPointsBuilder,
};
use qdrant_client::{Payload as QdrantPayload, Qdrant};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// A single scored search hit returned from the vector store.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub agent_id: AgentId,
    pub score: f32,
    pub payload: BTreeMap<String, serde_json::Value>,
}

/// A scrolled page of points, with a cursor to resume from.
#[derive(Debug, Clone)]
pub struct ScrollPage {
    pub agent_ids: Vec<AgentId>,
    pub next_offset: Option<String>,
}

/// The store-agnostic surface every worker and the search service depend
/// on. Production code talks to [`QdrantVectorStore`]; tests can supply an
/// in-memory fake.
#[async_trait]
pub trait VectorStoreAdapter: Send + Sync {
    async fn upsert(&self, points: Vec<(AgentId, Vec<f32>, Payload)>) -> VectorResult<()>;

    async fn set_payload_by_agent_id(&self, agent_id: &AgentId, payload: &Payload) -> VectorResult<()>;

    async fn search(
        &self,
        vector: Vec<f32>,
        limit: u64,
        offset: u64,
        filter: Option<&FilterTree>,
    ) -> VectorResult<Vec<SearchHit>>;

    async fn scroll(
        &self,
        limit: u32,
        offset: Option<String>,
        filter: Option<&FilterTree>,
    ) -> VectorResult<ScrollPage>;

    async fn count(&self, filter: Option<&FilterTree>) -> VectorResult<u64>;

    async fn get_by_ids(&self, ids: &[AgentId]) -> VectorResult<Vec<(AgentId, BTreeMap<String, serde_json::Value>)>>;

    async fn delete(&self, ids: &[AgentId]) -> VectorResult<()>;

    async fn delete_by_filter(&self, filter: &FilterTree) -> VectorResult<()>;
}

pub struct QdrantVectorStore {
    client: Arc<Qdrant>,
    collection_name: String,
}

impl QdrantVectorStore {
    pub fn new(client: Arc<Qdrant>, collection_name: impl Into<String>) -> Self {
        Self { client, collection_name: collection_name.into() }
    }
}

#[async_trait]
impl VectorStoreAdapter for QdrantVectorStore {
    #[instrument(skip(self, points), fields(count = points.len()))]
    async fn upsert(&self, points: Vec<(AgentId, Vec<f32>, Payload)>) -> VectorResult<()> {
        if points.is_empty() {
            return Ok(());
        }

        const BATCH_SIZE: usize = 100;
        for batch in points.chunks(BATCH_SIZE) {
            let batch_points: Vec<PointStruct> = batch
                .iter()
                .map(|(id, vector, payload)| {
                    let qdrant_payload: QdrantPayload = payload_to_qdrant(payload);
                    PointStruct {
                        id: Some(PointId::from(id.to_point_id())),
                        vectors: Some(vector.clone().into()),
                        payload: qdrant_payload.into(),
                    }
                })
                .collect();

            self.client
                .upsert_points(UpsertPointsBuilder::new(&self.collection_name, batch_points).wait(true))
                .await
                .map_err(|e| VectorError::Store(e.to_string()))?;
        }

        debug!("upserted points to qdrant");
        Ok(())
    }

    async fn set_payload_by_agent_id(&self, agent_id: &AgentId, payload: &Payload) -> VectorResult<()> {
        let qdrant_payload = payload_to_qdrant(payload);
        let point_id = PointId::from(agent_id.to_point_id());
        self.client
            .set_payload(
                SetPayloadPointsBuilder::new(&self.collection_name, qdrant_payload)
                    .points(vec![point_id])
                    .wait(true),
            )
            .await
            .map_err(|e| VectorError::Store(e.to_string()))?;
        Ok(())
    }

    async fn search(
        &self,
        vector: Vec<f32>,
        limit: u64,
        offset: u64,
        filter: Option<&FilterTree>,
    ) -> VectorResult<Vec<SearchHit>> {
        let mut builder = qdrant_client::qdrant::QueryPointsBuilder::new(&self.collection_name)
            .query(vector)
            .limit(limit)
            .offset(offset)
            .with_payload(true)
            .with_vectors(false);

        if let Some(tree) = filter {
            builder = builder.filter(filter::to_qdrant_filter(tree));
        }

        let response = self
            .client
            .query(builder)
            .await
            .map_err(|e| VectorError::Store(e.to_string()))?;

        let hits = response
            .result
            .into_iter()
            .filter_map(|scored_point| {
                let point_id = scored_point.id.as_ref()?;
                let point_id_str = point_id_to_string(point_id);
                let agent_id = gateway_core::payload::agent_id_from_point_id(&point_id_str)?;
                let payload = qdrant_payload_to_map(scored_point.payload);
                Some(SearchHit { agent_id, score: scored_point.score, payload })
            })
            .collect();

        Ok(hits)
    }

    async fn scroll(
        &self,
        limit: u32,
        offset: Option<String>,
        filter: Option<&FilterTree>,
    ) -> VectorResult<ScrollPage> {
        let mut builder = ScrollPointsBuilder::new(&self.collection_name)
            .limit(limit)
            .with_payload(true)
            .with_vectors(false);

        if let Some(o) = &offset {
            builder = builder.offset(PointId::from(o.clone()));
        }
        if let Some(tree) = filter {
            builder = builder.filter(filter::to_qdrant_filter(tree));
        }

        let response = self
            .client
            .scroll(builder)
            .await
            .map_err(|e| VectorError::Store(e.to_string()))?;

        let next_offset = response.next_page_offset.as_ref().map(point_id_to_string);
        let agent_ids = response
            .result
            .iter()
            .filter_map(|p| p.id.as_ref())
            .map(point_id_to_string)
            .filter_map(|s| gateway_core::payload::agent_id_from_point_id(&s))
            .collect();

        Ok(ScrollPage { agent_ids, next_offset })
    }

    async fn count(&self, filter: Option<&FilterTree>) -> VectorResult<u64> {
        let mut builder = CountPointsBuilder::new(&self.collection_name).exact(true);
        if let Some(tree) = filter {
            builder = builder.filter(filter::to_qdrant_filter(tree));
        }
        let response = self
            .client
            .count(builder)
            .await
            .map_err(|e| VectorError::Store(e.to_string()))?;
        Ok(response.result.map(|r| r.count).unwrap_or(0))
    }

    async fn get_by_ids(&self, ids: &[AgentId]) -> VectorResult<Vec<(AgentId, BTreeMap<String, serde_json::Value>)>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let point_ids: Vec<PointId> = ids.iter().map(|id| PointId::from(id.to_point_id())).collect();

        let response = self
            .client
            .get_points(GetPointsBuilder::new(&self.collection_name, point_ids).with_payload(true))
            .await
            .map_err(|e| VectorError::Store(e.to_string()))?;

        let results = response
            .result
            .into_iter()
            .filter_map(|point| {
                let point_id_str = point.id.as_ref().map(point_id_to_string)?;
                let agent_id = gateway_core::payload::agent_id_from_point_id(&point_id_str)?;
                Some((agent_id, qdrant_payload_to_map(point.payload)))
            })
            .collect();

        Ok(results)
    }

    async fn delete(&self, ids: &[AgentId]) -> VectorResult<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let point_ids: Vec<PointId> = ids.iter().map(|id| PointId::from(id.to_point_id())).collect();

        let result = self
            .client
            .delete_points(
                DeletePointsBuilder::new(&self.collection_name)
                    .points(PointsIdsList { ids: point_ids })
                    .wait(true),
            )
            .await
            .map_err(|e| VectorError::Store(e.to_string()))?;

        if !result.result.is_some_and(|r| r.status == qdrant_client::qdrant::UpdateStatus::Completed as i32) {
            warn!("qdrant delete did not report completed status");
        }
        Ok(())
    }

    async fn delete_by_filter(&self, filter: &FilterTree) -> VectorResult<()> {
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection_name)
                    .points(filter::to_qdrant_filter(filter))
                    .wait(true),
            )
            .await
            .map_err(|e| VectorError::Store(e.to_string()))?;
        Ok(())
    }
}

fn payload_to_qdrant(payload: &Payload) -> QdrantPayload {
    let map = payload.to_value_map();
    let json_map: serde_json::Map<String, serde_json::Value> = map.into_iter().collect();
    QdrantPayload::try_from(serde_json::Value::Object(json_map)).unwrap_or_else(|_| QdrantPayload::new())
}

fn qdrant_payload_to_map(
    payload: std::collections::HashMap<String, qdrant_client::qdrant::Value>,
) -> BTreeMap<String, serde_json::Value> {
    payload
        .into_iter()
        .map(|(k, v)| (k, qdrant_value_to_json(v)))
        .collect()
}

fn qdrant_value_to_json(value: qdrant_client::qdrant::Value) -> serde_json::Value {
    use qdrant_client::qdrant::value::Kind;

    match value.kind {
        Some(Kind::NullValue(_)) => serde_json::Value::Null,
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(b),
        Some(Kind::IntegerValue(i)) => serde_json::Value::Number(serde_json::Number::from(i)),
        Some(Kind::DoubleValue(f)) => {
            serde_json::Number::from_f64(f).map(serde_json::Value::Number).unwrap_or(serde_json::Value::Null)
        }
        Some(Kind::StringValue(s)) => serde_json::Value::String(s),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.into_iter().map(qdrant_value_to_json).collect())
        }
        Some(Kind::StructValue(struct_val)) => {
            let map: serde_json::Map<String, serde_json::Value> =
                struct_val.fields.into_iter().map(|(k, v)| (k, qdrant_value_to_json(v))).collect();
            serde_json::Value::Object(map)
        }
        None => serde_json::Value::Null,
    }
}

fn point_id_to_string(point_id: &PointId) -> String {
    match &point_id.point_id_options {
        Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(n)) => n.to_string(),
        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(s)) => s.clone(),
        None => String::new(),
    }
}
