//! Embedding Client (§4.5): primary provider with an optional fallback,
//! selected by which key is configured; batch helper that chunks at
//! N=100 and calls sequentially with a progress callback.

use crate::error::{EmbeddingError, EmbeddingResult};
use crate::provider::{EmbeddingProvider, EmbeddingResponse};
use std::sync::Arc;
use tracing::warn;

pub const BATCH_CHUNK_SIZE: usize = 100;

pub struct EmbeddingClient {
    primary: Arc<dyn EmbeddingProvider>,
    fallback: Option<Arc<dyn EmbeddingProvider>>,
}

impl EmbeddingClient {
    pub fn new(primary: Arc<dyn EmbeddingProvider>, fallback: Option<Arc<dyn EmbeddingProvider>>) -> Self {
        Self { primary, fallback }
    }

    /// One embedding call, falling back to the secondary provider if the
    /// primary fails outright.
    pub async fn embed(&self, inputs: &[String]) -> EmbeddingResult<EmbeddingResponse> {
        match self.primary.embed(inputs).await {
            Ok(response) => Ok(response),
            Err(primary_err) => match &self.fallback {
                Some(fallback) => fallback.embed(inputs).await.map_err(|fallback_err| {
                    warn!(primary = %primary_err, fallback = %fallback_err, "both embedding providers failed");
                    EmbeddingError::BothProvidersFailed {
                        primary: primary_err.to_string(),
                        fallback: fallback_err.to_string(),
                    }
                }),
                None => Err(primary_err),
            },
        }
    }

    /// Chunk `inputs` at [`BATCH_CHUNK_SIZE`], embedding sequentially and
    /// reporting progress after each chunk completes.
    pub async fn embed_batch(
        &self,
        inputs: &[String],
        mut on_progress: impl FnMut(usize, usize),
    ) -> EmbeddingResult<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let total = inputs.len();
        let mut vectors = Vec::with_capacity(total);
        let mut completed = 0;

        for chunk in inputs.chunks(BATCH_CHUNK_SIZE) {
            let response = self.embed(chunk).await?;
            vectors.extend(response.vectors);
            completed += chunk.len();
            on_progress(completed, total);
        }

        Ok(vectors)
    }
}
