//! Embedding provider abstraction and the `OpenAI`-backed implementation
//! (§4.5). Grounded on `dashflow-openai::embeddings::OpenAIEmbeddings`:
//! same client, same chunking idea, generalized into a trait so a second
//! provider can stand in as a fallback.

use crate::error::{EmbeddingError, EmbeddingResult};
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;

/// One batched embedding call's result (§4.5: `{vectors, model, provider, totalTokens?}`).
#[derive(Debug, Clone)]
pub struct EmbeddingResponse {
    pub vectors: Vec<Vec<f32>>,
    pub model: String,
    pub provider: String,
    pub total_tokens: Option<u64>,
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn embed(&self, inputs: &[String]) -> EmbeddingResult<EmbeddingResponse>;
}

/// `OpenAI`-compatible embedding provider. Works against any endpoint
/// speaking the `OpenAI` embeddings wire format (the official API or a
/// compatible gateway), selected by whichever base URL/key is configured.
pub struct OpenAiEmbeddingProvider {
    client: Client<OpenAIConfig>,
    model: String,
    provider_name: String,
}

impl OpenAiEmbeddingProvider {
    pub fn new(provider_name: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key.into());
        Self { client: Client::with_config(config), model: model.into(), provider_name: provider_name.into() }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_base(base_url.into());
        self.client = Client::with_config(config);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn embed(&self, inputs: &[String]) -> EmbeddingResult<EmbeddingResponse> {
        if inputs.is_empty() {
            return Ok(EmbeddingResponse {
                vectors: Vec::new(),
                model: self.model.clone(),
                provider: self.provider_name.clone(),
                total_tokens: None,
            });
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(self.model.clone())
            .input(EmbeddingInput::StringArray(inputs.to_vec()))
            .build()
            .map_err(|e| EmbeddingError::Provider(e.to_string()))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| EmbeddingError::Provider(e.to_string()))?;

        // Preserve caller order: providers are only required to return
        // entries tagged with their originating `index`, not in order.
        let mut data = response.data;
        data.sort_by_key(|d| d.index);

        if data.len() != inputs.len() {
            return Err(EmbeddingError::CountMismatch { expected: inputs.len(), got: data.len() });
        }

        Ok(EmbeddingResponse {
            vectors: data.into_iter().map(|d| d.embedding).collect(),
            model: response.model,
            provider: self.provider_name.clone(),
            total_tokens: Some(u64::from(response.usage.total_tokens)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubProvider {
        name: String,
        vectors: Vec<Vec<f32>>,
    }

    #[async_trait]
    impl EmbeddingProvider for StubProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn embed(&self, inputs: &[String]) -> EmbeddingResult<EmbeddingResponse> {
            Ok(EmbeddingResponse {
                vectors: self.vectors.iter().take(inputs.len()).cloned().collect(),
                model: "stub".to_string(),
                provider: self.name.clone(),
                total_tokens: None,
            })
        }
    }

    #[tokio::test]
    async fn stub_provider_returns_requested_count() {
        let provider = StubProvider { name: "stub".into(), vectors: vec![vec![1.0], vec![2.0]] };
        let response = provider.embed(&["a".to_string(), "b".to_string()]).await.unwrap();
        assert_eq!(response.vectors.len(), 2);
        assert_eq!(response.provider, "stub");
    }
}
