//! A narrow generative-completion trait for HyDE synthesis (§4.14 step 1).
//!
//! `dashflow-openai::ChatOpenAI` implements the full `dashflow::core`
//! `ChatModel` trait hierarchy (streaming, tool calls, retry policies,
//! rate limiters) — overkill for the one thing this crate needs: "send a
//! system+user prompt, get back the raw text response". As with
//! `gateway-embeddings::EmbeddingProvider`, this defines its own trait
//! scoped to that one call, backed by the same `async-openai` client.

use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;

use crate::error::{SearchError, SearchResult};

#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> SearchResult<String>;
}

pub struct OpenAiGenerativeProvider {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiGenerativeProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key.into());
        Self { client: Client::with_config(config), model: model.into() }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_base(base_url.into());
        self.client = Client::with_config(config);
        self
    }
}

#[async_trait]
impl GenerativeProvider for OpenAiGenerativeProvider {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> SearchResult<String> {
        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt)
            .build()
            .map_err(|e| SearchError::Generative(e.to_string()))?;
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(user_prompt)
            .build()
            .map_err(|e| SearchError::Generative(e.to_string()))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![system.into(), user.into()])
            .build()
            .map_err(|e| SearchError::Generative(e.to_string()))?;

        let response =
            self.client.chat().create(request).await.map_err(|e| SearchError::Generative(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| SearchError::Generative("empty completion response".to_string()))
    }
}
