pub mod openai_compatible;
pub mod openrouter_agent;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{LlmConfig, LlmProvider};
use crate::error::LlmError;

pub use openai_compatible::OpenAiCompatibleModel;
pub use openrouter_agent::OpenRouterAgentModel;

#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    /// Base64-encoded PNG bytes.
    ImagePng(String),
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub system: Option<String>,
    pub content: Vec<ContentPart>,
    pub temperature: f64,
    pub max_tokens: u64,
}

impl CompletionRequest {
    pub fn text(model: impl Into<String>, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: Some(system.into()),
            content: vec![ContentPart::Text(user.into())],
            temperature: 0.0,
            max_tokens: 1024,
        }
    }

    pub fn with_sampling(mut self, temperature: f64, max_tokens: u64) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }
}

/// A single-shot chat completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

/// Builds the backend selected by `LLM_PROVIDER`. Both talk to `config.base_url`.
pub fn build_chat_model(config: &LlmConfig) -> Result<Arc<dyn ChatModel>, LlmError> {
    let model: Arc<dyn ChatModel> = match config.provider {
        LlmProvider::Groq => Arc::new(OpenAiCompatibleModel::new(
            &config.base_url,
            &config.api_key,
            config.timeout,
        )?),
        LlmProvider::OpenRouter => Arc::new(OpenRouterAgentModel::new(
            &config.base_url,
            &config.api_key,
            config.timeout,
        )?),
    };
    Ok(model)
}
