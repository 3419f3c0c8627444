use async_trait::async_trait;
use rig::{client::CompletionClient, completion::Prompt, providers::openrouter};
use std::time::Duration;
use tracing::debug;

use super::{ChatModel, CompletionRequest, ContentPart, OpenAiCompatibleModel};
use crate::error::LlmError;

/// Prompts a rig agent on OpenRouter for text. Requests carrying images go
/// to OpenRouter's chat completions endpoint as `image_url` data URLs.
pub struct OpenRouterAgentModel {
    client: openrouter::Client,
    vision: OpenAiCompatibleModel,
}

impl OpenRouterAgentModel {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            client: openrouter::Client::new(api_key),
            vision: OpenAiCompatibleModel::new(base_url, api_key, timeout)?,
        })
    }
}

fn has_images(parts: &[ContentPart]) -> bool {
    parts.iter().any(|part| matches!(part, ContentPart::ImagePng(_)))
}

/// Joins the text parts of a request into a single agent prompt.
fn prompt_text(parts: &[ContentPart]) -> String {
    parts
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text(text) => Some(text.as_str()),
            ContentPart::ImagePng(_) => None,
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl ChatModel for OpenRouterAgentModel {
    fn name(&self) -> &str {
        "openrouter-agent"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        if has_images(&request.content) {
            debug!(model = %request.model, "Routing image request to chat completions");
            return self.vision.complete(request).await;
        }

        let prompt = prompt_text(&request.content);

        let mut builder = self
            .client
            .agent(&request.model)
            .temperature(request.temperature)
            .max_tokens(request.max_tokens);
        if let Some(system) = &request.system {
            builder = builder.preamble(system);
        }
        let agent = builder.build();

        agent
            .prompt(prompt.as_str())
            .await
            .map_err(|e| LlmError::Agent(e.to_string()))
    }
}
