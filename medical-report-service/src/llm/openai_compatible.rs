use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, warn};

use super::{ChatModel, CompletionRequest, ContentPart};
use crate::error::LlmError;

/// Chat completions against any OpenAI-compatible endpoint (Groq by default).
pub struct OpenAiCompatibleModel {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl OpenAiCompatibleModel {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
        })
    }
}

/// A lone text part goes out as a plain string, anything else as a parts array.
fn user_content(parts: &[ContentPart]) -> Value {
    if let [ContentPart::Text(text)] = parts {
        return json!(text);
    }

    let items: Vec<Value> = parts
        .iter()
        .map(|part| match part {
            ContentPart::Text(text) => json!({ "type": "text", "text": text }),
            ContentPart::ImagePng(base64_image) => json!({
                "type": "image_url",
                "image_url": { "url": format!("data:image/png;base64,{}", base64_image) }
            }),
        })
        .collect();
    Value::Array(items)
}

/// Builds the chat completions body with an optional system message.
pub(crate) fn build_payload(request: &CompletionRequest) -> Value {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = &request.system {
        messages.push(json!({ "role": "system", "content": system }));
    }
    messages.push(json!({ "role": "user", "content": user_content(&request.content) }));

    json!({
        "model": request.model,
        "messages": messages,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens
    })
}

#[async_trait]
impl ChatModel for OpenAiCompatibleModel {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let payload = build_payload(&request);
        debug!(model = %request.model, endpoint = %self.endpoint, "Sending chat completion");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Chat completion request failed");
            return Err(LlmError::Status { status, body });
        }

        let response_json: Value = response.json().await?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::InvalidResponse("missing choices[0].message.content".into()))?;

        Ok(content.to_string())
    }
}
