use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::ServiceError;
use crate::llm::{ChatModel, CompletionRequest};
use crate::models::{AnalysisResult, ChatExchange};

pub const ANALYSIS_FAILED: &str = "Failed to analyze the medical report";
pub const CHAT_FAILED: &str = "Failed to process your message";

const SUMMARY_TEMPERATURE: f64 = 0.1;
const SUMMARY_MAX_TOKENS: u64 = 2048;
const CHAT_TEMPERATURE: f64 = 0.7;
const CHAT_MAX_TOKENS: u64 = 1024;

const ANALYSIS_SYSTEM_PROMPT: &str = r#"You are an expert medical assistant specialized in analyzing medical reports.
Your task is to:
1. Identify key medical findings
2. Extract vital measurements and lab results
3. Highlight any concerning values or abnormalities
4. Provide a clear, structured summary
5. Suggest potential follow-up actions if necessary

Format your response in the following structure:
{
    "key_findings": [list of main medical observations],
    "vital_signs": {relevant measurements},
    "lab_results": {significant values},
    "concerns": [list of abnormal or concerning values],
    "summary": "concise overview",
    "recommendations": [suggested follow-up actions]
}"#;

const CHAT_SYSTEM_PROMPT: &str = "You are an expert medical AI assistant trained to conduct thorough medical conversations.
Format responses clearly, ask relevant follow-up questions, and include disclaimers.";

/// Sends extracted report text or chat messages to the remote model.
#[derive(Clone)]
pub struct AnalysisClient {
    model: Arc<dyn ChatModel>,
    text_model: String,
}

impl AnalysisClient {
    pub fn new(model: Arc<dyn ChatModel>, text_model: impl Into<String>) -> Self {
        Self {
            model,
            text_model: text_model.into(),
        }
    }

    /// Never fails: remote errors come back as `AnalysisResult::Failed`.
    pub async fn summarize(&self, text: &str) -> AnalysisResult {
        let user_prompt = format!(
            "Please analyze this medical report and provide a structured analysis:\n\n{}",
            text
        );
        let request = CompletionRequest::text(&self.text_model, ANALYSIS_SYSTEM_PROMPT, user_prompt)
            .with_sampling(SUMMARY_TEMPERATURE, SUMMARY_MAX_TOKENS);

        match self.model.complete(request).await {
            Ok(reply) => {
                info!(
                    backend = self.model.name(),
                    characters = reply.len(),
                    "Analysis reply received"
                );
                parse_analysis(&reply)
            }
            Err(e) => {
                error!(backend = self.model.name(), "Generating analysis failed: {}", e);
                AnalysisResult::Failed {
                    error: ANALYSIS_FAILED.to_string(),
                }
            }
        }
    }

    pub async fn converse(&self, message: &str) -> Result<ChatExchange, ServiceError> {
        let request = CompletionRequest::text(&self.text_model, CHAT_SYSTEM_PROMPT, message)
            .with_sampling(CHAT_TEMPERATURE, CHAT_MAX_TOKENS);

        let response = self.model.complete(request).await.map_err(|e| {
            error!(backend = self.model.name(), "Chat completion failed: {}", e);
            ServiceError::RemoteApi(CHAT_FAILED.to_string())
        })?;

        Ok(ChatExchange {
            message: message.to_string(),
            response,
        })
    }
}

/// Best-effort structured parse of a model reply.
///
/// The whole reply is tried first, then the outermost `{...}` slice. Only a
/// JSON object counts; anything else becomes `{"summary": reply}`.
pub fn parse_analysis(reply: &str) -> AnalysisResult {
    if let Some(map) = parse_object(reply.trim()) {
        return AnalysisResult::Structured(map);
    }

    if let (Some(start), Some(end)) = (reply.find('{'), reply.rfind('}')) {
        if start < end {
            if let Some(map) = parse_object(&reply[start..=end]) {
                return AnalysisResult::Structured(map);
            }
        }
    }

    warn!("Model reply is not structured JSON, falling back to summary");
    AnalysisResult::Summary {
        summary: reply.to_string(),
    }
}

fn parse_object(candidate: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}
