use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Extraction strategy selected from the upload's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image,
}

impl DocumentKind {
    /// `extension` is lower-case and includes the leading dot, e.g. `.pdf`.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            ".pdf" => Some(DocumentKind::Pdf),
            ".jpg" | ".jpeg" | ".png" => Some(DocumentKind::Image),
            _ => None,
        }
    }
}

/// A file received on `/upload`, before it is written to scratch storage.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub id: Uuid,
    /// Client-supplied name reduced to a safe final path component.
    pub filename: String,
    pub extension: String,
    pub content: Vec<u8>,
}

impl UploadedDocument {
    pub fn kind(&self) -> Option<DocumentKind> {
        DocumentKind::from_extension(&self.extension)
    }
}

/// Outcome of summarising a report.
///
/// `Structured` is passed through exactly as the model produced it; the
/// documented keys are `key_findings`, `vital_signs`, `lab_results`,
/// `concerns`, `summary` and `recommendations`, but none are enforced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnalysisResult {
    Structured(Map<String, Value>),
    Summary { summary: String },
    Failed { error: String },
}

impl AnalysisResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, AnalysisResult::Failed { .. })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

/// One user message and its reply. Nothing is kept between calls.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatExchange {
    pub message: String,
    pub response: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

impl From<ChatExchange> for ChatResponse {
    fn from(exchange: ChatExchange) -> Self {
        Self {
            response: exchange.response,
        }
    }
}
