use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

/// Request-level failures. Every variant renders as `{"error": <message>}`.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    MissingFile(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("File content does not match its extension")]
    ContentMismatch,

    #[error("File exceeds maximum size of {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Failed to extract text: {0}")]
    Extraction(String),

    #[error("No text found in file")]
    EmptyContent,

    #[error("{0}")]
    RemoteApi(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::MissingFile(_)
            | ServiceError::UnsupportedFormat(_)
            | ServiceError::ContentMismatch
            | ServiceError::EmptyContent
            | ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ServiceError::Extraction(_) | ServiceError::RemoteApi(_) | ServiceError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Failures talking to the remote chat-completion service.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request to language model failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("language model returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid response format from language model: {0}")]
    InvalidResponse(String),

    #[error("language model agent failed: {0}")]
    Agent(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_4xx() {
        assert_eq!(
            ServiceError::MissingFile("No file uploaded".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::UnsupportedFormat(".txt".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::EmptyContent.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::PayloadTooLarge { limit: 10 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn server_errors_map_to_500() {
        assert_eq!(
            ServiceError::Extraction("bad xref".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServiceError::RemoteApi("Failed to process your message".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn messages_are_human_readable() {
        assert_eq!(
            ServiceError::UnsupportedFormat(".docx".into()).to_string(),
            "Unsupported file format: .docx"
        );
        assert_eq!(ServiceError::EmptyContent.to_string(), "No text found in file");
    }
}
