pub mod analysis;
pub mod config;
pub mod error;
pub mod extract;
pub mod intake;
pub mod llm;
pub mod models;
pub mod service;

pub use analysis::AnalysisClient;
pub use config::ServiceConfig;
pub use error::{ConfigError, LlmError, ServiceError};
pub use extract::TextExtractor;
pub use models::*;
pub use service::{AppState, build_router, create_app};
