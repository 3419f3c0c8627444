use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, State, rejection::JsonRejection},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{Instrument, error, info, warn};
use uuid::Uuid;

use crate::{
    analysis::AnalysisClient,
    config::ServiceConfig,
    error::ServiceError,
    extract::{TextExtractor, build_ocr_engine},
    intake::{content_matches, receive_upload, store_upload},
    llm::{ChatModel, build_chat_model},
    models::{AnalysisResult, ChatRequest, ChatResponse},
};

type ApiResult<T> = Result<Json<T>, ServiceError>;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub extractor: TextExtractor,
    pub analysis: AnalysisClient,
}

impl AppState {
    pub fn new(config: ServiceConfig, chat_model: Arc<dyn ChatModel>) -> Self {
        let ocr = build_ocr_engine(&config.ocr, chat_model.clone(), &config.llm.vision_model);
        let analysis = AnalysisClient::new(chat_model, config.llm.text_model.clone());
        Self {
            config: Arc::new(config),
            extractor: TextExtractor::new(ocr),
            analysis,
        }
    }
}

/// Builds the remote client and the router. Creates the upload directory.
pub async fn create_app(config: ServiceConfig) -> anyhow::Result<Router> {
    tokio::fs::create_dir_all(&config.uploads.dir).await?;
    let chat_model = build_chat_model(&config.llm)?;
    info!(backend = chat_model.name(), model = %config.llm.text_model, "Language model client ready");
    Ok(build_router(AppState::new(config, chat_model)))
}

/// Page routes, the upload and chat APIs, and `/static`, behind tracing, CORS and
/// the body limit.
pub fn build_router(app_state: AppState) -> Router {
    let body_limit = app_state.config.uploads.max_bytes + MULTIPART_OVERHEAD;
    let static_files = ServeDir::new(&app_state.config.static_dir);

    Router::new()
        .route("/", get(index_page))
        .route("/mr", get(medical_report_page))
        .route("/pg", get(prescription_generator_page))
        .route("/chat", get(chat_page).post(chat))
        .route("/dc", get(doctor_consult_page))
        .route("/dd", get(drug_data_page))
        .route("/vr", get(vaccination_records_page))
        .route("/chatbot", get(chatbot_page))
        .route("/health", get(health_check))
        .route("/upload", post(upload_report))
        .nest_service("/static", static_files)
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(correlation_id_middleware))
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(app_state)
}

/// Stamps every request with an `x-correlation-id` and runs it in a span.
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let correlation_id = Uuid::new_v4().to_string();
    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Serves `<template_dir>/<page>.html`, or a 404 JSON error if it is missing.
async fn render_page(state: &AppState, page: &str) -> Response {
    let path = state.config.template_dir.join(format!("{page}.html"));
    match tokio::fs::read_to_string(&path).await {
        Ok(body) => Html(body).into_response(),
        Err(e) => {
            warn!(page, path = %path.display(), "Template unavailable: {}", e);
            (StatusCode::NOT_FOUND, Json(json!({ "error": "Page not found" }))).into_response()
        }
    }
}

async fn index_page(State(state): State<AppState>) -> Response {
    render_page(&state, "index").await
}

async fn medical_report_page(State(state): State<AppState>) -> Response {
    render_page(&state, "mr").await
}

async fn prescription_generator_page(State(state): State<AppState>) -> Response {
    render_page(&state, "pg").await
}

async fn chat_page(State(state): State<AppState>) -> Response {
    render_page(&state, "chat").await
}

async fn doctor_consult_page(State(state): State<AppState>) -> Response {
    render_page(&state, "dc").await
}

async fn drug_data_page(State(state): State<AppState>) -> Response {
    render_page(&state, "dd").await
}

async fn vaccination_records_page(State(state): State<AppState>) -> Response {
    render_page(&state, "vr").await
}

async fn chatbot_page(State(state): State<AppState>) -> Response {
    render_page(&state, "chatbot").await
}

/// Intake, extraction and analysis for one uploaded report.
async fn upload_report(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ServiceError> {
    let uploads = &state.config.uploads;

    // Step 1: read the file part
    let document = receive_upload(&mut multipart, uploads).await?;

    // Step 2: validate the extension and content before touching disk
    let kind = document
        .kind()
        .ok_or_else(|| ServiceError::UnsupportedFormat(display_extension(&document.extension)))?;

    if uploads.verify_content_type && !content_matches(kind, &document.content) {
        warn!(document_id = %document.id, ?kind, "Upload content does not match extension");
        return Err(ServiceError::ContentMismatch);
    }

    // Step 3: store and extract. The stored file goes away once text is out
    let stored = store_upload(&document, uploads).await?;
    let text = state
        .extractor
        .extract(kind, stored.path())
        .await
        .inspect_err(|e| warn!(document_id = %document.id, "Extraction failed: {}", e))?;
    drop(stored);

    // Step 4: analyze
    let analysis = state.analysis.summarize(&text).await;
    if analysis.is_failure() {
        error!(document_id = %document.id, "Analysis failed");
        return Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(analysis)).into_response());
    }

    info!(document_id = %document.id, structured = matches!(analysis, AnalysisResult::Structured(_)), "Analysis completed");
    Ok(Json(analysis).into_response())
}

/// Extension as shown in `Unsupported file format` messages.
fn display_extension(extension: &str) -> String {
    if extension.is_empty() {
        "(none)".to_string()
    } else {
        extension.to_string()
    }
}

/// Forwards the message to the model and returns its reply.
async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<ChatResponse> {
    let Json(request) = payload
        .map_err(|e| ServiceError::InvalidRequest(format!("Invalid chat request: {}", e.body_text())))?;

    let exchange = state.analysis.converse(&request.message).await?;
    Ok(Json(exchange.into()))
}
