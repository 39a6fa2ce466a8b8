use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    error_handling::HandleErrorLayer,
    extract::{Path, State},
    http::{Method, StatusCode},
    routing::{get, post},
    BoxError, Json, Router,
};
use chrono::Utc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::Settings;
use crate::error::AppError;
use crate::llm::{Generator, OllamaClient};
use crate::major::{self, Major};
use crate::models::{AskRequest, AskResponse, DeleteResponse, MajorInfo, QuestionRecord};
use crate::prompt::PromptTemplate;
use crate::rag::embeddings::{build_embedder, Embedder};
use crate::rag::{AnswerGenerator, IndexRegistry};
use crate::store::QuestionLog;

pub struct AppState {
    pub registry: IndexRegistry,
    pub answers: AnswerGenerator,
    pub log: QuestionLog,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        settings: &Settings,
        generator: Arc<dyn Generator>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        let template = PromptTemplate::from_settings(&settings.prompt)?;
        Ok(Self {
            registry: IndexRegistry::new(
                settings.corpus.clone(),
                Arc::clone(&embedder),
                settings.embedding.batch_size,
            ),
            answers: AnswerGenerator::new(
                generator,
                embedder,
                template,
                settings.retrieval.clone(),
            ),
            log: QuestionLog::new(),
            request_timeout: settings.server.request_timeout(),
        })
    }

    /// Wires the Ollama generation and embedding backends named in `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let generator = Arc::new(OllamaClient::new(&settings.ollama)?);
        let embedder = build_embedder(&settings.embedding, &settings.ollama)?;
        Self::new(settings, generator, embedder)
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    let timeout = state.request_timeout;

    Router::new()
        .route("/ask", post(ask_handler).get(list_questions_handler))
        .route("/ask/:id", get(get_question_handler).delete(delete_question_handler))
        .route("/majors", get(list_majors_handler))
        .route("/api/health", get(health_check))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_timeout))
                .timeout(timeout),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn handle_timeout(err: BoxError) -> (StatusCode, Json<serde_json::Value>) {
    if err.is::<tower::timeout::error::Elapsed>() {
        tracing::error!("Request timed out");
        (
            StatusCode::GATEWAY_TIMEOUT,
            Json(serde_json::json!({ "detail": "Server xử lý quá lâu (timeout)" })),
        )
    } else {
        tracing::error!("Unhandled middleware error: {}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "detail": err.to_string() })),
        )
    }
}

async fn ask_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let request_id = Uuid::new_v4();
    let detected = major::resolve(&request.question, &request.major);
    tracing::info!(
        %request_id,
        "Received question={}, major={}, detected_major={}",
        request.question,
        request.major,
        detected.as_ref().map(|m| m.label()).unwrap_or("-")
    );
    let major = detected?;

    let index = state.registry.get_or_build(major).await?;
    let answer = state
        .answers
        .answer(&index, &request.question, major)
        .await?;

    let record = state.log.create(request.question, answer, major).await;
    tracing::info!(%request_id, id = record.id, "Answered");

    Ok(Json(AskResponse {
        id: record.id,
        question: record.question,
        answer: record.answer,
    }))
}

async fn list_questions_handler(State(state): State<Arc<AppState>>) -> Json<Vec<QuestionRecord>> {
    Json(state.log.list().await)
}

async fn get_question_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<QuestionRecord>, AppError> {
    Ok(Json(state.log.get(id).await?))
}

async fn delete_question_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<DeleteResponse>, AppError> {
    state.log.delete(id).await?;
    tracing::info!(id, "Deleted question");
    Ok(Json(DeleteResponse {
        message: format!("Đã xoá câu hỏi ID {}", id),
    }))
}

async fn list_majors_handler(State(state): State<Arc<AppState>>) -> Json<Vec<MajorInfo>> {
    Json(
        Major::ALL
            .iter()
            .map(|m| MajorInfo {
                label: m.label(),
                code: m.code(),
                cached: state.registry.is_cached(*m),
            })
            .collect(),
    )
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let ollama_healthy = state
        .answers
        .generator()
        .health_check()
        .await
        .unwrap_or(false);

    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "services": {
            "ollama": ollama_healthy
        }
    }))
}
