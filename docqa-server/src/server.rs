use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use docqa_rag::{Answer, QueryService, RagError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared handler state: the query service, ready or still loading.
#[derive(Clone, Default)]
pub struct AppState {
    pub service: Arc<QueryService>,
}

impl AppState {
    pub fn new(service: Arc<QueryService>) -> Self {
        Self { service }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 5000 }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| "invalid host/port for docqa server")
    }
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    #[serde(default)]
    pub question: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SourceRef {
    pub chunk_id: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    pub score: f32,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

impl From<Answer> for AskResponse {
    fn from(answer: Answer) -> Self {
        let sources = answer
            .sources
            .into_iter()
            .map(|result| SourceRef {
                chunk_id: result.chunk.id,
                source: result.chunk.source,
                page: result.chunk.page,
                score: result.score,
                text: result.chunk.text,
            })
            .collect();
        Self { answer: answer.answer, sources }
    }
}

/// An error rendered as `{"error": "..."}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        let status = match &err {
            RagError::ServiceNotReady => StatusCode::SERVICE_UNAVAILABLE,
            RagError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            RagError::EmbeddingError { .. } | RagError::GenerationError { .. } => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, message: err.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/get_response", post(get_response))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn bind(config: &ServerConfig) -> anyhow::Result<TcpListener> {
    let addr = config.addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("docqa listening on http://{}", addr);
    Ok(listener)
}

pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    axum::serve(listener, app_router(state)).await?;
    Ok(())
}

pub async fn run_server(config: ServerConfig, service: Arc<QueryService>) -> anyhow::Result<()> {
    let listener = bind(&config).await?;
    serve(listener, AppState::new(service)).await
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let status = if state.service.is_ready() { "ok" } else { "loading" };
    Json(json!({ "status": status, "service": "docqa" }))
}

async fn get_response(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection, "rejected request body");
        ApiError::bad_request(format!("invalid request body: {}", rejection.body_text()))
    })?;

    let question = request.question.unwrap_or_default();
    if question.trim().is_empty() {
        return Err(ApiError::bad_request("question is required"));
    }

    match state.service.ask(&question).await {
        Ok(answer) => Ok(Json(answer.into())),
        Err(err) => {
            if !err.is_request_scoped() && !matches!(err, RagError::ServiceNotReady) {
                error!(error = %err, "query failed");
            }
            Err(err.into())
        }
    }
}
