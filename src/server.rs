//! HTTP server for the chat endpoint.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/chat` | Answer `{ "message": string }` with `{ "reply": string }` |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Failures return `{ "error": string }`:
//!
//! - `400`: the body has no non-empty string `message` (including
//!   malformed JSON). No external API is called.
//! - `500`: embedding, vector search, or generation failed, or the request
//!   deadline passed. The body carries a generic message; the upstream
//!   detail is only logged.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front-ends on
//! other origins can call the endpoint.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn, Instrument};

use crate::config::Config;
use crate::error::ChatError;
use crate::models::{ChatReply, ChatRequest, ErrorBody};
use crate::pipeline::ChatPipeline;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    pipeline: Arc<ChatPipeline>,
}

/// Starts the server with clients built from `config` and the environment.
///
/// Binds to `[server].bind` and runs until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = ChatPipeline::from_config(config)?;
    run_server_with_pipeline(&config.server.bind, Arc::new(pipeline)).await
}

/// Starts the server around an already-built pipeline.
///
/// Used by [`run_server`] and by tests that inject collaborator doubles.
pub async fn run_server_with_pipeline(
    bind_addr: &str,
    pipeline: Arc<ChatPipeline>,
) -> anyhow::Result<()> {
    let app = router(pipeline);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("chat server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

/// Build the router with CORS applied.
pub fn router(pipeline: Arc<ChatPipeline>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { pipeline })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

// ============ Error response ============

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        AppError {
            status,
            message: err.public_message().to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/chat ============

/// Handler for `POST /api/chat`.
///
/// A body that fails to parse (not JSON, wrong content type, `message` not a
/// string) is treated the same as a missing message.
async fn handle_chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatReply>, AppError> {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("chat", %request_id);

    async move {
        let message = match body {
            Ok(Json(request)) => request.message.unwrap_or_default(),
            Err(rejection) => {
                warn!(reason = %rejection.body_text(), "rejected chat body");
                String::new()
            }
        };

        match state.pipeline.answer(&message).await {
            Ok(reply) => Ok(Json(reply)),
            Err(err) => {
                let err = AppError::from(err);
                warn!(status = err.status.as_u16(), "chat request failed");
                Err(err)
            }
        }
    }
    .instrument(span)
    .await
}
