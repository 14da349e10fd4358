//! JSON HTTP query surface.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/search` | Search with `{"query": "..."}` |
//! | `GET`  | `/search?query=...` | Same search via query string |
//!
//! Both search routes answer with a `SearchResponse`:
//!
//! ```json
//! { "query": "six", "degraded": false,
//!   "results": [ { "description": "...", "timestamp": 14, "filename": "frame-0007.jpg" } ] }
//! ```
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `index_unavailable` (503, only with
//! `retrieval.fallback = "propagate"`), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use veloindex_core::models::SearchResponse;

use crate::config::Config;
use crate::error::PipelineError;
use crate::search::Retriever;
use crate::sqlite_store::SqliteIndex;

/// Starts the HTTP server on `[server].bind` and runs until the process
/// is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let index = SqliteIndex::open(config).await?;
    let retriever = Arc::new(Retriever::from_config(Arc::new(index), config));

    let bind_addr = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(bind = %bind_addr, "search server listening");
    println!("VeloIndex server listening on http://{}", bind_addr);

    axum::serve(listener, router(retriever)).await?;
    Ok(())
}

/// Build the application router around an existing retriever.
pub fn router(retriever: Arc<Retriever>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/search", get(handle_search_get).post(handle_search_post))
        .layer(cors)
        .with_state(retriever)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`).
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::IndexUnavailable(_) => AppError {
                status: StatusCode::SERVICE_UNAVAILABLE,
                code: "index_unavailable".to_string(),
                message: err.to_string(),
            },
            other => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal".to_string(),
                message: other.to_string(),
            },
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

// ============ /search ============

#[derive(Deserialize)]
struct SearchRequest {
    #[serde(default)]
    query: Option<String>,
}

async fn search(retriever: &Retriever, query: Option<String>) -> Result<Json<SearchResponse>, AppError> {
    let query = query.unwrap_or_default();
    if query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    Ok(Json(retriever.search(&query).await?))
}

async fn handle_search_post(
    State(retriever): State<Arc<Retriever>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    search(&retriever, req.query).await
}

async fn handle_search_get(
    State(retriever): State<Arc<Retriever>>,
    Query(req): Query<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    search(&retriever, req.query).await
}
