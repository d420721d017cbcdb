//! Read-only document API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/documents` | Every document, oldest first |
//! | `GET`  | `/documents/{id}` | One document by UUID |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Errors carry a single `detail` message:
//!
//! ```json
//! { "detail": "Document not found" }
//! ```
//!
//! `400` for a malformed id, `404` for an unknown one, `500` for storage
//! failures.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the frontend can be
//! served from anywhere.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::models::Document;
use crate::store::postgres::PgStore;
use crate::store::Store;

/// Shared state for all handlers.
#[derive(Clone)]
struct AppState {
    store: Arc<dyn Store>,
}

/// Build the API router over any [`Store`].
pub fn router(store: Arc<dyn Store>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/documents", get(handle_list_documents))
        .route("/documents/{id}", get(handle_get_document))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { store })
}

/// Serve the API on `[server].bind` against the configured database.
/// Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    let app = router(Arc::new(PgStore::new(pool)));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("Document API listening on http://{}", config.server.bind);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

/// Error type that converts into an Axum HTTP response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn not_found(detail: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: detail.to_string(),
        }
    }

    fn bad_request(detail: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        error!(error = %err, "request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

// ============ Handlers ============

async fn handle_list_documents(
    State(state): State<AppState>,
) -> Result<Json<Vec<Document>>, ApiError> {
    Ok(Json(state.store.fetch_documents().await?))
}

async fn handle_get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    let id = Uuid::parse_str(&id)
        .map_err(|e| ApiError::bad_request(format!("invalid document id '{}': {}", id, e)))?;

    state
        .store
        .fetch_document(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Document not found"))
}

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
