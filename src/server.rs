//! JSON HTTP API over the article store.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/news` | Stored articles, newest first (`limit`, `offset`) |
//! | `GET`  | `/search` | Full-text search (`q`, `limit`, `offset`) |
//! | `POST` | `/ingest` | Start a background crawl (`limit`) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Errors are returned as
//! `{ "error": { "code": "bad_request", "message": "..." } }` with code
//! `bad_request` (400) or `internal` (500).

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::error::{AppError, Result};
use crate::models::{Config, SearchPage, StoredArticle};
use crate::pipeline::run_ingest;
use crate::services::NewsCrawler;
use crate::storage::{NewsStore, SqliteStore};

const DEFAULT_PAGE_SIZE: i64 = 20;

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn NewsStore>,
    crawler: Arc<NewsCrawler>,
    ingest_limit: Option<usize>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn NewsStore>,
        crawler: Arc<NewsCrawler>,
        ingest_limit: Option<usize>,
    ) -> Self {
        Self {
            store,
            crawler,
            ingest_limit,
        }
    }
}

/// Build the API router with permissive CORS.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/news", get(handle_list))
        .route("/search", get(handle_search))
        .route("/ingest", post(handle_ingest))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

/// Open the configured store, then serve on `bind` until Ctrl-C.
pub async fn run_server(config: &Config, bind: &str) -> Result<()> {
    let store = SqliteStore::open(&config.storage).await?;
    store.initialize().await?;
    let crawler = NewsCrawler::new(config)?;

    let state = AppState::new(
        Arc::new(store),
        Arc::new(crawler),
        config.ingest.default_limit,
    );

    let listener = tokio::net::TcpListener::bind(bind).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message: message.into(),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        if err.is_validation() {
            Self::bad_request(err.to_string())
        } else {
            log::error!("Request failed: {err}");
            Self::internal(err.to_string())
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
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

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Negative counts behave as zero.
fn clamp(value: i64) -> usize {
    usize::try_from(value.max(0)).unwrap_or(usize::MAX)
}

// ============ GET /news ============

#[derive(Deserialize)]
struct PageParams {
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn handle_list(
    State(state): State<AppState>,
    params: std::result::Result<Query<PageParams>, QueryRejection>,
) -> ApiResult<Json<Vec<StoredArticle>>> {
    let Query(params) = params?;
    let items = state
        .store
        .list(
            clamp(params.limit.unwrap_or(DEFAULT_PAGE_SIZE)),
            clamp(params.offset.unwrap_or(0)),
        )
        .await?;
    Ok(Json(items))
}

// ============ GET /search ============

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

async fn handle_search(
    State(state): State<AppState>,
    params: std::result::Result<Query<SearchParams>, QueryRejection>,
) -> ApiResult<Json<SearchPage>> {
    let Query(params) = params?;
    let query = params
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("query parameter `q` is required"))?;

    let page = state
        .store
        .search(
            &query,
            clamp(params.limit.unwrap_or(DEFAULT_PAGE_SIZE)),
            clamp(params.offset.unwrap_or(0)),
        )
        .await?;
    Ok(Json(page))
}

// ============ POST /ingest ============

#[derive(Deserialize)]
struct IngestParams {
    limit: Option<i64>,
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
}

async fn handle_ingest(
    State(state): State<AppState>,
    params: std::result::Result<Query<IngestParams>, QueryRejection>,
) -> ApiResult<(StatusCode, Json<StatusResponse>)> {
    let Query(params) = params?;
    let limit = params.limit.map(clamp).or(state.ingest_limit);

    let crawler = Arc::clone(&state.crawler);
    let store = Arc::clone(&state.store);
    tokio::spawn(async move {
        match run_ingest(&crawler, store.as_ref(), limit).await {
            Ok(summary) => log::info!("Background ingest stored {} items", summary.stored),
            Err(e) => log::error!("Background ingest failed: {e}"),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(StatusResponse { status: "started" }),
    ))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
