//! HTTP API Request Handlers
//!
//! Handlers that map HTTP requests to job controller and storage operations.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{debug, error};

use crate::config::Config;
use crate::crawler::{ControlError, JobController, StartRequest};
use crate::output::load_statistics;
use crate::storage::{lock_storage, BlobStore, LogLevel, SharedStorage, Storage, StorageError};
use crate::HarvestError;

use super::types::*;

const MAX_PAGE_SIZE: u32 = 1000;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<JobController>,
    pub storage: SharedStorage,
    pub blobs: BlobStore,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Arc<Config>, storage: SharedStorage, config_hash: &str) -> Self {
        let controller = Arc::new(JobController::new(
            config.clone(),
            storage.clone(),
            config_hash,
        ));
        let blobs = BlobStore::new(&config.output.html_dir, &config.output.image_dir);
        Self {
            controller,
            storage,
            blobs,
            config,
        }
    }
}

/// Errors surfaced to API clients
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("BAD_REQUEST", message),
            ),
            Self::NotFound(message) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new("NOT_FOUND", message),
            ),
            Self::Conflict(message) => (
                StatusCode::CONFLICT,
                ErrorResponse::new("CONFLICT", message),
            ),
            Self::Internal(message) => {
                error!("API internal error: {}", message);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("INTERNAL_ERROR", message),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        match err {
            ControlError::AlreadyRunning(_) | ControlError::NotRunning => {
                Self::Conflict(err.to_string())
            }
            ControlError::UnknownSite(_) => Self::BadRequest(err.to_string()),
            ControlError::Aborted(_) | ControlError::Harvest(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::MedicineNotFound(_) => Self::NotFound(err.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<HarvestError> for ApiError {
    fn from(err: HarvestError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// API info endpoint
pub async fn root(State(state): State<AppState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sites: state.config.sites.iter().map(|s| s.name.clone()).collect(),
        endpoints: [
            "POST /scraper/start",
            "POST /scraper/stop",
            "GET /scraper/status",
            "GET /scraper/progress",
            "GET /scraper/logs",
            "DELETE /scraper/cleanup",
            "GET /medicines",
            "GET /medicines/:id",
            "GET /stats",
            "GET /health",
        ]
        .iter()
        .map(|e| e.to_string())
        .collect(),
    })
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let database_ok = lock_storage(&state.storage)
        .and_then(|storage| storage.count_medicines(None))
        .is_ok();

    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            healthy: database_ok,
            database: if database_ok { "connected" } else { "unavailable" }.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Start the scrape job
pub async fn start_scraper(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<StartScrapeResponse> {
    // An empty body means all defaults; anything else must parse
    let request: StartScrapeRequest = if body.iter().all(u8::is_ascii_whitespace) {
        StartScrapeRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid start request: {}", e)))?
    };
    debug!("HTTP start request: {:?}", request);

    if request.max_pages == Some(0) {
        return Err(ApiError::BadRequest("max_pages must be at least 1".to_string()));
    }

    let resume = !request.no_resume;
    let info = state
        .controller
        .start(StartRequest {
            site: request.site,
            max_pages: request.max_pages,
            resume,
        })
        .await?;

    Ok(Json(StartScrapeResponse {
        message: "Scraping started".to_string(),
        site: info.site,
        resume,
        started_at: info.started_at,
    }))
}

/// Request a cooperative stop of the running job
pub async fn stop_scraper(State(state): State<AppState>) -> ApiResult<MessageResponse> {
    let info = state.controller.stop().await?;
    Ok(Json(MessageResponse {
        message: format!(
            "Stop requested for {}; the job pauses at the next item boundary",
            info.site
        ),
    }))
}

/// Job status, combining the controller view with the stored checkpoint
pub async fn scraper_status(State(state): State<AppState>) -> ApiResult<StatusResponse> {
    let snapshot = state.controller.snapshot().await;
    let site = snapshot
        .site
        .clone()
        .or_else(|| state.config.default_site().map(|s| s.name.clone()));

    let progress = match site.as_deref() {
        Some(name) => lock_storage(&state.storage)?.load_progress(name)?,
        None => None,
    };

    Ok(Json(StatusResponse {
        running: snapshot.running,
        site,
        status: progress.as_ref().map(|p| p.status),
        current_page: progress.as_ref().map_or(0, |p| p.current_page),
        total_pages: progress.as_ref().map_or(0, |p| p.total_pages),
        processed_items: progress.as_ref().map_or(0, |p| p.processed_items),
        total_items: progress.as_ref().map_or(0, |p| p.total_items),
        started_at: snapshot.started_at,
    }))
}

/// Detailed checkpoint of one task
pub async fn scraper_progress(
    State(state): State<AppState>,
    Query(query): Query<ProgressQuery>,
) -> ApiResult<ProgressResponse> {
    let site = match query.site {
        Some(site) => site,
        None => state
            .config
            .default_site()
            .map(|s| s.name.clone())
            .ok_or_else(|| ApiError::BadRequest("no site configured".to_string()))?,
    };

    let progress = lock_storage(&state.storage)?
        .load_progress(&site)?
        .ok_or_else(|| ApiError::NotFound(format!("no progress recorded for '{}'", site)))?;

    // The page in progress counts as not yet done
    let pages_done = u64::from(progress.current_page.saturating_sub(1));

    Ok(Json(ProgressResponse {
        site,
        status: progress.status,
        current_page: progress.current_page,
        total_pages: progress.total_pages,
        processed_items: progress.processed_items,
        total_items: progress.total_items,
        page_percent: percent(
            pages_done.min(u64::from(progress.total_pages)),
            u64::from(progress.total_pages),
        ),
        item_percent: percent(progress.processed_items, progress.total_items),
        resume_cursor: progress.resume_cursor,
        error_message: progress.error_message,
        updated_at: Some(progress.updated_at),
        completed_at: progress.completed_at,
    }))
}

/// Most recent job log entries, newest first
pub async fn scraper_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<LogsResponse> {
    let level = match query.level.as_deref() {
        Some(level) => Some(
            LogLevel::from_db_string(level)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown log level '{}'", level)))?,
        ),
        None => None,
    };
    let limit = query.limit.clamp(1, MAX_PAGE_SIZE);

    let logs = lock_storage(&state.storage)?.recent_logs(query.site.as_deref(), level, limit)?;
    Ok(Json(LogsResponse {
        count: logs.len(),
        logs,
    }))
}

/// Remove blob files older than N days
pub async fn cleanup_blobs(
    State(state): State<AppState>,
    Query(query): Query<CleanupQuery>,
) -> ApiResult<CleanupResponse> {
    let blobs = state.blobs.clone();
    let days = query.days;
    let report = tokio::task::spawn_blocking(move || blobs.cleanup_older_than(days))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(CleanupResponse { days, report }))
}

/// Paginated, searchable medicine list
pub async fn list_medicines(
    State(state): State<AppState>,
    Query(query): Query<MedicinesQuery>,
) -> ApiResult<MedicinesResponse> {
    let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
    let search = query.search.as_deref();

    let storage = lock_storage(&state.storage)?;
    let medicines = storage.list_medicines(search, limit, query.offset)?;
    let total = storage.count_medicines(search)?;

    Ok(Json(MedicinesResponse {
        medicines,
        total,
        limit,
        offset: query.offset,
    }))
}

/// One medicine by id
pub async fn get_medicine(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let medicine = lock_storage(&state.storage)?.get_medicine(id)?;
    Ok(Json(medicine))
}

/// Catalog statistics
pub async fn stats(State(state): State<AppState>) -> ApiResult<StatsResponse> {
    let stats = {
        let storage = lock_storage(&state.storage)?;
        load_statistics(&*storage, None)?
    };

    let blobs = state.blobs.clone();
    let usage = tokio::task::spawn_blocking(move || blobs.usage())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(StatsResponse {
        total_medicines: stats.total_medicines,
        unique_manufacturers: stats.unique_manufacturers,
        with_images: stats.with_images,
        scraped_last_24h: stats.scraped_last_24h,
        categories: stats.categories,
        error_logs: stats.error_logs,
        blobs: Some(usage),
    }))
}
