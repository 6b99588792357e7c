//! HTTP API Request/Response Types
//!
//! JSON-serializable types for the control API.

use serde::{Deserialize, Serialize};

use crate::state::{ResumeCursor, ScrapeStatus};
use crate::storage::{BlobUsage, CleanupReport, LogRecord, MedicineRecord};

/// Body of `POST /scraper/start`; every field is optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartScrapeRequest {
    /// Site to scrape (default: the first configured site)
    #[serde(default)]
    pub site: Option<String>,
    /// Overrides the page cap for this run
    #[serde(default)]
    pub max_pages: Option<u32>,
    /// Ignore the stored checkpoint and start from page 1
    #[serde(default)]
    pub no_resume: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartScrapeResponse {
    pub message: String,
    pub site: String,
    pub resume: bool,
    pub started_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Response of `GET /scraper/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub running: bool,
    pub site: Option<String>,
    pub status: Option<ScrapeStatus>,
    pub current_page: u32,
    pub total_pages: u32,
    pub processed_items: u64,
    pub total_items: u64,
    pub started_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgressQuery {
    pub site: Option<String>,
}

/// Response of `GET /scraper/progress`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub site: String,
    pub status: ScrapeStatus,
    pub current_page: u32,
    pub total_pages: u32,
    pub processed_items: u64,
    pub total_items: u64,
    pub page_percent: f64,
    pub item_percent: f64,
    pub resume_cursor: Option<ResumeCursor>,
    pub error_message: Option<String>,
    pub updated_at: Option<String>,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_log_limit")]
    pub limit: u32,
    pub level: Option<String>,
    pub site: Option<String>,
}

fn default_log_limit() -> u32 {
    50
}

#[derive(Debug, Clone, Serialize)]
pub struct LogsResponse {
    pub logs: Vec<LogRecord>,
    pub count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MedicinesQuery {
    #[serde(default = "default_page_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    pub search: Option<String>,
}

fn default_page_limit() -> u32 {
    100
}

#[derive(Debug, Clone, Serialize)]
pub struct MedicinesResponse {
    pub medicines: Vec<MedicineRecord>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CleanupQuery {
    #[serde(default = "default_cleanup_days")]
    pub days: u32,
}

fn default_cleanup_days() -> u32 {
    30
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupResponse {
    pub days: u32,
    #[serde(flatten)]
    pub report: CleanupReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub total_medicines: u64,
    pub unique_manufacturers: u64,
    pub with_images: u64,
    pub scraped_last_24h: u64,
    pub categories: u64,
    pub error_logs: u64,
    pub blobs: Option<BlobUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResponse {
    pub name: String,
    pub version: String,
    pub sites: Vec<String>,
    pub endpoints: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub database: String,
    pub version: String,
}

/// Error body returned by every failing endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Percentage of `done` over `total`, 0 when the total is unknown
pub fn percent(done: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        ((done as f64 / total as f64) * 10000.0).round() / 100.0
    }
}
