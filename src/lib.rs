//! rx-harvest: a resumable medicine catalog scraper
//!
//! This crate walks the paginated listings of medicine catalog sites, extracts a
//! structured record from every item page, upserts the records into SQLite and keeps
//! a durable checkpoint so an interrupted job resumes where it stopped. A small axum
//! API starts, stops and monitors the job.

pub mod api;
pub mod config;
pub mod crawler;
pub mod output;
pub mod sites;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for rx-harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Extraction error: {0}")]
    Extract(#[from] sites::ExtractError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: state::ScrapeStatus,
        to: state::ScrapeStatus,
    },

    #[error("Unknown site: {0}")]
    UnknownSite(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for rx-harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, JobController, JobOptions, JobOutcome};
pub use state::ScrapeStatus;
