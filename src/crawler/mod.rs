//! Crawler module for fetching and processing catalog pages
//!
//! This module contains the core scraping logic, including:
//! - HTTP and WebDriver fetching with pacing and bounded retry
//! - Walking paginated listings
//! - Deduplicating and persisting extracted records
//! - Job coordination, checkpointing and cooperative stop

mod browser;
mod control;
mod coordinator;
mod fetcher;
mod pacing;
mod retry;
mod sink;
mod walker;

pub use browser::WebDriverClient;
pub use control::{ControlError, JobController, JobInfo, JobSnapshot, StartRequest};
pub use coordinator::{Coordinator, JobOptions, JobOutcome};
pub use fetcher::{build_http_client, FetchError, PageFetcher};
pub use pacing::{RequestIdentity, RequestPacer};
pub use retry::RetryPolicy;
pub use sink::{check_existing, upsert_medicine, PersistOutcome, PersistenceSink, RowAction};
pub use walker::{ListingBatch, ListingStep, ListingWalker};

use crate::config::Config;
use crate::storage::SharedStorage;
use crate::HarvestError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs one scrape job for a site in the foreground
///
/// This is the entry point used by the CLI. It will:
/// 1. Build the coordinator for the named site
/// 2. Resume from the stored checkpoint when allowed
/// 3. Walk the listing until it is exhausted or `cancel` fires
///
/// # Arguments
///
/// * `config` - The scraper configuration
/// * `site_name` - The `[[site]]` to scrape
/// * `storage` - Shared database handle
/// * `config_hash` - Hash of the configuration file
/// * `options` - Resume and page cap options
/// * `cancel` - Stop signal
///
/// # Returns
///
/// * `Ok(JobOutcome)` - The job completed or paused
/// * `Err(HarvestError)` - The job could not start or hit a fatal error
pub async fn run_job(
    config: Arc<Config>,
    site_name: &str,
    storage: SharedStorage,
    config_hash: &str,
    options: JobOptions,
    cancel: CancellationToken,
) -> Result<JobOutcome, HarvestError> {
    let mut coordinator = Coordinator::new(config, site_name, storage, config_hash, cancel)?;
    coordinator.run(options).await
}
