//! Crawler coordinator - main scrape orchestration logic
//!
//! This module contains the job loop for one site, including:
//! - Choosing between a fresh pass and resuming from the stored checkpoint
//! - Walking listing pages and processing every item URL in order
//! - Routing each item through fetch, extraction and the persistence sink
//! - Checkpointing after every item and at every page boundary
//! - Pausing cleanly when the stop token is cancelled

use crate::config::Config;
use crate::crawler::sink::{PersistenceSink, RowAction};
use crate::crawler::walker::{ListingStep, ListingWalker};
use crate::crawler::{FetchError, PageFetcher};
use crate::sites::{build_profile, SiteProfile};
use crate::state::{Checkpoint, ProgressTracker, ResumeCursor, ScrapeStatus};
use crate::storage::{LogLevel, SharedStorage};
use crate::HarvestError;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Options for one job run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOptions {
    /// Continue from the stored checkpoint if the last run was interrupted
    pub resume: bool,

    /// Overrides the site's page cap
    pub max_pages: Option<u32>,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            resume: true,
            max_pages: None,
        }
    }
}

/// How a job run ended without error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobOutcome {
    Completed { processed_items: u64, pages: u32 },
    Paused { cursor: ResumeCursor, processed_items: u64 },
}

/// Main coordinator for one site's scrape job
pub struct Coordinator {
    config: Arc<Config>,
    site_name: String,
    profile: Box<dyn SiteProfile>,
    fetcher: PageFetcher,
    sink: PersistenceSink,
    tracker: ProgressTracker,
    config_hash: String,
    cancel: CancellationToken,

    cursor: ResumeCursor,
    processed_items: u64,
    total_items: u64,
    total_pages: u32,
}

impl Coordinator {
    /// Creates a coordinator for a configured site
    ///
    /// # Arguments
    ///
    /// * `config` - The scraper configuration
    /// * `site_name` - Name of a `[[site]]` entry; also the progress task name
    /// * `storage` - Shared database handle
    /// * `config_hash` - Hash of the configuration file, stored with checkpoints
    /// * `cancel` - Stop signal, observed at page and item boundaries
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(HarvestError)` - Unknown site, bad base URL, or storage failure
    pub fn new(
        config: Arc<Config>,
        site_name: &str,
        storage: SharedStorage,
        config_hash: &str,
        cancel: CancellationToken,
    ) -> Result<Self, HarvestError> {
        let site = config
            .site(site_name)
            .ok_or_else(|| HarvestError::UnknownSite(site_name.to_string()))?;

        let profile = build_profile(site.kind, &site.base_url)?;
        let fetcher = PageFetcher::new(&config, site.fetch_mode)?;
        let sink = PersistenceSink::new(storage.clone(), &config.output);
        let tracker = ProgressTracker::open(storage, &site.name, config_hash)?;
        let site_name = site.name.clone();

        Ok(Self {
            config,
            site_name,
            profile,
            fetcher,
            sink,
            tracker,
            config_hash: config_hash.to_string(),
            cancel,
            cursor: ResumeCursor::start(),
            processed_items: 0,
            total_items: 0,
            total_pages: 0,
        })
    }

    pub fn site_name(&self) -> &str {
        &self.site_name
    }

    /// Runs the job until the listing is exhausted or a stop is requested
    ///
    /// A fatal storage error marks the task failed (best effort) and is returned.
    pub async fn run(&mut self, options: JobOptions) -> Result<JobOutcome, HarvestError> {
        match self.walk(options).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.mark_failed(&e);
                Err(e)
            }
        }
    }

    async fn walk(&mut self, options: JobOptions) -> Result<JobOutcome, HarvestError> {
        let point = self.tracker.resume_point()?;
        let continuing = options.resume && point.is_continuation();

        if continuing {
            self.cursor = point.cursor;
            self.processed_items = point.processed_items;
            self.total_items = point.total_items;

            if let Some(stored) = point.config_hash.as_deref() {
                if stored != self.config_hash {
                    self.log(
                        LogLevel::Warning,
                        "Configuration changed since the interrupted run",
                        None,
                    )?;
                }
            }
        } else {
            self.cursor = ResumeCursor::start();
            self.processed_items = 0;
            self.total_items = 0;
        }

        let max_pages = self.page_cap(options);
        let mut walker = ListingWalker::new(self.cursor.page, max_pages);
        self.total_pages = walker.max_pages();

        self.checkpoint(ScrapeStatus::Running, None)?;
        if continuing {
            self.log(
                LogLevel::Info,
                &format!(
                    "Resuming at page {} item {} ({} items already processed)",
                    self.cursor.page, self.cursor.item_offset, self.processed_items
                ),
                None,
            )?;
        } else {
            self.log(
                LogLevel::Info,
                &format!("Starting scrape of up to {} listing pages", max_pages),
                None,
            )?;
        }

        let start_time = std::time::Instant::now();
        let mut pages_walked = 0;

        loop {
            let step = walker
                .next_page(&self.fetcher, self.profile.as_ref(), &self.cancel)
                .await;
            self.total_pages = walker.max_pages();

            match step {
                ListingStep::Stopped => return self.pause(),
                ListingStep::Exhausted => break,
                ListingStep::Skipped { page, url, error } => {
                    self.log(
                        LogLevel::Error,
                        &format!("Failed to fetch listing page {}: {}", page, error),
                        Some(&url),
                    )?;
                    self.cursor = ResumeCursor {
                        page: page + 1,
                        item_offset: 0,
                    };
                    self.checkpoint(ScrapeStatus::Running, None)?;
                }
                ListingStep::Page(batch) => {
                    pages_walked += 1;
                    let offset = if batch.page == self.cursor.page {
                        self.cursor.item_offset
                    } else {
                        0
                    };
                    if offset == 0 {
                        self.total_items += batch.item_urls.len() as u64;
                    }

                    tracing::info!(
                        "Listing page {}/{}: {} items",
                        batch.page,
                        self.total_pages,
                        batch.item_urls.len()
                    );

                    for (idx, item_url) in batch
                        .item_urls
                        .iter()
                        .enumerate()
                        .skip(offset as usize)
                    {
                        if self.cancel.is_cancelled() {
                            self.cursor = ResumeCursor {
                                page: batch.page,
                                item_offset: idx as u32,
                            };
                            return self.pause();
                        }

                        self.process_item(item_url).await?;

                        self.processed_items += 1;
                        self.cursor = ResumeCursor {
                            page: batch.page,
                            item_offset: idx as u32 + 1,
                        };
                        self.checkpoint(ScrapeStatus::Running, None)?;
                    }

                    self.cursor = ResumeCursor {
                        page: batch.page + 1,
                        item_offset: 0,
                    };
                    self.checkpoint(ScrapeStatus::Running, None)?;

                    let elapsed = start_time.elapsed();
                    tracing::info!(
                        "Progress: {} items processed, {:.2} items/sec",
                        self.processed_items,
                        self.processed_items as f64 / elapsed.as_secs_f64().max(1e-3)
                    );
                }
            }
        }

        self.checkpoint(ScrapeStatus::Completed, None)?;
        self.log(
            LogLevel::Info,
            &format!(
                "Scrape completed: {} items processed across {} listing pages",
                self.processed_items, pages_walked
            ),
            None,
        )?;

        Ok(JobOutcome::Completed {
            processed_items: self.processed_items,
            pages: pages_walked,
        })
    }

    /// Fetches, extracts and persists one item
    ///
    /// Every non-fatal failure writes exactly one ERROR log entry carrying the
    /// item URL and lets the walk continue. Only fatal storage errors propagate.
    async fn process_item(&self, url: &str) -> Result<(), HarvestError> {
        let html = match self.fetcher.fetch_page(url).await {
            Ok(html) => html,
            Err(FetchError::NotFound { .. }) => {
                self.log(LogLevel::Error, "Item page not found", Some(url))?;
                return Ok(());
            }
            Err(e) => {
                self.log(
                    LogLevel::Error,
                    &format!("Failed to fetch item page: {}", e),
                    Some(url),
                )?;
                return Ok(());
            }
        };

        if self.profile.is_not_found(&html) {
            self.log(LogLevel::Error, "Item page not found", Some(url))?;
            return Ok(());
        }

        let item = match self.profile.extract(&html, url) {
            Ok(item) => item,
            Err(e) => {
                self.log(
                    LogLevel::Error,
                    &format!("Extraction failed: {}", e),
                    Some(url),
                )?;
                return Ok(());
            }
        };

        match self.sink.persist(&item, &html, &self.fetcher).await {
            Ok(outcome) => {
                for warning in &outcome.warnings {
                    self.log(LogLevel::Warning, warning, Some(url))?;
                }
                let verb = match outcome.action {
                    RowAction::Inserted => "Inserted",
                    RowAction::Updated => "Updated",
                };
                self.log(
                    LogLevel::Info,
                    &format!("{} medicine {} ({})", verb, item.name, item.external_key()),
                    Some(url),
                )?;
            }
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                self.log(
                    LogLevel::Error,
                    &format!("Failed to store medicine: {}", e),
                    Some(url),
                )?;
            }
        }

        Ok(())
    }

    /// Page cap for this run: job option, then site override, then the global cap
    fn page_cap(&self, options: JobOptions) -> u32 {
        options
            .max_pages
            .or_else(|| self.config.site(&self.site_name).and_then(|s| s.max_pages))
            .unwrap_or(self.config.scraper.max_pages)
    }

    fn pause(&mut self) -> Result<JobOutcome, HarvestError> {
        self.checkpoint(ScrapeStatus::Paused, None)?;
        self.log(
            LogLevel::Info,
            &format!(
                "Scrape paused at page {} item {}",
                self.cursor.page, self.cursor.item_offset
            ),
            None,
        )?;

        Ok(JobOutcome::Paused {
            cursor: self.cursor,
            processed_items: self.processed_items,
        })
    }

    fn mark_failed(&mut self, error: &HarvestError) {
        if self.tracker.status() != ScrapeStatus::Running {
            return;
        }
        let failure = Checkpoint {
            cursor: self.cursor,
            processed_items: self.processed_items,
            total_items: self.total_items,
            total_pages: self.total_pages,
            status: ScrapeStatus::Failed,
            error_message: Some(error.to_string()),
        };
        if let Err(e) = self.tracker.record_failure(failure) {
            tracing::warn!("Could not record failure of {}: {}", self.site_name, e);
        }
    }

    fn checkpoint(
        &mut self,
        status: ScrapeStatus,
        error_message: Option<String>,
    ) -> Result<(), HarvestError> {
        self.tracker.checkpoint(Checkpoint {
            cursor: self.cursor,
            processed_items: self.processed_items,
            total_items: self.total_items,
            total_pages: self.total_pages,
            status,
            error_message,
        })
    }

    fn log(&self, level: LogLevel, message: &str, url: Option<&str>) -> Result<(), HarvestError> {
        Ok(self.tracker.log(level, message, url)?)
    }
}
