//! Job controller
//!
//! Owns the single background scrape job. The API handlers go through this
//! object to start, stop and observe the job; there is no global running flag.

use crate::config::Config;
use crate::crawler::{Coordinator, JobOptions, JobOutcome};
use crate::storage::SharedStorage;
use crate::HarvestError;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Errors returned by the job controller
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("a scrape job is already running for site '{0}'")]
    AlreadyRunning(String),

    #[error("no scrape job is running")]
    NotRunning,

    #[error("unknown site '{0}'")]
    UnknownSite(String),

    #[error("scrape job aborted: {0}")]
    Aborted(String),

    #[error(transparent)]
    Harvest(#[from] HarvestError),
}

/// Parameters for starting a job
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartRequest {
    /// Site to scrape; the first configured site when absent
    pub site: Option<String>,
    pub max_pages: Option<u32>,
    pub resume: bool,
}

/// Identifies a started job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobInfo {
    pub site: String,
    pub started_at: String,
}

/// Point-in-time view of the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub running: bool,
    /// Site of the running job, or of the last job started
    pub site: Option<String>,
    pub started_at: Option<String>,
}

struct ActiveJob {
    info: JobInfo,
    token: CancellationToken,
    /// Taken by `wait`; the info stays behind for snapshots
    handle: Option<JoinHandle<Result<JobOutcome, HarvestError>>>,
}

impl ActiveJob {
    fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

pub struct JobController {
    config: Arc<Config>,
    storage: SharedStorage,
    config_hash: String,
    active: Mutex<Option<ActiveJob>>,
}

impl JobController {
    pub fn new(config: Arc<Config>, storage: SharedStorage, config_hash: &str) -> Self {
        Self {
            config,
            storage,
            config_hash: config_hash.to_string(),
            active: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Starts a job on a background task
    ///
    /// # Returns
    ///
    /// * `Ok(JobInfo)` - The job was spawned
    /// * `Err(ControlError::AlreadyRunning)` - A job is still running
    /// * `Err(ControlError::UnknownSite)` - The site is not configured
    /// * `Err(ControlError::Harvest)` - The coordinator could not be built
    pub async fn start(&self, request: StartRequest) -> Result<JobInfo, ControlError> {
        let mut active = self.active.lock().await;

        if let Some(job) = active.as_ref() {
            if job.is_running() {
                return Err(ControlError::AlreadyRunning(job.info.site.clone()));
            }
        }

        let site = match request.site.as_deref() {
            Some(name) => self.config.site(name),
            None => self.config.default_site(),
        }
        .ok_or_else(|| ControlError::UnknownSite(request.site.clone().unwrap_or_default()))?;

        let token = CancellationToken::new();
        let mut coordinator = Coordinator::new(
            self.config.clone(),
            &site.name,
            self.storage.clone(),
            &self.config_hash,
            token.clone(),
        )?;

        let options = JobOptions {
            resume: request.resume,
            max_pages: request.max_pages,
        };
        let info = JobInfo {
            site: site.name.clone(),
            started_at: chrono::Utc::now().to_rfc3339(),
        };

        tracing::info!("Starting scrape job for {}", info.site);
        let site_name = info.site.clone();
        let handle = tokio::spawn(async move {
            let result = coordinator.run(options).await;
            match &result {
                Ok(outcome) => tracing::info!("Scrape job for {} ended: {:?}", site_name, outcome),
                Err(e) => tracing::error!("Scrape job for {} failed: {}", site_name, e),
            }
            result
        });

        *active = Some(ActiveJob {
            info: info.clone(),
            token,
            handle: Some(handle),
        });

        Ok(info)
    }

    /// Requests a cooperative stop of the running job
    ///
    /// The job pauses at its next page or item boundary.
    pub async fn stop(&self) -> Result<JobInfo, ControlError> {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(job) if job.is_running() => {
                tracing::info!("Stop requested for {}", job.info.site);
                job.token.cancel();
                Ok(job.info.clone())
            }
            _ => Err(ControlError::NotRunning),
        }
    }

    pub async fn snapshot(&self) -> JobSnapshot {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(job) => JobSnapshot {
                running: job.is_running(),
                site: Some(job.info.site.clone()),
                started_at: Some(job.info.started_at.clone()),
            },
            None => JobSnapshot {
                running: false,
                site: None,
                started_at: None,
            },
        }
    }

    /// Waits for the current job to end and returns its outcome
    ///
    /// Returns `Ok(None)` when there is no job left to wait for.
    pub async fn wait(&self) -> Result<Option<JobOutcome>, ControlError> {
        // The lock is released before awaiting so snapshots stay responsive
        let handle = {
            let mut active = self.active.lock().await;
            active.as_mut().and_then(|job| job.handle.take())
        };

        let Some(handle) = handle else {
            return Ok(None);
        };

        match handle.await {
            Ok(result) => Ok(Some(result?)),
            Err(e) => Err(ControlError::Aborted(e.to_string())),
        }
    }

    /// Stops the running job, if any, and waits for it to pause
    pub async fn shutdown(&self) -> Result<Option<JobOutcome>, ControlError> {
        match self.stop().await {
            Ok(_) | Err(ControlError::NotRunning) => {}
            Err(e) => return Err(e),
        }
        self.wait().await
    }
}
