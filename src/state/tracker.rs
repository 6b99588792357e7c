//! Durable progress tracking for one scrape task

use crate::state::{ResumeCursor, ResumePoint, ScrapeStatus};
use crate::storage::{
    lock_storage, LogLevel, ProgressRecord, SharedStorage, Storage, StorageResult,
};
use crate::HarvestError;

/// Everything written at a checkpoint
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub cursor: ResumeCursor,
    pub processed_items: u64,
    pub total_items: u64,
    pub total_pages: u32,
    pub status: ScrapeStatus,
    pub error_message: Option<String>,
}

/// Loads where a task should resume
///
/// A task with no stored row gets a fresh point (page 1, nothing processed).
/// A row whose cursor is missing or malformed resumes at the start of its
/// stored `current_page`.
pub fn load_resume_point(storage: &dyn Storage, task_name: &str) -> StorageResult<ResumePoint> {
    let Some(record) = storage.load_progress(task_name)? else {
        return Ok(ResumePoint::fresh());
    };

    let cursor = record.resume_cursor.unwrap_or(ResumeCursor {
        page: record.current_page.max(1),
        item_offset: 0,
    });

    Ok(ResumePoint {
        cursor,
        processed_items: record.processed_items,
        total_items: record.total_items,
        total_pages: record.total_pages,
        status: record.status,
        config_hash: record.config_hash,
    })
}

/// Owns the progress row of a task while a job runs
///
/// Every checkpoint is written through immediately, so an unclean stop loses at
/// most the item in flight.
pub struct ProgressTracker {
    storage: SharedStorage,
    record: ProgressRecord,
    config_hash: String,
}

impl ProgressTracker {
    /// Opens the tracker, loading the stored row if there is one
    pub fn open(storage: SharedStorage, task_name: &str, config_hash: &str) -> StorageResult<Self> {
        let record = {
            let guard = lock_storage(&storage)?;
            guard.load_progress(task_name)?
        }
        .unwrap_or_else(|| ProgressRecord::pending(task_name));

        Ok(Self {
            storage,
            record,
            config_hash: config_hash.to_string(),
        })
    }

    pub fn task_name(&self) -> &str {
        &self.record.task_name
    }

    pub fn status(&self) -> ScrapeStatus {
        self.record.status
    }

    pub fn record(&self) -> &ProgressRecord {
        &self.record
    }

    /// Where the next run should start, per the stored row
    pub fn resume_point(&self) -> StorageResult<ResumePoint> {
        let guard = lock_storage(&self.storage)?;
        load_resume_point(&*guard, self.task_name())
    }

    /// Writes a checkpoint
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The row was written
    /// * `Err(HarvestError::InvalidTransition)` - The status change is not allowed
    /// * `Err(HarvestError::Storage)` - The write failed
    pub fn checkpoint(&mut self, checkpoint: Checkpoint) -> Result<(), HarvestError> {
        let from = self.record.status;
        if from != checkpoint.status && !from.can_transition_to(checkpoint.status) {
            return Err(HarvestError::InvalidTransition {
                from,
                to: checkpoint.status,
            });
        }

        self.record.current_page = checkpoint.cursor.page;
        self.record.resume_cursor = Some(checkpoint.cursor);
        self.record.processed_items = checkpoint.processed_items;
        self.record.total_items = checkpoint.total_items;
        self.record.total_pages = checkpoint.total_pages;
        self.record.status = checkpoint.status;
        self.record.error_message = checkpoint.error_message;
        self.record.config_hash = Some(self.config_hash.clone());
        self.record.completed_at = (checkpoint.status == ScrapeStatus::Completed)
            .then(|| chrono::Utc::now().to_rfc3339());

        let mut guard = lock_storage(&self.storage)?;
        guard.save_progress(&self.record)?;
        Ok(())
    }

    /// Marks the task failed after a fatal error, best effort
    ///
    /// Unlike `checkpoint`, this writes through a poisoned lock: a panic in
    /// another lock holder leaves the SQLite connection itself usable, and the
    /// failure is worth recording before the job stops.
    pub fn record_failure(&mut self, checkpoint: Checkpoint) -> StorageResult<()> {
        let message = checkpoint.error_message.clone().unwrap_or_default();

        self.record.current_page = checkpoint.cursor.page;
        self.record.resume_cursor = Some(checkpoint.cursor);
        self.record.processed_items = checkpoint.processed_items;
        self.record.total_items = checkpoint.total_items;
        self.record.total_pages = checkpoint.total_pages;
        self.record.status = ScrapeStatus::Failed;
        self.record.error_message = checkpoint.error_message;
        self.record.config_hash = Some(self.config_hash.clone());
        self.record.completed_at = None;

        tracing::error!("[{}] Scrape failed: {}", self.record.task_name, message);

        let mut guard = self
            .storage
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.save_progress(&self.record)?;
        guard.append_log(
            &self.record.task_name,
            LogLevel::Error,
            &format!("Scrape failed: {}", message),
            None,
        )?;
        Ok(())
    }

    /// Appends to the job log and mirrors the entry to tracing
    pub fn log(&self, level: LogLevel, message: &str, url: Option<&str>) -> StorageResult<()> {
        let task = self.task_name();
        match (level, url) {
            (LogLevel::Error, Some(u)) => tracing::error!("[{}] {} ({})", task, message, u),
            (LogLevel::Error, None) => tracing::error!("[{}] {}", task, message),
            (LogLevel::Warning, Some(u)) => tracing::warn!("[{}] {} ({})", task, message, u),
            (LogLevel::Warning, None) => tracing::warn!("[{}] {}", task, message),
            (LogLevel::Info, Some(u)) => tracing::info!("[{}] {} ({})", task, message, u),
            (LogLevel::Info, None) => tracing::info!("[{}] {}", task, message),
            (LogLevel::Debug, _) => tracing::debug!("[{}] {}", task, message),
        }

        let mut guard = lock_storage(&self.storage)?;
        guard.append_log(task, level, message, url)?;
        Ok(())
    }
}
