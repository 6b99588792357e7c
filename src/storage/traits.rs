//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{
    CategoryRecord, LogLevel, LogRecord, MedicineRecord, NewMedicine, ProgressRecord,
};
use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Medicine not found: {0}")]
    MedicineNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Storage lock poisoned")]
    Poisoned,
}

impl StorageError {
    /// Returns true if the storage can no longer be trusted for this job
    ///
    /// Constraint violations and bad rows only affect one item; losing the
    /// database file, disk, or lock stops the job.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                ErrorCode::CannotOpen
                    | ErrorCode::NotADatabase
                    | ErrorCode::DatabaseCorrupt
                    | ErrorCode::DiskFull
                    | ErrorCode::SystemIoFailure
                    | ErrorCode::ReadOnly
                    | ErrorCode::PermissionDenied
            ),
            Self::Io(_) | Self::Poisoned => true,
            _ => false,
        }
    }

    /// Maps SQLite constraint failures to `ConstraintViolation`
    pub(crate) fn classify(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, msg)
                if e.code == ErrorCode::ConstraintViolation =>
            {
                Self::ConstraintViolation(msg.clone().unwrap_or_else(|| e.to_string()))
            }
            _ => Self::Sqlite(err),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the scraper and the
/// control API.
pub trait Storage {
    // ===== Progress Tracking =====

    /// Gets the stored checkpoint for a task, if any
    fn load_progress(&self, task_name: &str) -> StorageResult<Option<ProgressRecord>>;

    /// Inserts or replaces the checkpoint for `progress.task_name`
    ///
    /// `created_at` of an existing row is preserved.
    fn save_progress(&mut self, progress: &ProgressRecord) -> StorageResult<()>;

    /// Gets the checkpoints of all tasks
    fn list_progress(&self) -> StorageResult<Vec<ProgressRecord>>;

    // ===== Job Log =====

    /// Appends an entry to the job log
    ///
    /// # Returns
    ///
    /// The ID of the new entry
    fn append_log(
        &mut self,
        task_name: &str,
        level: LogLevel,
        message: &str,
        url: Option<&str>,
    ) -> StorageResult<i64>;

    /// Gets the newest log entries, optionally filtered by task and level
    fn recent_logs(
        &self,
        task_name: Option<&str>,
        level: Option<LogLevel>,
        limit: u32,
    ) -> StorageResult<Vec<LogRecord>>;

    /// Counts log entries of one level, optionally restricted to a URL
    fn count_logs(&self, level: LogLevel, url: Option<&str>) -> StorageResult<u64>;

    // ===== Medicines =====

    /// Looks up the row ID for an external key
    fn find_medicine_id(&self, external_key: &str) -> StorageResult<Option<i64>>;

    /// Inserts a new medicine row
    ///
    /// # Returns
    ///
    /// The ID of the new row
    fn insert_medicine(&mut self, medicine: &NewMedicine<'_>) -> StorageResult<i64>;

    /// Overwrites every scraped column of an existing row
    fn update_medicine(&mut self, id: i64, medicine: &NewMedicine<'_>) -> StorageResult<()>;

    /// Gets a medicine by ID
    fn get_medicine(&self, id: i64) -> StorageResult<MedicineRecord>;

    /// Gets a medicine by its external key
    fn get_medicine_by_key(&self, external_key: &str) -> StorageResult<Option<MedicineRecord>>;

    /// Lists medicines ordered by name
    ///
    /// `search` matches name, generic name, or manufacturer (substring, case-insensitive).
    fn list_medicines(
        &self,
        search: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> StorageResult<Vec<MedicineRecord>>;

    /// Counts medicines matching the same filter as `list_medicines`
    fn count_medicines(&self, search: Option<&str>) -> StorageResult<u64>;

    // ===== Categories =====

    /// Inserts a category
    fn insert_category(&mut self, name: &str, slug: &str) -> StorageResult<i64>;

    /// Resolves a category name or slug to its ID (case-insensitive)
    fn find_category_id(&self, name: &str) -> StorageResult<Option<i64>>;

    /// Gets all categories
    fn list_categories(&self) -> StorageResult<Vec<CategoryRecord>>;

    // ===== Statistics =====

    /// Counts distinct non-empty manufacturers
    fn count_unique_manufacturers(&self) -> StorageResult<u64>;

    /// Counts medicines that have a saved image
    fn count_medicines_with_images(&self) -> StorageResult<u64>;

    /// Counts medicines scraped at or after the given RFC 3339 timestamp
    fn count_medicines_scraped_since(&self, since: &str) -> StorageResult<u64>;
}
