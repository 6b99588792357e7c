//! Storage module for persisting scrape data
//!
//! This module handles all persistence for the scraper, including:
//! - SQLite database initialization and schema management
//! - Medicine rows keyed by their external key
//! - Per-task progress checkpoints and the job log
//! - Raw HTML and image blobs on the file tree

mod blobs;
mod schema;
mod sqlite;
mod traits;

pub use blobs::{BlobStore, BlobUsage, CleanupReport};
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::sites::ScrapedMedicine;
use crate::state::{ResumeCursor, ScrapeStatus};
use crate::HarvestError;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage handle shared between the job task and the API handlers
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(HarvestError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// Opens a storage database wrapped for sharing across tasks
pub fn open_shared_storage(path: &Path) -> Result<SharedStorage, HarvestError> {
    Ok(Arc::new(Mutex::new(SqliteStorage::new(path)?)))
}

/// Locks the shared storage
///
/// A poisoned lock means a thread panicked mid-write, which is reported as a
/// fatal storage error.
pub fn lock_storage(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, SqliteStorage>> {
    storage.lock().map_err(|_| StorageError::Poisoned)
}

/// A medicine row about to be written
#[derive(Debug, Clone)]
pub struct NewMedicine<'a> {
    pub item: &'a ScrapedMedicine,
    pub category_id: Option<i64>,
    pub image_path: Option<String>,
    pub html_path: Option<String>,
}

/// Represents a medicine in the database
#[derive(Debug, Clone, Serialize)]
pub struct MedicineRecord {
    pub id: i64,
    pub external_key: String,
    pub product_code: Option<String>,
    pub source_url: String,
    pub name: String,
    pub generic_name: Option<String>,
    pub brand_name: Option<String>,
    pub manufacturer: Option<String>,
    pub strength: Option<String>,
    pub dosage_form: Option<String>,
    pub pack_size: Option<String>,
    pub price: Option<f64>,
    pub currency: String,
    pub description: Option<String>,
    pub indications: Option<String>,
    pub contraindications: Option<String>,
    pub side_effects: Option<String>,
    pub dosage_instructions: Option<String>,
    pub storage_conditions: Option<String>,
    pub category_id: Option<i64>,
    pub image_url: Option<String>,
    pub image_path: Option<String>,
    pub html_path: Option<String>,
    pub raw_data: Option<serde_json::Value>,
    pub created_at: String,
    pub updated_at: String,
    pub last_scraped: String,
}

/// Represents a category in the database
#[derive(Debug, Clone, Serialize)]
pub struct CategoryRecord {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// The stored checkpoint of one task
#[derive(Debug, Clone)]
pub struct ProgressRecord {
    pub task_name: String,
    pub current_page: u32,
    pub total_pages: u32,
    pub processed_items: u64,
    pub total_items: u64,
    pub status: ScrapeStatus,
    pub resume_cursor: Option<ResumeCursor>,
    pub error_message: Option<String>,
    pub config_hash: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl ProgressRecord {
    /// A new, never-started record for the given task
    pub fn pending(task_name: &str) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            task_name: task_name.to_string(),
            current_page: 1,
            total_pages: 0,
            processed_items: 0,
            total_items: 0,
            status: ScrapeStatus::Pending,
            resume_cursor: None,
            error_message: None,
            config_hash: None,
            created_at: now.clone(),
            updated_at: now,
            completed_at: None,
        }
    }
}

/// An entry in the job log
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub id: i64,
    pub task_name: String,
    pub level: LogLevel,
    pub message: String,
    pub url: Option<String>,
    pub created_at: String,
}

/// Severity of a job log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }

    /// Parses a level, accepting any letter case
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Some(Self::Debug),
            "INFO" => Some(Self::Info),
            "WARNING" | "WARN" => Some(Self::Warning),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
