//! Statistics generation from the catalog database
//!
//! This module provides functionality for extracting and displaying
//! catalog and job statistics from the storage layer.

use crate::state::ScrapeStatus;
use crate::storage::{BlobStore, BlobUsage, Storage};
use crate::HarvestError;
use chrono::{Duration, Utc};
use serde::Serialize;

/// Progress of one task, as reported in statistics
#[derive(Debug, Clone, Serialize)]
pub struct TaskStatistics {
    pub task_name: String,
    pub status: ScrapeStatus,
    pub current_page: u32,
    pub total_pages: u32,
    pub processed_items: u64,
    pub total_items: u64,
    pub updated_at: String,
}

/// Catalog statistics summary
#[derive(Debug, Clone, Serialize)]
pub struct HarvestStatistics {
    /// Number of medicine rows
    pub total_medicines: u64,

    /// Distinct non-empty manufacturer names
    pub unique_manufacturers: u64,

    /// Rows with a downloaded image
    pub with_images: u64,

    /// Rows scraped during the last 24 hours
    pub scraped_last_24h: u64,

    /// Number of categories
    pub categories: u64,

    /// Job log entries at ERROR level
    pub error_logs: u64,

    /// One entry per task with stored progress
    pub tasks: Vec<TaskStatistics>,

    /// Disk usage of the blob tree, when it was inspected
    pub blobs: Option<BlobUsage>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `blobs` - Blob tree to measure, if any
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(
    storage: &dyn Storage,
    blobs: Option<&BlobStore>,
) -> Result<HarvestStatistics, HarvestError> {
    let since = (Utc::now() - Duration::hours(24)).to_rfc3339();

    let tasks = storage
        .list_progress()?
        .into_iter()
        .map(|p| TaskStatistics {
            task_name: p.task_name,
            status: p.status,
            current_page: p.current_page,
            total_pages: p.total_pages,
            processed_items: p.processed_items,
            total_items: p.total_items,
            updated_at: p.updated_at,
        })
        .collect();

    let blobs = match blobs {
        Some(store) => Some(store.usage()?),
        None => None,
    };

    Ok(HarvestStatistics {
        total_medicines: storage.count_medicines(None)?,
        unique_manufacturers: storage.count_unique_manufacturers()?,
        with_images: storage.count_medicines_with_images()?,
        scraped_last_24h: storage.count_medicines_scraped_since(&since)?,
        categories: storage.list_categories()?.len() as u64,
        error_logs: storage.count_logs(crate::storage::LogLevel::Error, None)?,
        tasks,
        blobs,
    })
}

fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Catalog Statistics ===\n");

    println!("Overview:");
    println!("  Total medicines: {}", stats.total_medicines);
    println!("  Unique manufacturers: {}", stats.unique_manufacturers);
    println!("  Categories: {}", stats.categories);
    println!("  Scraped in the last 24h: {}", stats.scraped_last_24h);
    println!("  Logged errors: {}", stats.error_logs);
    println!();

    let image_rate = if stats.total_medicines > 0 {
        (stats.with_images as f64 / stats.total_medicines as f64) * 100.0
    } else {
        0.0
    };
    println!(
        "Images: {} ({:.1}% of medicines)",
        stats.with_images, image_rate
    );
    println!();

    if !stats.tasks.is_empty() {
        println!("Tasks:");
        for task in &stats.tasks {
            println!(
                "  {}: {} (page {}/{}, {}/{} items, updated {})",
                task.task_name,
                task.status,
                task.current_page,
                task.total_pages,
                task.processed_items,
                task.total_items,
                task.updated_at
            );
        }
        println!();
    }

    if let Some(blobs) = &stats.blobs {
        println!("Blob Storage:");
        println!(
            "  HTML: {} files, {:.2} MB",
            blobs.html_files,
            megabytes(blobs.html_bytes)
        );
        println!(
            "  Images: {} files, {:.2} MB",
            blobs.image_files,
            megabytes(blobs.image_bytes)
        );
    }
}
