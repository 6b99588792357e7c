//! File tree for raw HTML snapshots and downloaded images
//!
//! Files are bucketed by year and month of capture:
//! `<html_dir>/YYYY/MM/<key>_<timestamp>_<sha8>.html` and
//! `<image_dir>/YYYY/MM/<key>_<sha8>.<ext>`.

use chrono::{Datelike, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Writes and maintains the blob directories
#[derive(Debug, Clone)]
pub struct BlobStore {
    html_dir: PathBuf,
    image_dir: PathBuf,
}

/// Disk usage of the blob directories
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BlobUsage {
    pub html_files: u64,
    pub html_bytes: u64,
    pub image_files: u64,
    pub image_bytes: u64,
}

/// Result of removing old blobs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub html_removed: u64,
    pub images_removed: u64,
    pub bytes_freed: u64,
}

impl BlobStore {
    pub fn new(html_dir: impl Into<PathBuf>, image_dir: impl Into<PathBuf>) -> Self {
        Self {
            html_dir: html_dir.into(),
            image_dir: image_dir.into(),
        }
    }

    /// Saves a raw HTML snapshot
    ///
    /// # Arguments
    ///
    /// * `key` - External key of the item the page belongs to
    /// * `html` - Page markup as fetched
    ///
    /// # Returns
    ///
    /// The path of the written file
    pub fn save_html(&self, key: &str, html: &str) -> io::Result<PathBuf> {
        let now = Utc::now();
        let dir = month_dir(&self.html_dir);
        fs::create_dir_all(&dir)?;

        let file_name = format!(
            "{}_{}_{}.html",
            sanitize_key(key),
            now.format("%Y%m%d_%H%M%S"),
            short_digest(html.as_bytes())
        );
        let path = dir.join(file_name);
        fs::write(&path, html)?;
        Ok(path)
    }

    /// Saves downloaded image bytes unchanged
    ///
    /// Identical content for the same key maps to the same file, which is
    /// not rewritten.
    pub fn save_image(&self, key: &str, bytes: &[u8], source_url: &str) -> io::Result<PathBuf> {
        let dir = month_dir(&self.image_dir);
        fs::create_dir_all(&dir)?;

        let ext = image_extension(source_url, bytes);
        let file_name = format!("{}_{}.{}", sanitize_key(key), short_digest(bytes), ext);
        let path = dir.join(file_name);
        if !path.exists() {
            fs::write(&path, bytes)?;
        }
        Ok(path)
    }

    /// Removes blob files last modified more than `days` days ago
    pub fn cleanup_older_than(&self, days: u32) -> io::Result<CleanupReport> {
        let max_age = Duration::from_secs(u64::from(days) * 24 * 60 * 60);
        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        let mut report = CleanupReport::default();
        for (path, size, modified) in list_files(&self.html_dir)? {
            if modified < cutoff {
                fs::remove_file(&path)?;
                report.html_removed += 1;
                report.bytes_freed += size;
            }
        }
        for (path, size, modified) in list_files(&self.image_dir)? {
            if modified < cutoff {
                fs::remove_file(&path)?;
                report.images_removed += 1;
                report.bytes_freed += size;
            }
        }

        if report.html_removed + report.images_removed > 0 {
            tracing::info!(
                "Removed {} HTML and {} image files older than {} days ({} bytes)",
                report.html_removed,
                report.images_removed,
                days,
                report.bytes_freed
            );
        }
        Ok(report)
    }

    /// Counts files and bytes under both directories
    pub fn usage(&self) -> io::Result<BlobUsage> {
        let html = list_files(&self.html_dir)?;
        let images = list_files(&self.image_dir)?;
        Ok(BlobUsage {
            html_files: html.len() as u64,
            html_bytes: html.iter().map(|(_, size, _)| size).sum(),
            image_files: images.len() as u64,
            image_bytes: images.iter().map(|(_, size, _)| size).sum(),
        })
    }
}

fn month_dir(root: &Path) -> PathBuf {
    let now = Utc::now();
    root.join(format!("{:04}", now.year()))
        .join(format!("{:02}", now.month()))
}

/// Keeps keys (product codes or URLs) safe as file name stems
fn sanitize_key(key: &str) -> String {
    let cleaned: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(80)
        .collect();
    if cleaned.is_empty() {
        "item".to_string()
    } else {
        cleaned
    }
}

fn short_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..4])
}

fn image_extension(source_url: &str, bytes: &[u8]) -> &'static str {
    let path = url::Url::parse(source_url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_default();
    for ext in ["jpg", "jpeg", "png", "webp", "gif"] {
        if path.ends_with(&format!(".{}", ext)) {
            return ext;
        }
    }

    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "png"
    } else if bytes.starts_with(b"GIF8") {
        "gif"
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "webp"
    } else {
        "jpg"
    }
}

/// Recursively lists regular files with their size and modification time
///
/// A missing root yields an empty list.
fn list_files(root: &Path) -> io::Result<Vec<(PathBuf, u64, SystemTime)>> {
    let mut files = Vec::new();
    if !root.exists() {
        return Ok(files);
    }

    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if metadata.is_dir() {
                pending.push(entry.path());
            } else if metadata.is_file() {
                let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                files.push((entry.path(), metadata.len(), modified));
            }
        }
    }
    Ok(files)
}
