//! Dedup gate and persistence sink
//!
//! Writes one extracted medicine: the raw HTML snapshot, the downloaded image, and
//! the database row, upserted by external key.

use crate::config::OutputConfig;
use crate::crawler::PageFetcher;
use crate::sites::ScrapedMedicine;
use crate::storage::{
    lock_storage, BlobStore, NewMedicine, SharedStorage, Storage, StorageResult,
};
use std::path::Path;

/// What happened to the row of a persisted item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    Inserted,
    Updated,
}

/// Result of persisting one item
#[derive(Debug, Clone, PartialEq)]
pub struct PersistOutcome {
    pub id: i64,
    pub action: RowAction,
    /// Blob failures that were tolerated
    pub warnings: Vec<String>,
}

/// Looks up the row id already stored under `external_key`
pub fn check_existing(storage: &dyn Storage, external_key: &str) -> StorageResult<Option<i64>> {
    storage.find_medicine_id(external_key)
}

/// Upserts a medicine row, resolving its category by name or slug
///
/// An existing row is overwritten in place (last write wins). Blob paths that
/// are `None` keep whatever the row already had.
pub fn upsert_medicine(
    storage: &mut dyn Storage,
    item: &ScrapedMedicine,
    image_path: Option<String>,
    html_path: Option<String>,
) -> StorageResult<(i64, RowAction)> {
    let category_id = match item.category.as_deref() {
        Some(category) if !category.trim().is_empty() => storage.find_category_id(category)?,
        _ => None,
    };

    let row = NewMedicine {
        item,
        category_id,
        image_path,
        html_path,
    };

    match check_existing(&*storage, &item.external_key())? {
        Some(id) => {
            storage.update_medicine(id, &row)?;
            Ok((id, RowAction::Updated))
        }
        None => {
            let id = storage.insert_medicine(&row)?;
            Ok((id, RowAction::Inserted))
        }
    }
}

/// Writes extracted items and their blobs
pub struct PersistenceSink {
    storage: SharedStorage,
    blobs: BlobStore,
    save_html: bool,
    download_images: bool,
}

impl PersistenceSink {
    pub fn new(storage: SharedStorage, output: &OutputConfig) -> Self {
        Self {
            storage,
            blobs: BlobStore::new(&output.html_dir, &output.image_dir),
            save_html: output.save_html,
            download_images: output.download_images,
        }
    }

    /// Persists one item
    ///
    /// The image is downloaded before the storage lock is taken. Blob failures
    /// are returned as warnings; only a row failure is an error.
    ///
    /// # Arguments
    ///
    /// * `item` - The extracted record
    /// * `html` - Markup of the item page
    /// * `fetcher` - Used to download the image
    pub async fn persist(
        &self,
        item: &ScrapedMedicine,
        html: &str,
        fetcher: &PageFetcher,
    ) -> StorageResult<PersistOutcome> {
        let key = item.external_key();
        let mut warnings = Vec::new();

        let html_path = if self.save_html {
            match self.blobs.save_html(&key, html) {
                Ok(path) => Some(path_string(&path)),
                Err(e) => {
                    warnings.push(format!("Failed to save HTML for {}: {}", key, e));
                    None
                }
            }
        } else {
            None
        };

        let image_path = match item.image_url.as_deref() {
            Some(image_url) if self.download_images => {
                match self.download_image(&key, image_url, fetcher).await {
                    Ok(path) => Some(path),
                    Err(message) => {
                        warnings.push(message);
                        None
                    }
                }
            }
            _ => None,
        };

        for warning in &warnings {
            tracing::warn!("{}", warning);
        }

        let mut storage = lock_storage(&self.storage)?;
        let (id, action) = upsert_medicine(&mut *storage, item, image_path, html_path)?;

        Ok(PersistOutcome {
            id,
            action,
            warnings,
        })
    }

    async fn download_image(
        &self,
        key: &str,
        image_url: &str,
        fetcher: &PageFetcher,
    ) -> Result<String, String> {
        let bytes = fetcher
            .fetch_bytes(image_url)
            .await
            .map_err(|e| format!("Failed to download image for {}: {}", key, e))?;

        self.blobs
            .save_image(key, &bytes, image_url)
            .map(|path| path_string(&path))
            .map_err(|e| format!("Failed to save image for {}: {}", key, e))
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
