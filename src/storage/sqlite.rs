//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::{ResumeCursor, ScrapeStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    CategoryRecord, LogLevel, LogRecord, MedicineRecord, NewMedicine, ProgressRecord,
};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const MEDICINE_COLUMNS: &str = "id, external_key, product_code, source_url, name, generic_name,
    brand_name, manufacturer, strength, dosage_form, pack_size, price, currency, description,
    indications, contraindications, side_effects, dosage_instructions, storage_conditions,
    category_id, image_url, image_path, html_path, raw_data, created_at, updated_at, last_scraped";

const PROGRESS_COLUMNS: &str = "task_name, current_page, total_pages, processed_items,
    total_items, status, resume_cursor, error_message, config_hash, created_at, updated_at,
    completed_at";

const SEARCH_FILTER: &str =
    "(?1 IS NULL OR name LIKE ?1 OR generic_name LIKE ?1 OR manufacturer LIKE ?1)";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn medicine_from_row(row: &Row<'_>) -> rusqlite::Result<MedicineRecord> {
    let raw_data: Option<String> = row.get(23)?;
    Ok(MedicineRecord {
        id: row.get(0)?,
        external_key: row.get(1)?,
        product_code: row.get(2)?,
        source_url: row.get(3)?,
        name: row.get(4)?,
        generic_name: row.get(5)?,
        brand_name: row.get(6)?,
        manufacturer: row.get(7)?,
        strength: row.get(8)?,
        dosage_form: row.get(9)?,
        pack_size: row.get(10)?,
        price: row.get(11)?,
        currency: row.get(12)?,
        description: row.get(13)?,
        indications: row.get(14)?,
        contraindications: row.get(15)?,
        side_effects: row.get(16)?,
        dosage_instructions: row.get(17)?,
        storage_conditions: row.get(18)?,
        category_id: row.get(19)?,
        image_url: row.get(20)?,
        image_path: row.get(21)?,
        html_path: row.get(22)?,
        raw_data: raw_data.and_then(|s| serde_json::from_str(&s).ok()),
        created_at: row.get(24)?,
        updated_at: row.get(25)?,
        last_scraped: row.get(26)?,
    })
}

fn progress_from_row(row: &Row<'_>) -> rusqlite::Result<ProgressRecord> {
    let cursor: Option<String> = row.get(6)?;
    Ok(ProgressRecord {
        task_name: row.get(0)?,
        current_page: row.get::<_, i64>(1)?.max(0) as u32,
        total_pages: row.get::<_, i64>(2)?.max(0) as u32,
        processed_items: row.get::<_, i64>(3)?.max(0) as u64,
        total_items: row.get::<_, i64>(4)?.max(0) as u64,
        status: ScrapeStatus::from_db_string(&row.get::<_, String>(5)?)
            .unwrap_or(ScrapeStatus::Pending),
        resume_cursor: cursor.as_deref().and_then(ResumeCursor::from_json),
        error_message: row.get(7)?,
        config_hash: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        completed_at: row.get(11)?,
    })
}

fn log_from_row(row: &Row<'_>) -> rusqlite::Result<LogRecord> {
    Ok(LogRecord {
        id: row.get(0)?,
        task_name: row.get(1)?,
        level: LogLevel::from_db_string(&row.get::<_, String>(2)?).unwrap_or(LogLevel::Info),
        message: row.get(3)?,
        url: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn raw_data_json(medicine: &NewMedicine<'_>) -> StorageResult<Option<String>> {
    if medicine.item.raw_data.is_null() {
        return Ok(None);
    }
    serde_json::to_string(&medicine.item.raw_data)
        .map(Some)
        .map_err(|e| StorageError::Serialization(e.to_string()))
}

fn search_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s))
}

impl Storage for SqliteStorage {
    // ===== Progress Tracking =====

    fn load_progress(&self, task_name: &str) -> StorageResult<Option<ProgressRecord>> {
        let sql = format!(
            "SELECT {} FROM scrape_progress WHERE task_name = ?1",
            PROGRESS_COLUMNS
        );
        let record = self
            .conn
            .query_row(&sql, params![task_name], progress_from_row)
            .optional()?;
        Ok(record)
    }

    fn save_progress(&mut self, progress: &ProgressRecord) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let cursor = progress
            .resume_cursor
            .map(|c| c.to_json())
            .transpose()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        self.conn.execute(
            "INSERT INTO scrape_progress (task_name, current_page, total_pages, processed_items,
                total_items, status, resume_cursor, error_message, config_hash, created_at,
                updated_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(task_name) DO UPDATE SET
                current_page = excluded.current_page,
                total_pages = excluded.total_pages,
                processed_items = excluded.processed_items,
                total_items = excluded.total_items,
                status = excluded.status,
                resume_cursor = excluded.resume_cursor,
                error_message = excluded.error_message,
                config_hash = excluded.config_hash,
                updated_at = excluded.updated_at,
                completed_at = excluded.completed_at",
            params![
                progress.task_name,
                progress.current_page as i64,
                progress.total_pages as i64,
                progress.processed_items as i64,
                progress.total_items as i64,
                progress.status.to_db_string(),
                cursor,
                progress.error_message,
                progress.config_hash,
                progress.created_at,
                now,
                progress.completed_at,
            ],
        )?;
        Ok(())
    }

    fn list_progress(&self) -> StorageResult<Vec<ProgressRecord>> {
        let sql = format!(
            "SELECT {} FROM scrape_progress ORDER BY task_name",
            PROGRESS_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map([], progress_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    // ===== Job Log =====

    fn append_log(
        &mut self,
        task_name: &str,
        level: LogLevel,
        message: &str,
        url: Option<&str>,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO scrape_logs (task_name, level, message, url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![task_name, level.to_db_string(), message, url, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn recent_logs(
        &self,
        task_name: Option<&str>,
        level: Option<LogLevel>,
        limit: u32,
    ) -> StorageResult<Vec<LogRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, task_name, level, message, url, created_at FROM scrape_logs
             WHERE (?1 IS NULL OR task_name = ?1) AND (?2 IS NULL OR level = ?2)
             ORDER BY id DESC LIMIT ?3",
        )?;
        let logs = stmt
            .query_map(
                params![task_name, level.map(|l| l.to_db_string()), limit as i64],
                log_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(logs)
    }

    fn count_logs(&self, level: LogLevel, url: Option<&str>) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM scrape_logs WHERE level = ?1 AND (?2 IS NULL OR url = ?2)",
            params![level.to_db_string(), url],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Medicines =====

    fn find_medicine_id(&self, external_key: &str) -> StorageResult<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM medicines WHERE external_key = ?1",
                params![external_key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn insert_medicine(&mut self, medicine: &NewMedicine<'_>) -> StorageResult<i64> {
        let item = medicine.item;
        let now = Utc::now().to_rfc3339();
        let raw_data = raw_data_json(medicine)?;

        self.conn
            .execute(
                "INSERT INTO medicines (external_key, product_code, source_url, name, generic_name,
                    brand_name, manufacturer, strength, dosage_form, pack_size, price, currency,
                    description, indications, contraindications, side_effects,
                    dosage_instructions, storage_conditions, category_id, image_url, image_path,
                    html_path, raw_data, created_at, updated_at, last_scraped)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                    ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?24, ?24)",
                params![
                    item.external_key(),
                    item.product_code,
                    item.source_url,
                    item.name,
                    item.generic_name,
                    item.brand_name,
                    item.manufacturer,
                    item.strength,
                    item.dosage_form,
                    item.pack_size,
                    item.price,
                    item.currency_or_default(),
                    item.description,
                    item.indications,
                    item.contraindications,
                    item.side_effects,
                    item.dosage_instructions,
                    item.storage_conditions,
                    medicine.category_id,
                    item.image_url,
                    medicine.image_path,
                    medicine.html_path,
                    raw_data,
                    now,
                ],
            )
            .map_err(StorageError::classify)?;

        Ok(self.conn.last_insert_rowid())
    }

    fn update_medicine(&mut self, id: i64, medicine: &NewMedicine<'_>) -> StorageResult<()> {
        let item = medicine.item;
        let now = Utc::now().to_rfc3339();
        let raw_data = raw_data_json(medicine)?;

        let changed = self
            .conn
            .execute(
                "UPDATE medicines SET product_code = ?1, source_url = ?2, name = ?3,
                    generic_name = ?4, brand_name = ?5, manufacturer = ?6, strength = ?7,
                    dosage_form = ?8, pack_size = ?9, price = ?10, currency = ?11,
                    description = ?12, indications = ?13, contraindications = ?14,
                    side_effects = ?15, dosage_instructions = ?16, storage_conditions = ?17,
                    category_id = ?18, image_url = ?19,
                    image_path = COALESCE(?20, image_path), html_path = COALESCE(?21, html_path),
                    raw_data = ?22, updated_at = ?23, last_scraped = ?23
                 WHERE id = ?24",
                params![
                    item.product_code,
                    item.source_url,
                    item.name,
                    item.generic_name,
                    item.brand_name,
                    item.manufacturer,
                    item.strength,
                    item.dosage_form,
                    item.pack_size,
                    item.price,
                    item.currency_or_default(),
                    item.description,
                    item.indications,
                    item.contraindications,
                    item.side_effects,
                    item.dosage_instructions,
                    item.storage_conditions,
                    medicine.category_id,
                    item.image_url,
                    medicine.image_path,
                    medicine.html_path,
                    raw_data,
                    now,
                    id,
                ],
            )
            .map_err(StorageError::classify)?;

        if changed == 0 {
            return Err(StorageError::MedicineNotFound(id));
        }
        Ok(())
    }

    fn get_medicine(&self, id: i64) -> StorageResult<MedicineRecord> {
        let sql = format!("SELECT {} FROM medicines WHERE id = ?1", MEDICINE_COLUMNS);
        self.conn
            .query_row(&sql, params![id], medicine_from_row)
            .optional()?
            .ok_or(StorageError::MedicineNotFound(id))
    }

    fn get_medicine_by_key(&self, external_key: &str) -> StorageResult<Option<MedicineRecord>> {
        let sql = format!(
            "SELECT {} FROM medicines WHERE external_key = ?1",
            MEDICINE_COLUMNS
        );
        let record = self
            .conn
            .query_row(&sql, params![external_key], medicine_from_row)
            .optional()?;
        Ok(record)
    }

    fn list_medicines(
        &self,
        search: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> StorageResult<Vec<MedicineRecord>> {
        let sql = format!(
            "SELECT {} FROM medicines WHERE {} ORDER BY name, id LIMIT ?2 OFFSET ?3",
            MEDICINE_COLUMNS, SEARCH_FILTER
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(
                params![search_pattern(search), limit as i64, offset as i64],
                medicine_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn count_medicines(&self, search: Option<&str>) -> StorageResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM medicines WHERE {}", SEARCH_FILTER);
        let count: i64 = self
            .conn
            .query_row(&sql, params![search_pattern(search)], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Categories =====

    fn insert_category(&mut self, name: &str, slug: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO categories (name, slug, created_at) VALUES (?1, ?2, ?3)",
                params![name, slug, now],
            )
            .map_err(StorageError::classify)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn find_category_id(&self, name: &str) -> StorageResult<Option<i64>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM categories
                 WHERE lower(name) = lower(?1) OR lower(slug) = lower(?1)
                 ORDER BY id LIMIT 1",
                params![name.trim()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn list_categories(&self) -> StorageResult<Vec<CategoryRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, slug FROM categories ORDER BY name")?;
        let categories = stmt
            .query_map([], |row| {
                Ok(CategoryRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    slug: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }

    // ===== Statistics =====

    fn count_unique_manufacturers(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT manufacturer) FROM medicines
             WHERE manufacturer IS NOT NULL AND manufacturer != ''",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_medicines_with_images(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM medicines WHERE image_path IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_medicines_scraped_since(&self, since: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM medicines WHERE last_scraped >= ?1",
            params![since],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
