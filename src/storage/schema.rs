//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the rx-harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Reference data, inserted out-of-band
CREATE TABLE IF NOT EXISTS categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    slug TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);

-- Scraped catalog items, one row per external key
CREATE TABLE IF NOT EXISTS medicines (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_key TEXT NOT NULL UNIQUE,
    product_code TEXT,
    source_url TEXT NOT NULL,
    name TEXT NOT NULL,
    generic_name TEXT,
    brand_name TEXT,
    manufacturer TEXT,
    strength TEXT,
    dosage_form TEXT,
    pack_size TEXT,
    price REAL,
    currency TEXT NOT NULL DEFAULT 'BDT',
    description TEXT,
    indications TEXT,
    contraindications TEXT,
    side_effects TEXT,
    dosage_instructions TEXT,
    storage_conditions TEXT,
    category_id INTEGER REFERENCES categories(id),
    image_url TEXT,
    image_path TEXT,
    html_path TEXT,
    raw_data TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    last_scraped TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_medicines_name ON medicines(name);
CREATE INDEX IF NOT EXISTS idx_medicines_product_code ON medicines(product_code);
CREATE INDEX IF NOT EXISTS idx_medicines_manufacturer ON medicines(manufacturer);
CREATE INDEX IF NOT EXISTS idx_medicines_last_scraped ON medicines(last_scraped);

-- Durable checkpoint, one row per task
CREATE TABLE IF NOT EXISTS scrape_progress (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_name TEXT NOT NULL UNIQUE,
    current_page INTEGER NOT NULL DEFAULT 1,
    total_pages INTEGER NOT NULL DEFAULT 0,
    processed_items INTEGER NOT NULL DEFAULT 0,
    total_items INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    resume_cursor TEXT,
    error_message TEXT,
    config_hash TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    completed_at TEXT
);

-- Operator-visible job events, append-only
CREATE TABLE IF NOT EXISTS scrape_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_name TEXT NOT NULL,
    level TEXT NOT NULL,
    message TEXT NOT NULL,
    url TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_scrape_logs_task ON scrape_logs(task_name);
CREATE INDEX IF NOT EXISTS idx_scrape_logs_level ON scrape_logs(level);
"#;

/// Initializes the database schema
///
/// Every statement is idempotent, so this runs on each open.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
