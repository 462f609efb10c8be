//! SQLite database for farm records.
//!
//! One connection guarded by a mutex; every method locks it for the
//! duration of a single statement or transaction. Collections live in the
//! submodules as further `impl Database` blocks.

mod accounts;
mod inventory;
mod plates;
mod sensors;

pub use sensors::ReadingFilter;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{AppError, AppResult};

/// File name of the database inside the data directory.
pub const DB_FILE_NAME: &str = "agridash.db";

/// Database wrapper with thread-safe connection.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens or creates the database in `data_dir`.
    pub fn open(data_dir: &Path) -> AppResult<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join(DB_FILE_NAME);

        tracing::info!(path = ?db_path, "Opening database");

        let conn = Connection::open(&db_path)?;

        // WAL for crash safety
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        Self::from_connection(conn)
    }

    /// Opens an in-memory database (for testing).
    pub fn open_in_memory() -> AppResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> AppResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Locks the connection. A poisoned lock still holds a usable connection.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Initializes the database schema.
    fn init_schema(&self) -> AppResult<()> {
        let conn = self.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL,
                farm_name TEXT,
                farm_location TEXT,
                plan TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS suppliers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                contact_name TEXT,
                email TEXT,
                phone TEXT,
                address TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                sku TEXT NOT NULL UNIQUE,
                category TEXT NOT NULL,
                supplier_id INTEGER REFERENCES suppliers(id) ON DELETE SET NULL,
                unit TEXT NOT NULL,
                quantity INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
                reorder_level INTEGER NOT NULL DEFAULT 0,
                max_stock INTEGER,
                unit_price REAL NOT NULL DEFAULT 0,
                daily_usage REAL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS invoices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                supplier_id INTEGER NOT NULL REFERENCES suppliers(id),
                invoice_number TEXT NOT NULL,
                amount REAL NOT NULL,
                issued_on TEXT NOT NULL,
                due_on TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                paid_on TEXT,
                created_at TEXT NOT NULL,
                UNIQUE (supplier_id, invoice_number)
            );

            CREATE TABLE IF NOT EXISTS barley_plates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                plate_code TEXT NOT NULL UNIQUE,
                variety TEXT NOT NULL,
                sown_on TEXT NOT NULL,
                stage TEXT NOT NULL,
                tray_location TEXT,
                seed_weight_g REAL NOT NULL DEFAULT 0,
                yield_weight_g REAL,
                harvested_on TEXT,
                notes TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sensor_readings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sensor_id TEXT NOT NULL,
                metric TEXT NOT NULL,
                value REAL NOT NULL,
                unit TEXT,
                recorded_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS contact_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                subject TEXT NOT NULL,
                message TEXT NOT NULL,
                handled BOOLEAN NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            -- Registration wizard drafts, keyed by opaque token
            CREATE TABLE IF NOT EXISTS registrations (
                token TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Configuration settings
            CREATE TABLE IF NOT EXISTS config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                description TEXT,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_products_category ON products(category);
            CREATE INDEX IF NOT EXISTS idx_invoices_issued ON invoices(issued_on);
            CREATE INDEX IF NOT EXISTS idx_plates_stage ON barley_plates(stage);
            CREATE INDEX IF NOT EXISTS idx_readings_series
                ON sensor_readings(sensor_id, metric, recorded_at);
            CREATE INDEX IF NOT EXISTS idx_readings_time ON sensor_readings(recorded_at);
            "#,
        )?;

        // Seed default config if empty
        let config_count: i64 = conn.query_row("SELECT COUNT(*) FROM config", [], |r| r.get(0))?;
        if config_count == 0 {
            let now = Utc::now();
            for (key, value, description) in crate::config::DEFAULT_SETTINGS {
                conn.execute(
                    "INSERT INTO config (key, value, description, updated_at) VALUES (?1, ?2, ?3, ?4)",
                    params![key, value, description, now],
                )?;
            }

            tracing::info!(
                "Added {} default config settings",
                crate::config::DEFAULT_SETTINGS.len()
            );
        }

        tracing::debug!("Database schema initialized");
        Ok(())
    }

    // === Config Methods ===

    /// Gets a configuration value by key.
    pub fn get_config(&self, key: &str) -> AppResult<Option<String>> {
        let conn = self.lock();
        let value = conn
            .query_row(
                "SELECT value FROM config WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Sets an existing configuration value. Returns false for unknown keys.
    pub fn set_config(&self, key: &str, value: &str) -> AppResult<bool> {
        let conn = self.lock();
        let affected = conn.execute(
            "UPDATE config SET value = ?1, updated_at = ?2 WHERE key = ?3",
            params![value, Utc::now(), key],
        )?;
        Ok(affected > 0)
    }

    /// Gets all config settings.
    pub fn get_all_config(&self) -> AppResult<Vec<ConfigSetting>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT key, value, description FROM config ORDER BY key")?;
        let rows = stmt.query_map([], |row| {
            Ok(ConfigSetting {
                key: row.get(0)?,
                value: row.get(1)?,
                description: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Record counts for the dashboard landing page.
    pub fn dashboard_counts(&self) -> AppResult<DashboardCounts> {
        let conn = self.lock();
        let counts = conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM suppliers),
                (SELECT COUNT(*) FROM products),
                (SELECT COUNT(*) FROM barley_plates WHERE stage NOT IN ('harvested', 'discarded')),
                (SELECT COUNT(*) FROM invoices WHERE status = 'pending'),
                (SELECT COUNT(*) FROM (SELECT DISTINCT sensor_id FROM sensor_readings))",
            [],
            |row| {
                Ok(DashboardCounts {
                    suppliers: row.get(0)?,
                    products: row.get(1)?,
                    plates_active: row.get(2)?,
                    open_invoices: row.get(3)?,
                    sensors: row.get(4)?,
                })
            },
        )?;
        Ok(counts)
    }
}

/// Reads a text column and parses it with `FromStr`.
pub(crate) fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = AppError>,
{
    let text: String = row.get(idx)?;
    text.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Reads an optional text column and parses it with `FromStr`.
pub(crate) fn parse_optional_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = AppError>,
{
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        t.parse::<T>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    })
    .transpose()
}

/// A configuration row.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSetting {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
}

/// Landing-page counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardCounts {
    pub suppliers: i64,
    pub products: i64,
    pub plates_active: i64,
    pub open_invoices: i64,
    pub sensors: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_database() {
        let db = Database::open_in_memory().unwrap();
        let counts = db.dashboard_counts().unwrap();
        assert_eq!(counts.products, 0);
        assert_eq!(counts.sensors, 0);
    }

    #[test]
    fn test_open_on_disk_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("nested");
        let _db = Database::open(&data_dir).unwrap();
        assert!(data_dir.join(DB_FILE_NAME).exists());
    }

    #[test]
    fn test_default_config_seeded() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(
            db.get_config("session_ttl_secs").unwrap().as_deref(),
            Some("43200")
        );
        assert_eq!(
            db.get_all_config().unwrap().len(),
            crate::config::DEFAULT_SETTINGS.len()
        );
    }

    #[test]
    fn test_set_config_only_updates_known_keys() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.set_config("max_page_size", "50").unwrap());
        assert_eq!(db.get_config("max_page_size").unwrap().as_deref(), Some("50"));
        assert!(!db.set_config("no_such_key", "1").unwrap());
        assert_eq!(db.get_config("no_such_key").unwrap(), None);
    }
}
