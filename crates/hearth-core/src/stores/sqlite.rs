//! SQLite-backed store implementations.
//!
//! One database file holds all three record kinds, each serialized as a
//! JSON document keyed by its identifier. Store traffic is low-volume and
//! single-writer, so a mutex-guarded connection replaces pooling.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use crate::errors::StoreError;
use crate::protocol::{DeviceConfiguration, DeviceTranslation, UserAccess};

use super::{AccessStore, ConfigStore, TranslationStore};

/// SQLite-backed store for access, configuration, and translation records.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: PathBuf::from(path),
            source,
        })?;
        Self::migrate(&conn).map_err(|source| StoreError::Open {
            path: PathBuf::from(path),
            source,
        })?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database. Used in tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(StoreError::Query)?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn migrate(conn: &Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS device_configurations (
                 serial   TEXT PRIMARY KEY,
                 document TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS device_translations (
                 serial   TEXT PRIMARY KEY,
                 document TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS user_accesses (
                 identifier      TEXT PRIMARY KEY,
                 user_identifier TEXT NOT NULL,
                 document        TEXT NOT NULL
             );",
        )
    }

    fn get_document<T: serde::de::DeserializeOwned>(&self, table: &str, serial: &str) -> Option<T> {
        let conn = self.conn.lock();
        let query = format!("SELECT document FROM {table} WHERE serial = ?1");
        let row: Option<String> = match conn
            .query_row(&query, params![serial], |row| row.get(0))
            .optional()
        {
            Ok(row) => row,
            Err(e) => {
                warn!(table, serial, error = %e, "store read failed");
                return None;
            }
        };
        row.and_then(|doc| serde_json::from_str(&doc).ok())
    }

    fn save_document<T: serde::Serialize>(&self, table: &str, serial: &str, value: &T) -> bool {
        let Ok(document) = serde_json::to_string(value) else {
            return false;
        };
        let conn = self.conn.lock();
        let query =
            format!("INSERT INTO {table} (serial, document) VALUES (?1, ?2) ON CONFLICT(serial) DO UPDATE SET document = ?2");
        match conn.execute(&query, params![serial, document]) {
            Ok(_) => true,
            Err(e) => {
                warn!(table, serial, error = %e, "store write failed");
                false
            }
        }
    }

    fn delete_document(&self, table: &str, serial: &str) -> bool {
        let conn = self.conn.lock();
        let query = format!("DELETE FROM {table} WHERE serial = ?1");
        match conn.execute(&query, params![serial]) {
            Ok(deleted) => deleted > 0,
            Err(e) => {
                warn!(table, serial, error = %e, "store delete failed");
                false
            }
        }
    }
}

impl ConfigStore for SqliteStore {
    fn get(&self, serial: &str) -> Option<DeviceConfiguration> {
        self.get_document("device_configurations", serial)
    }

    fn save(&self, serial: &str, config: &DeviceConfiguration) -> bool {
        self.save_document("device_configurations", serial, config)
    }

    fn delete(&self, serial: &str) -> bool {
        self.delete_document("device_configurations", serial)
    }
}

impl TranslationStore for SqliteStore {
    fn get(&self, serial: &str) -> Option<DeviceTranslation> {
        self.get_document("device_translations", serial)
    }

    fn save(&self, serial: &str, translation: &DeviceTranslation) -> bool {
        self.save_document("device_translations", serial, translation)
    }

    fn delete(&self, serial: &str) -> bool {
        self.delete_document("device_translations", serial)
    }
}

impl AccessStore for SqliteStore {
    fn save(&self, access: &UserAccess) -> bool {
        let Ok(document) = serde_json::to_string(access) else {
            return false;
        };
        let conn = self.conn.lock();
        match conn.execute(
            "INSERT INTO user_accesses (identifier, user_identifier, document) VALUES (?1, ?2, ?3)
             ON CONFLICT(identifier) DO UPDATE SET user_identifier = ?2, document = ?3",
            params![access.identifier, access.user_identifier, document],
        ) {
            Ok(_) => true,
            Err(e) => {
                warn!(identifier = %access.identifier, error = %e, "access write failed");
                false
            }
        }
    }

    fn list(&self) -> Vec<UserAccess> {
        let conn = self.conn.lock();
        let mut statement = match conn.prepare("SELECT document FROM user_accesses") {
            Ok(statement) => statement,
            Err(e) => {
                warn!(error = %e, "access list failed");
                return Vec::new();
            }
        };
        let rows = statement.query_map([], |row| row.get::<_, String>(0));
        match rows {
            Ok(rows) => rows
                .filter_map(Result::ok)
                .filter_map(|doc| serde_json::from_str(&doc).ok())
                .collect(),
            Err(e) => {
                warn!(error = %e, "access list failed");
                Vec::new()
            }
        }
    }

    fn validate(&self, user_identifier: &str, access_identifier: &str) -> bool {
        let conn = self.conn.lock();
        let found: Result<Option<i64>, _> = conn
            .query_row(
                "SELECT 1 FROM user_accesses WHERE identifier = ?1 AND user_identifier = ?2",
                params![access_identifier, user_identifier],
                |row| row.get(0),
            )
            .optional();
        match found {
            Ok(row) => row.is_some(),
            Err(e) => {
                warn!(error = %e, "access validate failed");
                false
            }
        }
    }
}
