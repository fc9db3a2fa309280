//! SQLite persistence for users and prediction records.

use parking_lot::Mutex;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS user (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS record (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    model TEXT NOT NULL,
    label TEXT NOT NULL,
    probability REAL NOT NULL
);";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("user name already registered: {0}")]
    DuplicateName(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: i64,
    pub model: String,
    pub label: String,
    pub probability: f64,
}

/// Shared handle; queries are serialized on one connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database file and make sure both tables exist.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "sqlite store opened");
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub fn find_user_by_name(&self, name: &str) -> Result<Option<User>, StoreError> {
        let conn = self.conn.lock();
        let user = conn
            .query_row("SELECT id, name, password_hash FROM user WHERE name = ?1", params![name], |row| {
                Ok(User { id: row.get(0)?, name: row.get(1)?, password_hash: row.get(2)? })
            })
            .optional()?;
        Ok(user)
    }

    /// Fails with `DuplicateName` when the unique constraint rejects the row.
    pub fn insert_user(&self, name: &str, password_hash: &str) -> Result<User, StoreError> {
        let conn = self.conn.lock();
        match conn.execute("INSERT INTO user (name, password_hash) VALUES (?1, ?2)", params![name, password_hash]) {
            Ok(_) => Ok(User { id: conn.last_insert_rowid(), name: name.to_string(), password_hash: password_hash.to_string() }),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StoreError::DuplicateName(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn insert_record(&self, model: &str, label: &str, probability: f64) -> Result<Record, StoreError> {
        let conn = self.conn.lock();
        conn.execute("INSERT INTO record (model, label, probability) VALUES (?1, ?2, ?3)", params![model, label, probability])?;
        Ok(Record { id: conn.last_insert_rowid(), model: model.to_string(), label: label.to_string(), probability })
    }

    /// All records in insertion order.
    pub fn list_records(&self) -> Result<Vec<Record>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT id, model, label, probability FROM record ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Record { id: row.get(0)?, model: row.get(1)?, label: row.get(2)?, probability: row.get(3)? })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn count_records(&self) -> Result<u64, StoreError> { self.count("record") }
    pub fn count_users(&self) -> Result<u64, StoreError> { self.count("user") }

    fn count(&self, table: &'static str) -> Result<u64, StoreError> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(n as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_names_are_unique() {
        let store = Store::open_in_memory().unwrap();
        let u = store.insert_user("ada", "h1").unwrap();
        assert_eq!(u.id, 1);
        assert!(matches!(store.insert_user("ada", "h2"), Err(StoreError::DuplicateName(n)) if n == "ada"));
        assert_eq!(store.count_users().unwrap(), 1);
        assert_eq!(store.find_user_by_name("ada").unwrap().unwrap().password_hash, "h1");
        assert!(store.find_user_by_name("bob").unwrap().is_none());
    }

    #[test]
    fn records_list_in_insertion_order() {
        let store = Store::open_in_memory().unwrap();
        store.insert_record("MobileNetV2", "tabby", 0.61).unwrap();
        store.insert_record("MobileNetV2", "goldfish", 0.93).unwrap();
        let all = store.list_records().unwrap();
        assert_eq!(all.iter().map(|r| r.label.as_str()).collect::<Vec<_>>(), vec!["tabby", "goldfish"]);
        assert_eq!(all[1].id, 2);
        assert_eq!(store.count_records().unwrap(), 2);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.db");
        Store::open(&path).unwrap().insert_record("M", "l", 0.5).unwrap();
        let reopened = Store::open(&path).unwrap();
        assert_eq!(reopened.count_records().unwrap(), 1);
    }
}
