//! `SQLite`-backed record store.
//!
//! All collections share one `records` table keyed by `(collection, id)`.
//! A collection exists as soon as it has a row; nothing is created up front.

use crate::models::{Projection, Record, StoredRecord};
use crate::storage::sqlite::{
    acquire_lock, configure_connection, record_operation_metrics, status_label,
};
use crate::storage::traits::{RecordStore, UpsertStats};
use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;

const BACKEND: &str = "sqlite";

/// Durable record store on a single `SQLite` database.
///
/// # Concurrency Model
///
/// `rusqlite::Connection` is not `Sync`, so the connection sits behind a
/// `Mutex`. WAL mode and a 5 second busy timeout cover other processes
/// touching the same file.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteRecordStore {
    /// Opens (or creates) the database at `db_path`.
    ///
    /// Parent directories are created when missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "create_store_dir".to_string(),
                cause: format!("{}: {e}", parent.display()),
            })?;
        }
        let conn = Connection::open(&db_path).map_err(|e| Error::OperationFailed {
            operation: "open_sqlite".to_string(),
            cause: e.to_string(),
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::OperationFailed {
            operation: "open_sqlite_in_memory".to_string(),
            cause: e.to_string(),
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub const fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        configure_connection(&conn)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                document TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );
            CREATE INDEX IF NOT EXISTS idx_records_latest
                ON records (collection, created_at);",
        )
        .map_err(|e| Error::OperationFailed {
            operation: "create_records_table".to_string(),
            cause: e.to_string(),
        })
    }

    fn upsert_inner(&self, collection: &str, records: &[Record]) -> Result<UpsertStats> {
        let conn = acquire_lock(&self.conn);
        let mut stats = UpsertStats::default();

        for record in records {
            let stored = StoredRecord::from(record);
            let document = stored.document_json()?;

            let exists: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM records WHERE collection = ?1 AND id = ?2)",
                    params![collection, stored.key],
                    |row| row.get(0),
                )
                .map_err(|e| upsert_error(collection, &stored.key, &e))?;

            conn.execute(
                "INSERT INTO records (collection, id, created_at, document)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(collection, id) DO UPDATE SET
                    created_at = excluded.created_at,
                    document = excluded.document",
                params![collection, stored.key, stored.created_at, document],
            )
            .map_err(|e| upsert_error(collection, &stored.key, &e))?;

            if exists {
                stats.replaced += 1;
            } else {
                stats.inserted += 1;
            }
        }

        Ok(stats)
    }

    fn query_latest_inner(&self, collection: &str) -> Result<Option<Record>> {
        let conn = acquire_lock(&self.conn);
        let row = conn
            .query_row(
                "SELECT id, created_at, document FROM records
                 WHERE collection = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT 1",
                params![collection],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)),
            )
            .optional()
            .map_err(|e| Error::OperationFailed {
                operation: "query_latest".to_string(),
                cause: e.to_string(),
            })?;

        row.map(|(id, created_at, document)| {
            StoredRecord::from_columns(id, created_at, &document).map(StoredRecord::into_record)
        })
        .transpose()
    }

    fn load_all_inner(&self, collection: &str, projection: &Projection) -> Result<Vec<Record>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare(
                "SELECT id, created_at, document FROM records
                 WHERE collection = ?1
                 ORDER BY rowid",
            )
            .map_err(|e| load_error(&e))?;

        let rows = stmt
            .query_map(params![collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })
            .map_err(|e| load_error(&e))?;

        let mut records = Vec::new();
        for row in rows {
            let (id, created_at, document) = row.map_err(|e| load_error(&e))?;
            let record = StoredRecord::from_columns(id, created_at, &document)?.into_record();
            records.push(match projection {
                Projection::All => record,
                Projection::Fields(_) => record.project(projection),
            });
        }
        Ok(records)
    }
}

impl RecordStore for SqliteRecordStore {
    #[instrument(skip(self, records), fields(operation = "store.upsert", count = records.len()))]
    fn upsert(&self, collection: &str, records: &[Record]) -> Result<UpsertStats> {
        let start = Instant::now();
        let result = self.upsert_inner(collection, records);
        record_operation_metrics(BACKEND, "upsert", start, status_label(&result));
        if let Ok(stats) = &result {
            tracing::debug!(inserted = stats.inserted, replaced = stats.replaced, "Upserted records");
        }
        result
    }

    #[instrument(skip(self), fields(operation = "store.query_latest"))]
    fn query_latest(&self, collection: &str) -> Result<Option<Record>> {
        let start = Instant::now();
        let result = self.query_latest_inner(collection);
        record_operation_metrics(BACKEND, "query_latest", start, status_label(&result));
        result
    }

    #[instrument(skip(self, projection), fields(operation = "store.load_all"))]
    fn load_all(&self, collection: &str, projection: &Projection) -> Result<Vec<Record>> {
        let start = Instant::now();
        let result = self.load_all_inner(collection, projection);
        record_operation_metrics(BACKEND, "load_all", start, status_label(&result));
        result
    }

    fn count(&self, collection: &str) -> Result<usize> {
        let start = Instant::now();
        let result = {
            let conn = acquire_lock(&self.conn);
            conn.query_row(
                "SELECT COUNT(*) FROM records WHERE collection = ?1",
                params![collection],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| usize::try_from(n).unwrap_or(0))
            .map_err(|e| Error::OperationFailed {
                operation: "count_records".to_string(),
                cause: e.to_string(),
            })
        };
        record_operation_metrics(BACKEND, "count", start, status_label(&result));
        result
    }

    fn collections(&self) -> Result<Vec<String>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare("SELECT DISTINCT collection FROM records ORDER BY collection")
            .map_err(|e| load_error(&e))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| load_error(&e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| load_error(&e))?;
        Ok(names)
    }
}

fn upsert_error(collection: &str, key: &str, e: &rusqlite::Error) -> Error {
    Error::OperationFailed {
        operation: "upsert_record".to_string(),
        cause: format!("{collection}/{key}: {e}"),
    }
}

fn load_error(e: &rusqlite::Error) -> Error {
    Error::OperationFailed {
        operation: "load_records".to_string(),
        cause: e.to_string(),
    }
}
