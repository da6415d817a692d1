//! Connection handling for `SQLite` backends.

use crate::{Error, Result};
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

/// Busy timeout applied to every connection, in milliseconds.
const BUSY_TIMEOUT_MS: &str = "5000";

/// Acquires a mutex, recovering the guard if a previous holder panicked.
///
/// A poisoned connection mutex only means a statement panicked mid-flight;
/// `SQLite` itself rolls back the unfinished statement.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        tracing::warn!("SQLite mutex was poisoned, recovering");
        metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
        poisoned.into_inner()
    })
}

/// Applies WAL journaling, NORMAL sync and a busy timeout.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if the busy timeout cannot be set.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    // journal_mode returns a row, and in-memory databases refuse WAL.
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    conn.pragma_update(None, "busy_timeout", BUSY_TIMEOUT_MS)
        .map_err(|e| Error::OperationFailed {
            operation: "configure_connection".to_string(),
            cause: e.to_string(),
        })
}
