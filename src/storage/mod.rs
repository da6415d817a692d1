//! Storage layer.
//!
//! - **Traits**: [`RecordStore`], the per-entity merge-upsert contract
//! - **Persistence**: [`SqliteRecordStore`] (durable) and
//!   [`MemoryRecordStore`] (tests, dry runs)
//! - **`SQLite` helpers**: connection setup and operation metrics

// Dropping the connection guard a few statements early buys nothing.
#![allow(clippy::significant_drop_tightening)]

pub mod persistence;
pub mod sqlite;
pub mod traits;

pub use persistence::{MemoryRecordStore, SqliteRecordStore};
pub use traits::{RecordStore, UpsertStats};
