//! # Timeline Harvest
//!
//! Incremental harvesting of paginated timeline APIs into durable storage,
//! and re-derivation of labeled, stratified datasets from the stored corpus.
//!
//! ## Features
//!
//! - Cursor-based resumable fetch per tracked entity
//! - Idempotent replace-or-insert storage keyed by record identity
//! - Corpus aggregation with per-entity thresholds and collision-free indices
//! - Seeded, optionally stratified train/validation splits
//! - JSON Lines and CSV dataset output
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use timeline_harvest::{HarvestConfig, HttpTimelineSource, Pipeline, SqliteRecordStore};
//!
//! let config = HarvestConfig::load_from_file("harvest.toml".as_ref())?;
//! let store = Arc::new(SqliteRecordStore::new(&config.store.path)?);
//! let source = Arc::new(HttpTimelineSource::new(&config.source));
//! let outcome = Pipeline::new(&config, source, store).run();
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod io;
pub mod models;
pub mod observability;
pub mod services;
pub mod source;
pub mod storage;

pub use config::{ExportConfig, HarvestConfig, SourceConfig, StoreConfig};
pub use models::{
    Corpus, CorpusEntry, Cursor, DatasetSplits, Projection, Record, RecordId, StoredRecord,
    UserInfo,
};
pub use services::{
    CorpusAggregator, CursorResolver, DatasetSplitter, Pipeline, PipelineOutcome, SyncReport,
    SyncService,
};
pub use source::{HttpTimelineSource, MemorySource, Paginator, TimelineSource};
pub use storage::{MemoryRecordStore, RecordStore, SqliteRecordStore};

/// Error type for harvest operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed configuration, bad CLI values, unparseable stored timestamps |
/// | `EntityNotFound` | The timeline source has no entity with the requested handle |
/// | `StratificationInfeasible` | A label class is too small to appear in every split |
/// | `OperationFailed` | Network, `SQLite` or filesystem failures (transient I/O) |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The source does not know the requested entity.
    ///
    /// Batch callers skip the entity and continue.
    #[error("entity '{entity}' not found")]
    EntityNotFound {
        /// Handle that was looked up.
        entity: String,
    },

    /// A label class has fewer members than the number of splits.
    #[error("cannot stratify label '{label}': {count} rows, at least {required} required")]
    StratificationInfeasible {
        /// The undersized label.
        label: String,
        /// Rows carrying the label.
        count: usize,
        /// Minimum rows needed.
        required: usize,
    },

    /// An operation failed.
    ///
    /// Raised when:
    /// - HTTP requests to the timeline source fail or return an error status
    /// - `SQLite` statements fail
    /// - Filesystem I/O errors occur during export
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Returns true for transient I/O failures a caller may retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::OperationFailed { .. })
    }
}

/// Result type alias for harvest operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("test error".to_string());
        assert_eq!(err.to_string(), "invalid input: test error");

        let err = Error::OperationFailed {
            operation: "test".to_string(),
            cause: "failed".to_string(),
        };
        assert_eq!(err.to_string(), "operation 'test' failed: failed");

        let err = Error::EntityNotFound {
            entity: "@sdfs".to_string(),
        };
        assert_eq!(err.to_string(), "entity '@sdfs' not found");

        let err = Error::StratificationInfeasible {
            label: "alice".to_string(),
            count: 1,
            required: 2,
        };
        assert!(err.to_string().contains("'alice'"));
    }

    #[test]
    fn test_is_transient() {
        let transient = Error::OperationFailed {
            operation: "fetch_page".to_string(),
            cause: "timeout".to_string(),
        };
        assert!(transient.is_transient());
        assert!(
            !Error::EntityNotFound {
                entity: "x".to_string()
            }
            .is_transient()
        );
        assert!(!Error::InvalidInput("x".to_string()).is_transient());
    }
}
