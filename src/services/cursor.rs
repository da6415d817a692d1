//! Cursor resolution.

use crate::Result;
use crate::models::Cursor;
use crate::storage::RecordStore;
use std::sync::Arc;
use tracing::instrument;

/// Derives where the next fetch for an entity starts.
pub struct CursorResolver {
    store: Arc<dyn RecordStore>,
}

impl CursorResolver {
    /// Creates a resolver over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Returns the newest stored `created_at` plus one second.
    ///
    /// `None` means the entity was never synced and the fetch should cover
    /// its full history.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails or the stored timestamp
    /// cannot be normalised.
    #[instrument(skip(self), fields(operation = "cursor.resolve"))]
    pub fn resolve(&self, entity: &str) -> Result<Option<Cursor>> {
        let Some(latest) = self.store.query_latest(entity)? else {
            tracing::debug!("No stored records, fetching full history");
            return Ok(None);
        };
        let cursor = Cursor::after(&latest.created_at)?;
        tracing::debug!(latest = %latest.created_at, cursor = %cursor, "Resolved cursor");
        Ok(Some(cursor))
    }
}
