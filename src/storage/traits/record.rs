//! Record store trait.

use crate::Result;
use crate::models::{Projection, Record};

/// Counts from one upsert batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertStats {
    /// Records whose identity was new to the collection.
    pub inserted: usize,
    /// Records that replaced a stored record with the same identity.
    pub replaced: usize,
}

impl UpsertStats {
    /// Total records written.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.inserted + self.replaced
    }
}

/// Durable per-entity record collections.
///
/// Collections are addressed by the entity's handle and created lazily by
/// their first write. Within a collection a record's identity is the replace
/// key, so writing the same record twice leaves one row with the latest
/// payload.
pub trait RecordStore: Send + Sync {
    /// Replaces each record with a matching identity, or inserts it.
    ///
    /// Records are applied one by one. A failure part-way leaves the earlier
    /// records written; re-running the batch is safe.
    fn upsert(&self, collection: &str, records: &[Record]) -> Result<UpsertStats>;

    /// Returns the record with the greatest `created_at`, if any.
    fn query_latest(&self, collection: &str) -> Result<Option<Record>>;

    /// Returns every record of the collection in storage order.
    fn load_all(&self, collection: &str, projection: &Projection) -> Result<Vec<Record>>;

    /// Returns the number of stored records.
    fn count(&self, collection: &str) -> Result<usize> {
        Ok(self.load_all(collection, &Projection::Fields(Vec::new()))?.len())
    }

    /// Lists collections that hold at least one record.
    fn collections(&self) -> Result<Vec<String>>;
}
