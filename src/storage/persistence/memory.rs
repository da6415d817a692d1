//! In-process record store.

use crate::models::{Projection, Record, StoredRecord};
use crate::storage::traits::{RecordStore, UpsertStats};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
struct Collection {
    rows: Vec<StoredRecord>,
    index: HashMap<String, usize>,
}

/// Record store held in memory, with the same semantics as the `SQLite` one.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryRecordStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error() -> Error {
    Error::OperationFailed {
        operation: "memory_store_lock".to_string(),
        cause: "lock poisoned".to_string(),
    }
}

impl RecordStore for MemoryRecordStore {
    fn upsert(&self, collection: &str, records: &[Record]) -> Result<UpsertStats> {
        let mut collections = self.collections.write().map_err(|_| lock_error())?;
        let target = collections.entry(collection.to_string()).or_default();
        let mut stats = UpsertStats::default();

        for record in records {
            let stored = StoredRecord::from(record);
            if let Some(&pos) = target.index.get(&stored.key) {
                target.rows[pos] = stored;
                stats.replaced += 1;
            } else {
                target.index.insert(stored.key.clone(), target.rows.len());
                target.rows.push(stored);
                stats.inserted += 1;
            }
        }
        Ok(stats)
    }

    fn query_latest(&self, collection: &str) -> Result<Option<Record>> {
        let collections = self.collections.read().map_err(|_| lock_error())?;
        // Ties go to the later row, matching the SQLite rowid tie-break.
        let latest = collections.get(collection).and_then(|c| {
            c.rows
                .iter()
                .enumerate()
                .max_by(|(ia, a), (ib, b)| a.created_at.cmp(&b.created_at).then(ia.cmp(ib)))
                .map(|(_, row)| row.clone().into_record())
        });
        Ok(latest)
    }

    fn load_all(&self, collection: &str, projection: &Projection) -> Result<Vec<Record>> {
        let collections = self.collections.read().map_err(|_| lock_error())?;
        Ok(collections
            .get(collection)
            .map(|c| {
                c.rows
                    .iter()
                    .map(|row| row.clone().into_record().project(projection))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().map_err(|_| lock_error())?;
        Ok(collections.get(collection).map_or(0, |c| c.rows.len()))
    }

    fn collections(&self) -> Result<Vec<String>> {
        let collections = self.collections.read().map_err(|_| lock_error())?;
        let mut names: Vec<_> = collections
            .iter()
            .filter(|(_, c)| !c.rows.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}
