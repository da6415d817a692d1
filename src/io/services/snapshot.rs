//! Raw per-entity JSON snapshots.
//!
//! Each entity gets `{dir}/{handle}.json` holding its profile and every
//! record fetched so far. An existing snapshot is extended: records already
//! present keep their saved payload and only unseen identities are appended.

use crate::models::{Record, UserInfo};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// On-disk snapshot layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSnapshot {
    /// Profile at the time of the latest write.
    pub user: UserInfo,
    /// Records in first-seen order.
    pub records: Vec<Record>,
}

/// Writes raw snapshots below a directory.
#[derive(Debug, Clone)]
pub struct RawSnapshotWriter {
    dir: PathBuf,
}

impl RawSnapshotWriter {
    /// Creates a writer for `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the snapshot path of a handle.
    #[must_use]
    pub fn path_for(&self, handle: &str) -> PathBuf {
        self.dir.join(format!("{handle}.json"))
    }

    /// Reads an existing snapshot, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn read(&self, handle: &str) -> Result<Option<RawSnapshot>> {
        let path = self.path_for(handle);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| io_error("read_snapshot", &path, &e))?;
        let snapshot = serde_json::from_str(&contents).map_err(|e| Error::OperationFailed {
            operation: "parse_snapshot".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Ok(Some(snapshot))
    }

    /// Merges `records` into the entity's snapshot and rewrites it.
    ///
    /// Returns the number of records that were not in the snapshot before.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn write(&self, user: &UserInfo, records: &[Record]) -> Result<usize> {
        std::fs::create_dir_all(&self.dir).map_err(|e| io_error("create_snapshot_dir", &self.dir, &e))?;

        let handle = user.username.as_str();
        let mut merged = match self.read(handle)? {
            Some(existing) => {
                tracing::debug!(entity = %handle, "Extending existing snapshot");
                existing.records
            },
            None => Vec::new(),
        };

        let mut seen: HashSet<_> = merged.iter().map(|r| r.id.clone()).collect();
        let before = merged.len();
        merged.extend(
            records
                .iter()
                .filter(|record| seen.insert(record.id.clone()))
                .cloned(),
        );
        let added = merged.len() - before;

        let snapshot = RawSnapshot {
            user: user.clone(),
            records: merged,
        };
        let body = serde_json::to_string_pretty(&snapshot).map_err(|e| Error::OperationFailed {
            operation: "encode_snapshot".to_string(),
            cause: e.to_string(),
        })?;
        let path = self.path_for(handle);
        std::fs::write(&path, body).map_err(|e| io_error("write_snapshot", &path, &e))?;

        tracing::info!(entity = %handle, added, path = %path.display(), "Saved raw snapshot");
        Ok(added)
    }
}

fn io_error(operation: &str, path: &Path, e: &std::io::Error) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: format!("{}: {e}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_extends_without_replacing() {
        let dir = tempfile::tempdir().unwrap();
        let writer = RawSnapshotWriter::new(dir.path().join("raw"));
        let user = UserInfo::new("42", "alice");

        let first = vec![
            Record::new("1", "2024-01-01T00:00:00.000Z").with_text("old one"),
            Record::new("2", "2024-01-02T00:00:00.000Z").with_text("old two"),
        ];
        assert_eq!(writer.write(&user, &first).unwrap(), 2);

        let second = vec![
            Record::new("2", "2024-01-02T00:00:00.000Z").with_text("edited two"),
            Record::new("3", "2024-01-03T00:00:00.000Z").with_text("three"),
        ];
        assert_eq!(writer.write(&user, &second).unwrap(), 1);

        let snapshot = writer.read("alice").unwrap().unwrap();
        assert_eq!(snapshot.user, user);
        let ids: Vec<_> = snapshot.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(snapshot.records[1].text(), Some("old two"));
    }

    #[test]
    fn test_read_missing_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let writer = RawSnapshotWriter::new(dir.path());
        assert!(writer.read("nobody").unwrap().is_none());
    }
}
