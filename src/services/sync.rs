//! Incremental timeline synchronization.
//!
//! Each entity runs `lookup -> resolve cursor -> fetch -> snapshot -> upsert`
//! to completion before the next one starts. Failures are recorded per entity and never abort the
//! batch.

use crate::io::RawSnapshotWriter;
use crate::models::{Cursor, Record};
use crate::services::CursorResolver;
use crate::source::TimelineSource;
use crate::storage::{RecordStore, UpsertStats};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// What happened to one entity during a sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityOutcome {
    /// Records were fetched (possibly none) and persisted.
    Synced {
        /// Start bound used for the fetch.
        cursor: Option<Cursor>,
        /// Records returned by the source.
        fetched: usize,
        /// Store write counts.
        stats: UpsertStats,
    },
    /// The source does not know the entity.
    Skipped,
    /// Cursor resolution, fetch or upsert failed.
    Failed {
        /// Error message.
        error: String,
    },
}

/// Per-entity entry of a [`SyncReport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySync {
    /// Entity handle.
    pub entity: String,
    /// Outcome.
    pub outcome: EntityOutcome,
}

/// Result of syncing a batch of entities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Outcomes in processing order.
    pub entities: Vec<EntitySync>,
}

impl SyncReport {
    fn synced(&self) -> impl Iterator<Item = (usize, UpsertStats)> + '_ {
        self.entities.iter().filter_map(|e| match e.outcome {
            EntityOutcome::Synced { fetched, stats, .. } => Some((fetched, stats)),
            _ => None,
        })
    }

    /// Records fetched across all entities.
    #[must_use]
    pub fn fetched(&self) -> usize {
        self.synced().map(|(fetched, _)| fetched).sum()
    }

    /// Records written (inserted or replaced) across all entities.
    #[must_use]
    pub fn upserted(&self) -> usize {
        self.synced().map(|(_, stats)| stats.total()).sum()
    }

    /// Records whose identity was new to the store.
    #[must_use]
    pub fn inserted(&self) -> usize {
        self.synced().map(|(_, stats)| stats.inserted).sum()
    }

    /// Entities the source did not know.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count_where(|o| matches!(o, EntityOutcome::Skipped))
    }

    /// Entities whose sync failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count_where(|o| matches!(o, EntityOutcome::Failed { .. }))
    }

    /// Returns true when at least one record was upserted.
    #[must_use]
    pub fn has_new_records(&self) -> bool {
        self.upserted() > 0
    }

    fn count_where(&self, predicate: impl Fn(&EntityOutcome) -> bool) -> usize {
        self.entities.iter().filter(|e| predicate(&e.outcome)).count()
    }
}

/// Pulls new records from a source into the store.
pub struct SyncService {
    source: Arc<dyn TimelineSource>,
    store: Arc<dyn RecordStore>,
    resolver: CursorResolver,
    max_results: Option<usize>,
    snapshots: Option<RawSnapshotWriter>,
}

impl SyncService {
    /// Creates a sync service with unbounded fetches and no snapshots.
    #[must_use]
    pub fn new(source: Arc<dyn TimelineSource>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            source,
            resolver: CursorResolver::new(Arc::clone(&store)),
            store,
            max_results: None,
            snapshots: None,
        }
    }

    /// Caps the records fetched per entity and run.
    #[must_use]
    pub const fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    /// Also writes raw per-entity snapshots.
    #[must_use]
    pub fn with_snapshots(mut self, writer: RawSnapshotWriter) -> Self {
        self.snapshots = Some(writer);
        self
    }

    /// Syncs one entity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntityNotFound`] if the source does not know the
    /// handle, or any cursor, fetch, snapshot or upsert failure. The snapshot
    /// is written before the store, so a snapshot failure leaves the store
    /// and the cursor untouched and the next run fetches the same records.
    #[instrument(skip(self), fields(operation = "sync.entity"))]
    pub fn sync_entity(&self, entity: &str) -> Result<EntityOutcome> {
        let user = self.source.get_user(entity)?;
        let cursor = self.resolver.resolve(entity)?;

        let records = self
            .source
            .paginate_timeline(&user.id, cursor.as_ref(), self.max_results)
            .collect::<Result<Vec<Record>>>()?;
        metrics::counter!("harvest_records_fetched_total").increment(records.len() as u64);

        if records.is_empty() {
            tracing::info!(
                entity,
                cursor = cursor.as_ref().map_or("none", Cursor::as_str),
                "No new records"
            );
            return Ok(EntityOutcome::Synced {
                cursor,
                fetched: 0,
                stats: UpsertStats::default(),
            });
        }

        if let Some(writer) = &self.snapshots {
            writer.write(&user, &records)?;
        }
        let stats = self.store.upsert(entity, &records)?;

        tracing::info!(
            entity,
            cursor = cursor.as_ref().map_or("none", Cursor::as_str),
            fetched = records.len(),
            inserted = stats.inserted,
            replaced = stats.replaced,
            "Synced entity"
        );
        Ok(EntityOutcome::Synced {
            cursor,
            fetched: records.len(),
            stats,
        })
    }

    /// Syncs entities one after another.
    ///
    /// Unknown entities are skipped and failures are reported; neither stops
    /// the remaining entities.
    #[instrument(skip(self, entities), fields(operation = "sync.batch", count = entities.len()))]
    pub fn sync_all(&self, entities: &[String]) -> SyncReport {
        let mut report = SyncReport::default();

        for entity in entities {
            let start = Instant::now();
            let outcome = match self.sync_entity(entity) {
                Ok(outcome) => outcome,
                Err(Error::EntityNotFound { .. }) => {
                    tracing::warn!(entity = %entity, "Entity not found at source, skipping");
                    EntityOutcome::Skipped
                },
                Err(e) => {
                    tracing::error!(entity = %entity, error = %e, transient = e.is_transient(), "Entity sync failed");
                    EntityOutcome::Failed {
                        error: e.to_string(),
                    }
                },
            };

            let status = match outcome {
                EntityOutcome::Synced { .. } => "success",
                EntityOutcome::Skipped => "skipped",
                EntityOutcome::Failed { .. } => "error",
            };
            metrics::counter!("harvest_sync_total", "status" => status).increment(1);
            metrics::histogram!("harvest_sync_duration_ms")
                .record(start.elapsed().as_secs_f64() * 1000.0);

            report.entities.push(EntitySync {
                entity: entity.clone(),
                outcome,
            });
        }

        tracing::info!(
            entities = report.entities.len(),
            fetched = report.fetched(),
            upserted = report.upserted(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Sync batch complete"
        );
        report
    }
}
