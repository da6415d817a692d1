//! Corpus aggregation across entities.

use crate::Result;
use crate::models::{Corpus, CorpusEntry, Projection};
use crate::storage::RecordStore;
use std::sync::Arc;
use tracing::instrument;

/// Positional gap between consecutive entity blocks.
///
/// An entity with more rows than this would collide with the next block.
pub const INDEX_STRIDE: u64 = 1_000_000;

/// Builds one labeled corpus from many entities' stored records.
pub struct CorpusAggregator {
    store: Arc<dyn RecordStore>,
    min_records: Option<usize>,
}

impl CorpusAggregator {
    /// Creates an aggregator with no inclusion threshold.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            min_records: None,
        }
    }

    /// Drops entities with fewer than `min_records` rows.
    #[must_use]
    pub const fn with_min_records(mut self, min_records: Option<usize>) -> Self {
        self.min_records = min_records;
        self
    }

    /// Loads, labels and concatenates the entities' records.
    ///
    /// Blocks follow `entities` order; rows within a block keep store order.
    /// Each row's `idx` is `rank * INDEX_STRIDE + position`, where `rank` is
    /// the entity's position in `entities`. Records without a text payload
    /// are left out.
    ///
    /// # Errors
    ///
    /// Returns an error if a store load fails.
    #[instrument(skip(self, entities), fields(operation = "corpus.aggregate", entities = entities.len()))]
    pub fn aggregate(&self, entities: &[String]) -> Result<Corpus> {
        let projection = Projection::text_only();
        let mut corpus = Corpus::new();

        for (rank, entity) in (0_u64..).zip(entities) {
            let records = self.store.load_all(entity, &projection)?;
            let texts: Vec<String> = records
                .into_iter()
                .filter_map(|record| record.text().map(str::to_string))
                .collect();

            if let Some(min) = self.min_records
                && texts.len() < min
            {
                tracing::info!(entity = %entity, rows = texts.len(), min, "Entity below threshold, excluded");
                continue;
            }
            if texts.len() as u64 > INDEX_STRIDE {
                tracing::warn!(entity = %entity, rows = texts.len(), "Entity block exceeds index stride");
            }

            let base = rank * INDEX_STRIDE;
            corpus.extend((0_u64..).zip(texts).map(|(position, text)| CorpusEntry {
                text,
                label: entity.clone(),
                idx: base + position,
            }));
        }

        tracing::debug!(rows = corpus.len(), "Aggregated corpus");
        Ok(corpus)
    }
}
