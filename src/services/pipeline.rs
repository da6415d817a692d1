//! End-to-end harvest pipeline.
//!
//! A run walks `LOOKUP -> RESOLVE_CURSOR -> FETCH -> UPSERT` for every
//! configured entity, then `AGGREGATE -> SPLIT -> WRITE` for every category. When the
//! sync phase upserted nothing the export phase is skipped entirely.

use crate::config::HarvestConfig;
#[cfg(feature = "parquet-export")]
use crate::io::FeatureDataset;
use crate::io::{ExportResult, RawSnapshotWriter, SplitExporter};
use crate::services::{CorpusAggregator, DatasetSplitter, SyncReport, SyncService};
use crate::source::TimelineSource;
use crate::storage::RecordStore;
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;

/// Export result of one category.
#[derive(Debug)]
pub struct CategoryExport {
    /// Category name.
    pub category: String,
    /// Written files, or why this category was not exported.
    pub result: Result<ExportResult>,
}

/// Terminal state of a pipeline run.
#[derive(Debug)]
pub enum PipelineOutcome {
    /// New records were stored and every category went through export.
    Done {
        /// Sync phase report.
        sync: SyncReport,
        /// One entry per category.
        exports: Vec<CategoryExport>,
    },
    /// No entity produced new records; nothing was exported.
    DoneEmpty {
        /// Sync phase report.
        sync: SyncReport,
    },
}

impl PipelineOutcome {
    /// Returns the sync report.
    #[must_use]
    pub const fn sync(&self) -> &SyncReport {
        match self {
            Self::Done { sync, .. } | Self::DoneEmpty { sync } => sync,
        }
    }

    /// Returns true for [`PipelineOutcome::DoneEmpty`].
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::DoneEmpty { .. })
    }
}

/// Wires sync, aggregation, splitting and export from one configuration.
pub struct Pipeline {
    categories: BTreeMap<String, Vec<String>>,
    entities: Vec<String>,
    sync: SyncService,
    aggregator: CorpusAggregator,
    splitter: DatasetSplitter,
    exporter: SplitExporter,
    #[cfg(feature = "parquet-export")]
    features: FeatureDataset,
}

impl Pipeline {
    /// Builds a pipeline over `source` and `store`.
    #[must_use]
    pub fn new(
        config: &HarvestConfig,
        source: Arc<dyn TimelineSource>,
        store: Arc<dyn RecordStore>,
    ) -> Self {
        let mut sync = SyncService::new(source, Arc::clone(&store))
            .with_max_results(config.source.max_results);
        if let Some(dir) = &config.export.raw_snapshot_dir {
            sync = sync.with_snapshots(RawSnapshotWriter::new(dir));
        }

        Self {
            categories: config.categories.clone(),
            entities: config.all_entities(),
            sync,
            aggregator: CorpusAggregator::new(store).with_min_records(config.export.min_records),
            splitter: DatasetSplitter::new(config.export.seed)
                .with_validation_ratio(config.export.validation_ratio)
                .with_stratify(config.export.stratify),
            exporter: SplitExporter::new(&config.export.output_dir, config.export.format),
            #[cfg(feature = "parquet-export")]
            features: FeatureDataset::new(&config.export.feature_dir),
        }
    }

    /// Runs sync and, when it stored anything, export for every category.
    #[instrument(skip(self), fields(operation = "pipeline.run"))]
    pub fn run(&self) -> PipelineOutcome {
        let sync = self.sync.sync_all(&self.entities);
        if !sync.has_new_records() {
            tracing::info!("No new records, skipping export");
            return PipelineOutcome::DoneEmpty { sync };
        }

        let exports = self
            .categories
            .iter()
            .map(|(category, entities)| self.export_category(category, entities))
            .collect();
        PipelineOutcome::Done { sync, exports }
    }

    /// Runs the sync phase only.
    ///
    /// `entities` takes precedence over `category`; with neither, every
    /// configured entity is synced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unknown category.
    pub fn sync(&self, category: Option<&str>, entities: &[String]) -> Result<SyncReport> {
        let targets = if !entities.is_empty() {
            entities.to_vec()
        } else if let Some(category) = category {
            self.category_entities(category)?.to_vec()
        } else {
            self.entities.clone()
        };
        Ok(self.sync.sync_all(&targets))
    }

    /// Runs the export phase over whatever the store holds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unknown category. Failures of
    /// individual categories are reported in their [`CategoryExport`].
    pub fn export(&self, category: Option<&str>) -> Result<Vec<CategoryExport>> {
        match category {
            Some(category) => {
                let entities = self.category_entities(category)?;
                Ok(vec![self.export_category(category, entities)])
            },
            None => Ok(self
                .categories
                .iter()
                .map(|(category, entities)| self.export_category(category, entities))
                .collect()),
        }
    }

    /// Aggregates one category and saves it to the feature dataset,
    /// replacing the partitions of its labels.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unknown category, or any
    /// aggregation or write failure.
    #[cfg(feature = "parquet-export")]
    #[instrument(skip(self), fields(operation = "pipeline.save_features"))]
    pub fn save_features(&self, category: &str) -> Result<Vec<std::path::PathBuf>> {
        let corpus = self.aggregator.aggregate(self.category_entities(category)?)?;
        self.features.save(&corpus)
    }

    #[instrument(skip(self, entities), fields(operation = "pipeline.export_category"))]
    fn export_category(&self, category: &str, entities: &[String]) -> CategoryExport {
        let result = self
            .aggregator
            .aggregate(entities)
            .and_then(|corpus| self.splitter.split(corpus))
            .and_then(|splits| self.exporter.export(category, &splits));

        if let Err(e) = &result {
            tracing::error!(error = %e, "Category export failed");
        }
        CategoryExport {
            category: category.to_string(),
            result,
        }
    }

    fn category_entities(&self, category: &str) -> Result<&[String]> {
        self.categories
            .get(category)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::InvalidInput(format!("unknown category '{category}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Record, UserInfo};
    use crate::source::MemorySource;
    use crate::storage::MemoryRecordStore;

    fn records(prefix: &str, n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                Record::new(format!("{prefix}{i}"), format!("2024-01-01T00:{:02}:00.000Z", i % 60))
                    .with_text(format!("{prefix} text {i}"))
            })
            .collect()
    }

    fn config(dir: &std::path::Path) -> HarvestConfig {
        HarvestConfig::new()
            .with_output_dir(dir)
            .with_category("en", ["alice", "bob"])
            .with_category("de", ["carl"])
    }

    #[test]
    fn test_run_exports_every_category() {
        let dir = tempfile::tempdir().unwrap();
        let source = MemorySource::new()
            .with_user(UserInfo::new("1", "alice"), records("a", 10))
            .with_user(UserInfo::new("2", "bob"), records("b", 5))
            .with_user(UserInfo::new("3", "carl"), records("c", 4));
        let pipeline = Pipeline::new(
            &config(dir.path()),
            Arc::new(source),
            Arc::new(MemoryRecordStore::new()),
        );

        let outcome = pipeline.run();
        let PipelineOutcome::Done { sync, exports } = outcome else {
            panic!("expected a completed export");
        };
        assert_eq!(sync.upserted(), 19);
        assert_eq!(exports.len(), 2);
        for export in &exports {
            let result = export.result.as_ref().unwrap();
            assert!(result.paths.iter().all(|p| p.exists()));
        }
    }

    #[test]
    fn test_second_run_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = MemorySource::new()
            .with_user(UserInfo::new("1", "alice"), records("a", 10))
            .with_user(UserInfo::new("2", "bob"), records("b", 5))
            .with_user(UserInfo::new("3", "carl"), records("c", 4));
        let pipeline = Pipeline::new(
            &config(dir.path()),
            Arc::new(source),
            Arc::new(MemoryRecordStore::new()),
        );

        assert!(!pipeline.run().is_empty());
        let second = pipeline.run();
        assert!(second.is_empty());
        assert_eq!(second.sync().fetched(), 0);
    }

    #[test]
    fn test_category_failure_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let source = MemorySource::new()
            .with_user(UserInfo::new("1", "alice"), records("a", 10))
            .with_user(UserInfo::new("2", "bob"), records("b", 1))
            .with_user(UserInfo::new("3", "carl"), records("c", 4));
        let pipeline = Pipeline::new(
            &config(dir.path()),
            Arc::new(source),
            Arc::new(MemoryRecordStore::new()),
        );

        let PipelineOutcome::Done { exports, .. } = pipeline.run() else {
            panic!("expected a completed export");
        };
        let by_name: BTreeMap<_, _> = exports.iter().map(|e| (e.category.as_str(), &e.result)).collect();
        assert!(matches!(by_name["en"], Err(Error::StratificationInfeasible { .. })));
        assert!(by_name["de"].is_ok());
    }

    #[test]
    fn test_unknown_category_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(
            &config(dir.path()),
            Arc::new(MemorySource::new()),
            Arc::new(MemoryRecordStore::new()),
        );
        assert!(matches!(pipeline.export(Some("fr")), Err(Error::InvalidInput(_))));
        assert!(matches!(pipeline.sync(Some("fr"), &[]), Err(Error::InvalidInput(_))));
    }

    #[cfg(feature = "parquet-export")]
    #[test]
    fn test_save_features_partitions_category() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.export.feature_dir = dir.path().join("feature");
        let source = MemorySource::new()
            .with_user(UserInfo::new("1", "alice"), records("a", 4))
            .with_user(UserInfo::new("2", "bob"), records("b", 3));
        let pipeline = Pipeline::new(&config, Arc::new(source), Arc::new(MemoryRecordStore::new()));
        pipeline.sync(Some("en"), &[]).unwrap();

        let written = pipeline.save_features("en").unwrap();
        assert_eq!(written.len(), 2);

        let bob = FeatureDataset::new(&config.export.feature_dir)
            .load(Some("bob"))
            .unwrap();
        assert_eq!(bob.len(), 3);
        assert!(bob.entries().iter().all(|e| e.idx >= 1_000_000));
    }
}
