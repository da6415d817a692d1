//! Label-partitioned Parquet feature dataset.
//!
//! Layout is `{root}/label={label}/part-0.parquet` with `text` and `idx`
//! columns; the label lives in the directory name. Saving replaces the
//! partitions of the labels being written and leaves every other partition
//! in place.

use crate::io::formats::parquet::{parquet_error, write_batch};
use crate::io::services::export::validate_component;
use crate::models::{Corpus, CorpusEntry};
use crate::{Error, Result};
use arrow::array::{Array, ArrayRef, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::instrument;

const PARTITION_PREFIX: &str = "label=";
const PART_FILE: &str = "part-0.parquet";

/// Reads and writes the feature dataset under one root directory.
#[derive(Debug, Clone)]
pub struct FeatureDataset {
    root: PathBuf,
}

impl FeatureDataset {
    /// Creates a dataset rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the partition directory of a label.
    #[must_use]
    pub fn partition_dir(&self, label: &str) -> PathBuf {
        self.root.join(format!("{PARTITION_PREFIX}{label}"))
    }

    /// Writes one partition per label found in `corpus`.
    ///
    /// Returns the written files in label order.
    ///
    /// # Errors
    ///
    /// Returns an error if a label is unsafe as a path component, or if a
    /// partition cannot be replaced.
    #[instrument(skip(self, corpus), fields(operation = "features.save", rows = corpus.len()))]
    pub fn save(&self, corpus: &Corpus) -> Result<Vec<PathBuf>> {
        let mut partitions: BTreeMap<&str, Vec<&CorpusEntry>> = BTreeMap::new();
        for entry in corpus.entries() {
            partitions.entry(entry.label.as_str()).or_default().push(entry);
        }

        for label in partitions.keys() {
            validate_component("label", label)?;
        }

        let mut written = Vec::with_capacity(partitions.len());
        for (label, rows) in partitions {
            let dir = self.partition_dir(label);
            if dir.exists() {
                std::fs::remove_dir_all(&dir).map_err(|e| io_error("remove_partition", &dir, &e))?;
            }
            std::fs::create_dir_all(&dir).map_err(|e| io_error("create_partition", &dir, &e))?;

            let path = dir.join(PART_FILE);
            let file = File::create(&path).map_err(|e| io_error("create_partition_file", &path, &e))?;
            write_batch(BufWriter::new(file), &partition_batch(&rows)?)?;
            tracing::debug!(label, rows = rows.len(), "Wrote feature partition");
            written.push(path);
        }

        metrics::counter!("harvest_feature_partitions_total").increment(written.len() as u64);
        tracing::info!(partitions = written.len(), root = %self.root.display(), "Saved feature dataset");
        Ok(written)
    }

    /// Loads every partition, or only the one for `label`.
    ///
    /// Partitions are read in label order. A missing partition for `label`
    /// yields an empty corpus.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be listed or a file is not a
    /// readable feature partition.
    #[instrument(skip(self), fields(operation = "features.load"))]
    pub fn load(&self, label: Option<&str>) -> Result<Corpus> {
        let mut corpus = Corpus::new();
        for (partition, dir) in self.partitions()? {
            if label.is_some_and(|wanted| wanted != partition) {
                continue;
            }
            for path in parquet_files(&dir)? {
                corpus.extend(read_partition_file(&path, &partition)?);
            }
        }
        Ok(corpus)
    }

    fn partitions(&self) -> Result<Vec<(String, PathBuf)>> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| io_error("read_feature_dir", &self.root, &e))?;
        let mut partitions = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| io_error("read_feature_dir", &self.root, &e))?.path();
            let label = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_prefix(PARTITION_PREFIX))
                .map(str::to_string);
            if let Some(label) = label
                && path.is_dir()
            {
                partitions.push((label, path));
            }
        }
        partitions.sort();
        Ok(partitions)
    }
}

fn partition_batch(rows: &[&CorpusEntry]) -> Result<RecordBatch> {
    let schema = Schema::new(vec![
        Field::new("text", DataType::Utf8, false),
        Field::new("idx", DataType::UInt64, false),
    ]);
    let texts: StringArray = rows.iter().map(|r| Some(r.text.as_str())).collect();
    let idx: UInt64Array = rows.iter().map(|r| Some(r.idx)).collect();
    let columns: Vec<ArrayRef> = vec![Arc::new(texts), Arc::new(idx)];
    RecordBatch::try_new(Arc::new(schema), columns).map_err(|e| parquet_error("build_record_batch", e))
}

fn parquet_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| io_error("read_partition", dir, &e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "parquet"))
        .collect();
    files.sort();
    Ok(files)
}

fn read_partition_file(path: &Path, label: &str) -> Result<Vec<CorpusEntry>> {
    let file = File::open(path).map_err(|e| io_error("open_partition_file", path, &e))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .and_then(|builder| builder.build())
        .map_err(|e| parquet_error("read_parquet", e))?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| parquet_error("read_parquet", e))?;
        let texts = column::<StringArray>(&batch, "text", path)?;
        let idx = column::<UInt64Array>(&batch, "idx", path)?;
        rows.extend((0..batch.num_rows()).map(|i| CorpusEntry {
            text: texts.value(i).to_string(),
            label: label.to_string(),
            idx: idx.value(i),
        }));
    }
    Ok(rows)
}

fn column<'b, T: Array + 'static>(batch: &'b RecordBatch, name: &str, path: &Path) -> Result<&'b T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| Error::OperationFailed {
            operation: "read_parquet".to_string(),
            cause: format!("{}: missing or mistyped column '{name}'", path.display()),
        })
}

fn io_error(operation: &str, path: &Path, e: &std::io::Error) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: format!("{}: {e}", path.display()),
    }
}
