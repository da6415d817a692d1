//! Dataset split export service.
//!
//! Writes each split of a category to `{output_dir}/{category}/{split}.{ext}`.
//! Export is not incremental: existing files are truncated.

use crate::io::formats::{Format, create_dataset_sink};
use crate::models::{DatasetSplits, SplitName};
use crate::{Error, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Result of an export operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResult {
    /// Category (language) that was exported.
    pub category: String,
    /// Rows written to the train file.
    pub train_rows: usize,
    /// Rows written to the validation file.
    pub validation_rows: usize,
    /// Files written, train first.
    pub paths: Vec<PathBuf>,
}

impl ExportResult {
    /// Total rows written.
    #[must_use]
    pub const fn total_rows(&self) -> usize {
        self.train_rows + self.validation_rows
    }
}

/// Writes train/validation splits to disk.
#[derive(Debug, Clone)]
pub struct SplitExporter {
    output_dir: PathBuf,
    format: Format,
}

impl SplitExporter {
    /// Creates an exporter rooted at `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>, format: Format) -> Self {
        Self {
            output_dir: output_dir.into(),
            format,
        }
    }

    /// Returns the file a split of `category` is written to.
    #[must_use]
    pub fn split_path(&self, category: &str, split: SplitName) -> PathBuf {
        self.output_dir
            .join(category)
            .join(format!("{}.{}", split.as_str(), self.format.extension()))
    }

    /// Writes both splits of one category.
    ///
    /// # Errors
    ///
    /// Returns an error if the category name is unsafe as a path component,
    /// or if directories or files cannot be written.
    #[instrument(skip(self, splits), fields(operation = "export.write"))]
    pub fn export(&self, category: &str, splits: &DatasetSplits) -> Result<ExportResult> {
        validate_component("category", category)?;

        let dir = self.output_dir.join(category);
        std::fs::create_dir_all(&dir).map_err(|e| Error::OperationFailed {
            operation: "create_export_dir".to_string(),
            cause: format!("{}: {e}", dir.display()),
        })?;

        let mut paths = Vec::with_capacity(2);
        for split in [SplitName::Train, SplitName::Validation] {
            let path = self.split_path(category, split);
            self.write_split(&path, splits, split)?;
            paths.push(path);
        }

        metrics::counter!("harvest_export_rows_total", "split" => "train")
            .increment(splits.train.len() as u64);
        metrics::counter!("harvest_export_rows_total", "split" => "validation")
            .increment(splits.validation.len() as u64);
        tracing::info!(
            train = splits.train.len(),
            validation = splits.validation.len(),
            dir = %dir.display(),
            "Wrote dataset splits"
        );

        Ok(ExportResult {
            category: category.to_string(),
            train_rows: splits.train.len(),
            validation_rows: splits.validation.len(),
            paths,
        })
    }

    fn write_split(&self, path: &Path, splits: &DatasetSplits, split: SplitName) -> Result<()> {
        let file = File::create(path).map_err(|e| Error::OperationFailed {
            operation: "create_export_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        let mut sink = create_dataset_sink(BufWriter::new(file), self.format);
        for entry in splits.get(split) {
            sink.write(entry)?;
        }
        sink.finalize()
    }
}

/// Rejects names that would escape the output directory.
pub(crate) fn validate_component(kind: &str, name: &str) -> Result<()> {
    let unsafe_name = name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']);
    if unsafe_name {
        return Err(Error::InvalidInput(format!(
            "{kind} '{name}' is not a valid directory name"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CorpusEntry;

    fn splits() -> DatasetSplits {
        let row = |label: &str, idx: u64| CorpusEntry {
            text: format!("text {idx}"),
            label: label.to_string(),
            idx,
        };
        DatasetSplits {
            train: vec![row("a", 0), row("b", 1_000_000), row("a", 1)],
            validation: vec![row("b", 1_000_001)],
        }
    }

    #[test]
    fn test_export_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested").join("out");
        let exporter = SplitExporter::new(&root, Format::Jsonl);

        let result = exporter.export("en", &splits()).unwrap();
        assert_eq!(result.train_rows, 3);
        assert_eq!(result.validation_rows, 1);
        assert_eq!(result.total_rows(), 4);

        let train = std::fs::read_to_string(root.join("en").join("train.jsonl")).unwrap();
        assert_eq!(train.lines().count(), 3);
        let first: CorpusEntry = serde_json::from_str(train.lines().next().unwrap()).unwrap();
        assert_eq!(first.idx, 0);

        let validation =
            std::fs::read_to_string(root.join("en").join("validation.jsonl")).unwrap();
        assert!(validation.contains("\"idx\":1000001"));
    }

    #[test]
    fn test_export_overwrites_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = SplitExporter::new(dir.path(), Format::Csv);

        exporter.export("de", &splits()).unwrap();
        let smaller = DatasetSplits {
            train: splits().train[..1].to_vec(),
            validation: Vec::new(),
        };
        exporter.export("de", &smaller).unwrap();

        let train = std::fs::read_to_string(exporter.split_path("de", SplitName::Train)).unwrap();
        assert_eq!(train.lines().count(), 2);
        let validation =
            std::fs::read_to_string(exporter.split_path("de", SplitName::Validation)).unwrap();
        assert_eq!(validation, "text,label,idx\n");
    }

    #[test]
    fn test_export_rejects_path_like_category() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = SplitExporter::new(dir.path(), Format::Jsonl);
        assert!(matches!(
            exporter.export("../escape", &splits()),
            Err(Error::InvalidInput(_))
        ));
    }
}
