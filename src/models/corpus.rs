//! Labeled corpus and dataset split types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One labeled row derived from a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusEntry {
    /// Record text.
    pub text: String,
    /// Owning entity's handle.
    pub label: String,
    /// Collision-free position across the concatenated corpus.
    pub idx: u64,
}

/// Concatenated labeled table built from many entities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    entries: Vec<CorpusEntry>,
}

impl Corpus {
    /// Creates an empty corpus.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Appends one entity block.
    pub fn extend(&mut self, block: impl IntoIterator<Item = CorpusEntry>) {
        self.entries.extend(block);
    }

    /// Returns the rows in concatenation order.
    #[must_use]
    pub fn entries(&self) -> &[CorpusEntry] {
        &self.entries
    }

    /// Consumes the corpus, returning its rows.
    #[must_use]
    pub fn into_entries(self) -> Vec<CorpusEntry> {
        self.entries
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the corpus has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Row count per label.
    #[must_use]
    pub fn label_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.label.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

impl From<Vec<CorpusEntry>> for Corpus {
    fn from(entries: Vec<CorpusEntry>) -> Self {
        Self { entries }
    }
}

/// Output split names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SplitName {
    /// Training rows.
    Train,
    /// Validation rows.
    Validation,
}

impl SplitName {
    /// Returns the file stem used on disk.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Validation => "validation",
        }
    }
}

impl fmt::Display for SplitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Train/validation partition of a corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetSplits {
    /// Training rows.
    pub train: Vec<CorpusEntry>,
    /// Validation rows.
    pub validation: Vec<CorpusEntry>,
}

impl DatasetSplits {
    /// Returns the rows of one split.
    #[must_use]
    pub fn get(&self, split: SplitName) -> &[CorpusEntry] {
        match split {
            SplitName::Train => &self.train,
            SplitName::Validation => &self.validation,
        }
    }

    /// Total rows across both splits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.train.len() + self.validation.len()
    }

    /// Returns true when both splits are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.train.is_empty() && self.validation.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(label: &str, idx: u64) -> CorpusEntry {
        CorpusEntry {
            text: format!("{label}-{idx}"),
            label: label.to_string(),
            idx,
        }
    }

    #[test]
    fn test_label_counts() {
        let mut corpus = Corpus::new();
        corpus.extend(vec![entry("a", 0), entry("a", 1)]);
        corpus.extend(vec![entry("b", 1_000_000)]);

        let counts = corpus.label_counts();
        assert_eq!(counts.get("a"), Some(&2));
        assert_eq!(counts.get("b"), Some(&1));
        assert_eq!(corpus.len(), 3);
    }

    #[test]
    fn test_split_name_display() {
        assert_eq!(SplitName::Train.to_string(), "train");
        assert_eq!(SplitName::Validation.as_str(), "validation");
    }
}
