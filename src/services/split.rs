//! Reproducible train/validation splitting.
//!
//! The same corpus, seed and settings always give the same partition.

use crate::models::{Corpus, CorpusEntry, DatasetSplits};
use crate::{Error, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use tracing::instrument;

/// Smallest class that can appear in both splits.
const MIN_CLASS_SIZE: usize = 2;

/// Partitions a corpus into train and validation rows.
#[derive(Debug, Clone)]
pub struct DatasetSplitter {
    seed: u64,
    validation_ratio: f64,
    stratify: bool,
}

impl Default for DatasetSplitter {
    fn default() -> Self {
        Self {
            seed: 42,
            validation_ratio: 0.2,
            stratify: true,
        }
    }
}

impl DatasetSplitter {
    /// Creates a stratified 80/20 splitter with the given seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Sets the validation fraction.
    #[must_use]
    pub const fn with_validation_ratio(mut self, ratio: f64) -> Self {
        self.validation_ratio = ratio;
        self
    }

    /// Enables or disables label stratification.
    #[must_use]
    pub const fn with_stratify(mut self, stratify: bool) -> Self {
        self.stratify = stratify;
        self
    }

    /// Splits `corpus`.
    ///
    /// Every row lands in exactly one split and validation holds
    /// `ceil(n * ratio)` rows. With stratification that total is shared out
    /// across labels by largest remainder, and every label keeps at least one
    /// training row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StratificationInfeasible`] when stratifying and a
    /// label has fewer than two rows, or [`Error::InvalidInput`] for a ratio
    /// outside `(0, 1)`.
    #[instrument(skip(self, corpus), fields(operation = "split", rows = corpus.len()))]
    pub fn split(&self, corpus: Corpus) -> Result<DatasetSplits> {
        if !(self.validation_ratio > 0.0 && self.validation_ratio < 1.0) {
            return Err(Error::InvalidInput(format!(
                "validation ratio must be within (0, 1), got {}",
                self.validation_ratio
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let splits = if self.stratify {
            self.split_stratified(corpus, &mut rng)?
        } else {
            let mut rows = corpus.into_entries();
            rows.shuffle(&mut rng);
            let take = validation_count(rows.len(), self.validation_ratio);
            let (train, validation) = cut(rows, take);
            DatasetSplits { train, validation }
        };

        tracing::debug!(
            train = splits.train.len(),
            validation = splits.validation.len(),
            stratified = self.stratify,
            "Split corpus"
        );
        Ok(splits)
    }

    fn split_stratified(&self, corpus: Corpus, rng: &mut StdRng) -> Result<DatasetSplits> {
        let mut classes: BTreeMap<String, Vec<CorpusEntry>> = BTreeMap::new();
        for entry in corpus.into_entries() {
            classes.entry(entry.label.clone()).or_default().push(entry);
        }

        if let Some((label, rows)) = classes.iter().find(|(_, rows)| rows.len() < MIN_CLASS_SIZE) {
            return Err(Error::StratificationInfeasible {
                label: label.clone(),
                count: rows.len(),
                required: MIN_CLASS_SIZE,
            });
        }

        let sizes: Vec<usize> = classes.values().map(Vec::len).collect();
        let total = sizes.iter().sum();
        let quotas = allocate(&sizes, validation_count(total, self.validation_ratio));

        let mut splits = DatasetSplits::default();
        for (mut rows, take) in classes.into_values().zip(quotas) {
            rows.shuffle(rng);
            let (train, validation) = cut(rows, take);
            splits.train.extend(train);
            splits.validation.extend(validation);
        }
        splits.train.shuffle(rng);
        splits.validation.shuffle(rng);
        Ok(splits)
    }
}

/// Splits already shuffled rows, `take` validation rows from the front.
fn cut(mut rows: Vec<CorpusEntry>, take: usize) -> (Vec<CorpusEntry>, Vec<CorpusEntry>) {
    let train = rows.split_off(take.min(rows.len()));
    (train, rows)
}

/// Shares `n_val` validation rows across classes of the given sizes.
///
/// Each class gets the floor of its proportional share; the rows left over go
/// to the largest remainders, ties broken by class order. No class gives up
/// its last row.
fn allocate(sizes: &[usize], n_val: usize) -> Vec<usize> {
    let total: usize = sizes.iter().sum();
    if total == 0 {
        return vec![0; sizes.len()];
    }

    let mut quotas: Vec<usize> = sizes.iter().map(|size| size * n_val / total).collect();
    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(sizes[i] * n_val % total));

    let mut leftover = n_val.saturating_sub(quotas.iter().sum());
    while leftover > 0 {
        let mut placed = false;
        for &i in &order {
            if leftover == 0 {
                break;
            }
            if quotas[i] + 1 < sizes[i] {
                quotas[i] += 1;
                leftover -= 1;
                placed = true;
            }
        }
        if !placed {
            break;
        }
    }
    quotas
}

/// `ceil(n * ratio)`, leaving at least one training row when `n > 0`.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn validation_count(n: usize, ratio: f64) -> usize {
    let wanted = (n as f64 * ratio).ceil() as usize;
    wanted.min(n.saturating_sub(1))
}
