//! Property-based tests for store and dataset invariants.
//!
//! - Upsert is idempotent
//! - Merging keeps each identity once, with the newest payload
//! - Splits partition the corpus
//! - Entity blocks never share indices

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use timeline_harvest::{
    Corpus, CorpusAggregator, CorpusEntry, DatasetSplitter, MemoryRecordStore, Projection, Record,
    RecordStore, SqliteRecordStore,
};

fn record_strategy() -> impl Strategy<Value = Record> {
    (0u32..40, 1u32..28, "[a-z ]{0,16}").prop_map(|(id, day, text)| {
        Record::new(id.to_string(), format!("2024-02-{day:02}T00:00:00.000Z")).with_text(text)
    })
}

proptest! {
    /// Property: writing a batch twice leaves the same state as once.
    #[test]
    fn prop_upsert_idempotent(batch in prop::collection::vec(record_strategy(), 0..30)) {
        let store = SqliteRecordStore::in_memory().unwrap();
        store.upsert("e", &batch).unwrap();
        let once = store.load_all("e", &Projection::All).unwrap();
        store.upsert("e", &batch).unwrap();
        let twice = store.load_all("e", &Projection::All).unwrap();
        prop_assert_eq!(once, twice);
    }

    /// Property: merged identities are unique and carry the latest payload.
    #[test]
    fn prop_merge_dedups(
        old in prop::collection::vec(record_strategy(), 0..20),
        new in prop::collection::vec(record_strategy(), 0..20),
    ) {
        let store = MemoryRecordStore::new();
        store.upsert("e", &old).unwrap();
        store.upsert("e", &new).unwrap();

        let mut expected: BTreeMap<String, Record> = BTreeMap::new();
        for record in old.iter().chain(&new) {
            expected.insert(record.id.to_string(), record.clone());
        }

        let stored = store.load_all("e", &Projection::All).unwrap();
        let ids: HashSet<_> = stored.iter().map(|r| r.id.to_string()).collect();
        prop_assert_eq!(ids.len(), stored.len());
        prop_assert_eq!(stored.len(), expected.len());
        for record in &stored {
            prop_assert_eq!(Some(record), expected.get(record.id.as_str()));
        }
    }

    /// Property: train and validation are disjoint, cover the corpus, and
    /// validation holds `ceil(n / 5)` rows whether or not labels are stratified.
    #[test]
    fn prop_split_partitions(
        sizes in prop::collection::vec(2usize..40, 1..5),
        seed in any::<u64>(),
        stratify in any::<bool>(),
    ) {
        let mut corpus = Corpus::new();
        for (rank, size) in (0u64..).zip(&sizes) {
            corpus.extend((0..*size as u64).map(|i| CorpusEntry {
                text: format!("{rank}-{i}"),
                label: format!("label{rank}"),
                idx: rank * 1_000_000 + i,
            }));
        }
        let n = corpus.len();
        let all: HashSet<u64> = corpus.entries().iter().map(|e| e.idx).collect();

        let splits = DatasetSplitter::new(seed).with_stratify(stratify).split(corpus).unwrap();
        let train: HashSet<u64> = splits.train.iter().map(|e| e.idx).collect();
        let validation: HashSet<u64> = splits.validation.iter().map(|e| e.idx).collect();

        prop_assert_eq!(splits.train.len() + splits.validation.len(), n);
        prop_assert_eq!(splits.validation.len(), n.div_ceil(5));
        prop_assert!(train.is_disjoint(&validation));
        prop_assert_eq!(&train | &validation, all);
    }

    /// Property: indices stay unique across entity blocks.
    #[test]
    fn prop_indices_unique(sizes in prop::collection::vec(0usize..50, 1..6)) {
        let store = Arc::new(MemoryRecordStore::new());
        let entities: Vec<String> = (0..sizes.len()).map(|i| format!("entity{i}")).collect();
        for (entity, size) in entities.iter().zip(&sizes) {
            let records: Vec<_> = (0..*size)
                .map(|i| Record::new(i.to_string(), "2024-01-01T00:00:00.000Z").with_text("t"))
                .collect();
            store.upsert(entity, &records).unwrap();
        }

        let corpus = CorpusAggregator::new(store).aggregate(&entities).unwrap();
        let idx: HashSet<u64> = corpus.entries().iter().map(|e| e.idx).collect();
        prop_assert_eq!(idx.len(), corpus.len());
        prop_assert_eq!(corpus.len(), sizes.iter().sum::<usize>());
    }
}
