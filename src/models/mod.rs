//! Data models for harvested timelines and derived datasets.

mod corpus;
mod cursor;
mod entity;
mod record;

pub use corpus::{Corpus, CorpusEntry, DatasetSplits, SplitName};
pub use cursor::{Cursor, parse_timestamp};
pub use entity::UserInfo;
pub use record::{Projection, Record, RecordId, StoredRecord};
