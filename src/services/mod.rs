//! Business logic services.
//!
//! - [`CursorResolver`]: where the next fetch for an entity starts
//! - [`SyncService`]: incremental fetch and merge into the store
//! - [`CorpusAggregator`]: labeled corpus across entities
//! - [`DatasetSplitter`]: seeded, optionally stratified splits
//! - [`Pipeline`]: the full run, sync then export

mod corpus;
mod cursor;
mod pipeline;
mod split;
mod sync;

pub use corpus::{CorpusAggregator, INDEX_STRIDE};
pub use cursor::CursorResolver;
pub use pipeline::{CategoryExport, Pipeline, PipelineOutcome};
pub use split::DatasetSplitter;
pub use sync::{EntityOutcome, EntitySync, SyncReport, SyncService};
