//! Dataset and snapshot output.
//!
//! # Architecture
//!
//! - **Format adapters** implement [`DatasetSink`] for one file format
//! - **Services** decide file layout and drive the sinks
//!
//! # Supported Formats
//!
//! | Format | Extension | Notes |
//! |--------|-----------|-------|
//! | JSON Lines | `.jsonl` | One `{text, label, idx}` object per line |
//! | CSV | `.csv` | Header row `text,label,idx` |
//! | Parquet | `.parquet` | Requires the `parquet-export` feature |

pub mod formats;
pub mod services;
pub mod traits;

pub use formats::{Format, create_dataset_sink};
pub use services::export::{ExportResult, SplitExporter};
#[cfg(feature = "parquet-export")]
pub use services::features::FeatureDataset;
pub use services::snapshot::{RawSnapshot, RawSnapshotWriter};
pub use traits::DatasetSink;
