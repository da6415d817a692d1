//! Output services.

pub mod export;
#[cfg(feature = "parquet-export")]
pub mod features;
pub mod snapshot;
