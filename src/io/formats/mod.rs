//! Format adapters for dataset output.

pub mod csv;
pub mod json;
#[cfg(feature = "parquet-export")]
pub mod parquet;

use crate::{Error, Result};
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use super::traits::DatasetSink;

/// Supported dataset file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// Newline-delimited JSON.
    #[default]
    Jsonl,
    /// CSV with a header row.
    Csv,
    /// Apache Parquet, Snappy compressed.
    #[cfg(feature = "parquet-export")]
    Parquet,
}

impl Format {
    /// Returns the file extension for this format.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Jsonl => "jsonl",
            Self::Csv => "csv",
            #[cfg(feature = "parquet-export")]
            Self::Parquet => "parquet",
        }
    }

    /// Detects format from file extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the extension is not recognized.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => ext.parse(),
            None => Err(Error::InvalidInput(
                "Cannot determine format: file has no extension".to_string(),
            )),
        }
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "jsonl" | "ndjson" | "json" => Ok(Self::Jsonl),
            "csv" => Ok(Self::Csv),
            #[cfg(feature = "parquet-export")]
            "parquet" | "pq" => Ok(Self::Parquet),
            _ => Err(Error::InvalidInput(format!("Unknown format: {s}"))),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Creates a dataset sink for the given format and writer.
pub fn create_dataset_sink<W: Write + Send + 'static>(
    writer: W,
    format: Format,
) -> Box<dyn DatasetSink> {
    match format {
        Format::Jsonl => Box::new(json::JsonlSink::new(writer)),
        Format::Csv => Box::new(csv::CsvSink::new(writer)),
        #[cfg(feature = "parquet-export")]
        Format::Parquet => Box::new(parquet::ParquetSink::new(writer)),
    }
}
