//! JSON Lines dataset sink.

use crate::io::traits::DatasetSink;
use crate::models::CorpusEntry;
use crate::{Error, Result};
use std::io::Write;

/// Writes rows as newline-delimited JSON (`{"text":…,"label":…,"idx":…}`).
pub struct JsonlSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonlSink<W> {
    /// Creates a new JSON Lines sink.
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write> DatasetSink for JsonlSink<W> {
    fn write(&mut self, entry: &CorpusEntry) -> Result<()> {
        serde_json::to_writer(&mut self.writer, entry).map_err(|e| Error::OperationFailed {
            operation: "write_jsonl".to_string(),
            cause: e.to_string(),
        })?;
        writeln!(self.writer).map_err(|e| Error::OperationFailed {
            operation: "write_jsonl".to_string(),
            cause: e.to_string(),
        })?;
        Ok(())
    }

    fn finalize(mut self: Box<Self>) -> Result<()> {
        self.writer.flush().map_err(|e| Error::OperationFailed {
            operation: "flush_jsonl".to_string(),
            cause: e.to_string(),
        })
    }
}
