//! Core traits for dataset output.

use crate::Result;
use crate::models::CorpusEntry;

/// Sink for exported dataset rows.
///
/// # Lifecycle
///
/// 1. Create sink with output destination
/// 2. Call `write()` for each row
/// 3. Call `finalize()` to flush
pub trait DatasetSink {
    /// Writes a single row to the sink.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or I/O fails.
    fn write(&mut self, entry: &CorpusEntry) -> Result<()>;

    /// Finalizes the output, writing any footers and flushing buffers.
    ///
    /// # Errors
    ///
    /// Returns an error if I/O fails.
    fn finalize(self: Box<Self>) -> Result<()>;
}
