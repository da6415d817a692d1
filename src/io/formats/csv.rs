//! CSV dataset sink.

use crate::io::traits::DatasetSink;
use crate::models::CorpusEntry;
use crate::{Error, Result};
use std::io::Write;

/// Writes rows as CSV with a `text,label,idx` header.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
    /// Whether headers have been written.
    headers_written: bool,
}

impl<W: Write> CsvSink<W> {
    /// Creates a new CSV sink.
    pub fn new(writer: W) -> Self {
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        Self {
            writer,
            headers_written: false,
        }
    }

    fn ensure_headers(&mut self) -> Result<()> {
        if !self.headers_written {
            self.writer
                .write_record(["text", "label", "idx"])
                .map_err(|e| Error::OperationFailed {
                    operation: "write_csv_headers".to_string(),
                    cause: e.to_string(),
                })?;
            self.headers_written = true;
        }
        Ok(())
    }
}

impl<W: Write> DatasetSink for CsvSink<W> {
    fn write(&mut self, entry: &CorpusEntry) -> Result<()> {
        self.ensure_headers()?;
        self.writer
            .write_record([&entry.text, &entry.label, &entry.idx.to_string()])
            .map_err(|e| Error::OperationFailed {
                operation: "write_csv".to_string(),
                cause: e.to_string(),
            })
    }

    fn finalize(mut self: Box<Self>) -> Result<()> {
        // An empty split still gets its header.
        self.ensure_headers()?;
        self.writer.flush().map_err(|e| Error::OperationFailed {
            operation: "flush_csv".to_string(),
            cause: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_csv_quotes_text() {
        let mut output = Vec::new();
        {
            let mut sink = CsvSink::new(&mut output);
            sink.write(&CorpusEntry {
                text: "one, two\nthree".to_string(),
                label: "bob".to_string(),
                idx: 4,
            })
            .unwrap();
            Box::new(sink).finalize().unwrap();
        }

        let output_str = String::from_utf8(output).unwrap();
        assert_eq!(output_str, "text,label,idx\n\"one, two\nthree\",bob,4\n");
    }

    #[test]
    fn test_empty_csv_has_header() {
        let mut output = Vec::new();
        Box::new(CsvSink::new(&mut output)).finalize().unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "text,label,idx\n");
    }
}
