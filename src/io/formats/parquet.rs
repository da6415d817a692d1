//! Apache Parquet dataset sink.
//!
//! Requires the `parquet-export` feature.

use crate::io::traits::DatasetSink;
use crate::models::CorpusEntry;
use crate::{Error, Result};
use arrow::array::{ArrayRef, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::io::Write;
use std::sync::Arc;

/// Buffers rows and writes them as one Snappy-compressed row group on
/// finalize.
///
/// An empty split still produces a valid file carrying the schema.
pub struct ParquetSink<W: Write + Send> {
    writer: W,
    rows: Vec<CorpusEntry>,
}

impl<W: Write + Send> ParquetSink<W> {
    /// Creates a new Parquet sink.
    pub const fn new(writer: W) -> Self {
        Self {
            writer,
            rows: Vec::new(),
        }
    }

    /// `text`, `label` and `idx`, all required.
    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("text", DataType::Utf8, false),
            Field::new("label", DataType::Utf8, false),
            Field::new("idx", DataType::UInt64, false),
        ])
    }

    fn to_record_batch(&self) -> Result<RecordBatch> {
        let texts: StringArray = self.rows.iter().map(|r| Some(r.text.as_str())).collect();
        let labels: StringArray = self.rows.iter().map(|r| Some(r.label.as_str())).collect();
        let idx: UInt64Array = self.rows.iter().map(|r| Some(r.idx)).collect();

        let columns: Vec<ArrayRef> = vec![Arc::new(texts), Arc::new(labels), Arc::new(idx)];
        RecordBatch::try_new(Arc::new(Self::schema()), columns)
            .map_err(|e| parquet_error("build_record_batch", e))
    }
}

impl<W: Write + Send> DatasetSink for ParquetSink<W> {
    fn write(&mut self, entry: &CorpusEntry) -> Result<()> {
        self.rows.push(entry.clone());
        Ok(())
    }

    fn finalize(self: Box<Self>) -> Result<()> {
        let batch = self.to_record_batch()?;
        let Self { writer, .. } = *self;
        write_batch(writer, &batch)
    }
}

/// Writes one batch as a complete Parquet file and flushes the writer.
pub(crate) fn write_batch<W: Write + Send>(writer: W, batch: &RecordBatch) -> Result<()> {
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut arrow_writer = ArrowWriter::try_new(writer, batch.schema(), Some(props))
        .map_err(|e| parquet_error("create_parquet_writer", e))?;
    arrow_writer
        .write(batch)
        .map_err(|e| parquet_error("write_parquet", e))?;
    let mut inner = arrow_writer
        .into_inner()
        .map_err(|e| parquet_error("close_parquet", e))?;
    inner.flush().map_err(|e| parquet_error("flush_parquet", e))
}

pub(crate) fn parquet_error(operation: &str, e: impl std::fmt::Display) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use std::fs::File;

    fn entry(idx: u64) -> CorpusEntry {
        CorpusEntry {
            text: format!("text {idx}"),
            label: "alice".to_string(),
            idx,
        }
    }

    fn encode(rows: &[CorpusEntry]) -> Vec<u8> {
        let mut output = Vec::new();
        let mut sink = Box::new(ParquetSink::new(&mut output));
        for row in rows {
            sink.write(row).unwrap();
        }
        sink.finalize().unwrap();
        output
    }

    fn reopen(data: &[u8]) -> (tempfile::TempDir, File) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("split.parquet");
        std::fs::write(&path, data).unwrap();
        let file = File::open(&path).unwrap();
        (dir, file)
    }

    #[test]
    fn test_parquet_magic_bytes() {
        let data = encode(&[entry(0), entry(1)]);
        assert_eq!(&data[0..4], b"PAR1");
        assert_eq!(&data[data.len() - 4..], b"PAR1");
    }

    #[test]
    fn test_parquet_rows_readable() {
        let (_dir, file) = reopen(&encode(&[entry(7), entry(1_000_003)]));
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let rows: usize = reader.map(|batch| batch.unwrap().num_rows()).sum();
        assert_eq!(rows, 2);
    }

    #[test]
    fn test_empty_split_still_has_schema() {
        let (_dir, file) = reopen(&encode(&[]));
        let builder = ParquetRecordBatchReaderBuilder::try_new(file).unwrap();
        assert_eq!(builder.schema().fields().len(), 3);
        assert!(builder.schema().field_with_name("idx").is_ok());
    }
}
