// src/process/mod.rs
pub mod convert;
pub mod date_parser;
pub mod utils;

use anyhow::{Context, Result};
use arrow::{
    compute::concat_batches,
    csv::{reader::Format, ReaderBuilder},
    record_batch::RecordBatch,
};
use std::{
    fs::File,
    io::{BufReader, Seek, SeekFrom},
    path::Path,
    sync::Arc,
};
use tracing::{debug, instrument};

const READ_BATCH_ROWS: usize = 8192;

/// Read a headered, comma-delimited source file fully into one batch.
///
/// Column types are inferred from every row: integers → Int64, decimals →
/// Float64, ISO dates → Date32/Timestamp, all-empty → Null, else Utf8.
/// Rows keep their file order. A row shorter than the header is padded with
/// nulls for its missing trailing fields.
#[instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn read_source<P: AsRef<Path>>(path: P) -> Result<RecordBatch> {
    let path = path.as_ref();
    let mut file =
        File::open(path).with_context(|| format!("Failed to open source file: {:?}", path))?;

    let format = Format::default()
        .with_header(true)
        .with_quote(b'"')
        .with_truncated_rows(true);
    let (schema, scanned) = format
        .infer_schema(BufReader::new(&mut file), None)
        .with_context(|| format!("Failed to infer schema of {:?}", path))?;
    debug!(scanned, columns = schema.fields().len(), "inferred source schema");

    file.seek(SeekFrom::Start(0))
        .with_context(|| format!("Failed to rewind {:?}", path))?;

    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(schema.clone())
        .with_format(format)
        .with_batch_size(READ_BATCH_ROWS)
        .build(BufReader::new(file))
        .context("creating CSV reader")?;

    let mut batches = Vec::new();
    for (idx, batch) in reader.enumerate() {
        batches.push(batch.with_context(|| format!("CSV parse error in {:?} at batch {}", path, idx))?);
    }
    concat_batches(&schema, &batches).context("concatenating source batches")
}
