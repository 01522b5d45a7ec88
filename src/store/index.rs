// src/store/index.rs

use arrow::{
    array::{Array, StringArray},
    compute::cast,
    datatypes::DataType,
    record_batch::RecordBatch,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::StoreError;

/// Secondary index over one column of a table: value → row ids.
///
/// Null values are not indexed. `row_count` records the size of the table the
/// index was built over, so a reader can tell whether it still describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnIndex {
    pub name: String,
    pub table: String,
    pub column: String,
    pub row_count: usize,
    pub entries: BTreeMap<String, Vec<u32>>,
}

impl ColumnIndex {
    /// Build an index over `column` of `batch`.
    pub fn build(name: &str, table: &str, column: &str, batch: &RecordBatch) -> Result<Self, StoreError> {
        let idx = batch
            .schema()
            .index_of(column)
            .map_err(|_| StoreError::MissingColumn {
                table: table.to_string(),
                column: column.to_string(),
            })?;
        let keys = cast(batch.column(idx), &DataType::Utf8)?;
        let keys = keys
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| StoreError::MissingColumn {
                table: table.to_string(),
                column: column.to_string(),
            })?;

        let mut entries: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        for (row, key) in keys.iter().enumerate() {
            if let Some(key) = key {
                entries.entry(key.to_string()).or_default().push(row as u32);
            }
        }

        Ok(Self {
            name: name.to_string(),
            table: table.to_string(),
            column: column.to_string(),
            row_count: batch.num_rows(),
            entries,
        })
    }

    /// Number of indexed rows per key.
    pub fn key_counts(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(k, rows)| (k.as_str(), rows.len()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
