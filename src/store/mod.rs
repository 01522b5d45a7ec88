// src/store/mod.rs

//! Embedded columnar store: one directory, one Parquet file per table, one
//! JSON sidecar per secondary index.
//!
//! Writes go to a hidden `.tmp` file in the same directory and are renamed over
//! the target, so readers only ever see a complete table. A `Warehouse` keeps
//! no file open between calls.

pub mod index;

pub use index::ColumnIndex;

use arrow::{compute::concat_batches, error::ArrowError, record_batch::RecordBatch};
use glob::{glob, Pattern};
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    basic::Compression,
    errors::ParquetError,
    file::{
        properties::WriterProperties,
        reader::{FileReader, SerializedFileReader},
    },
};
use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("arrow: {0}")]
    Arrow(#[from] ArrowError),
    #[error("parquet: {0}")]
    Parquet(#[from] ParquetError),
    #[error("index file {path:?}: {source}")]
    IndexFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("table `{0}` does not exist")]
    MissingTable(String),
    #[error("table `{table}` has no column `{column}`")]
    MissingColumn { table: String, column: String },
    #[error("invalid table or index name `{0}`")]
    InvalidName(String),
    #[error("warehouse root {0:?} is a file; expected a directory of tables")]
    NotADirectory(PathBuf),
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Names become file names; keep them to `[A-Za-z0-9_]`.
fn check_name(name: &str) -> Result<(), StoreError> {
    let ok = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidName(name.to_string()))
    }
}

pub struct Warehouse {
    root: PathBuf,
}

impl Warehouse {
    /// Open (creating if needed) the store at `root` and clear temp files an
    /// interrupted writer left behind. `root` is a directory; a single-file
    /// database at that path is refused.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        if root.exists() && !root.is_dir() {
            return Err(StoreError::NotADirectory(root));
        }
        fs::create_dir_all(&root).map_err(io_err(&root))?;
        let wh = Self { root };
        for stale in wh.matching(".*.tmp")? {
            warn!(path = %stale.display(), "removing stale temp file");
            fs::remove_file(&stale).map_err(io_err(&stale))?;
        }
        Ok(wh)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn matching(&self, file_pattern: &str) -> Result<Vec<PathBuf>, StoreError> {
        let pattern = format!(
            "{}/{}",
            Pattern::escape(&self.root.to_string_lossy()),
            file_pattern
        );
        let paths = glob(&pattern)
            .map_err(|e| StoreError::InvalidName(e.msg.to_string()))?
            .filter_map(|entry| match entry {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("cannot read glob entry: {:?}", e);
                    None
                }
            })
            .filter(|p| p.is_file())
            .collect();
        Ok(paths)
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.root.join(format!("{}.parquet", table))
    }

    fn index_path(&self, table: &str, index: &str) -> PathBuf {
        self.root.join(format!("{}.{}.idx.json", table, index))
    }

    pub fn table_exists(&self, table: &str) -> bool {
        check_name(table).is_ok() && self.table_path(table).is_file()
    }

    /// Table names, sorted.
    pub fn list_tables(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self
            .matching("*.parquet")?
            .iter()
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Atomically replace `table` with `batch`. Indexes on the old table are
    /// dropped once the new file is fully written. Returns the row count.
    #[instrument(level = "debug", skip(self, batch), fields(rows = batch.num_rows()))]
    pub fn replace_table(&self, table: &str, batch: &RecordBatch) -> Result<usize, StoreError> {
        check_name(table)?;
        let final_path = self.table_path(table);
        let tmp_path = self.root.join(format!(".{}.parquet.tmp", table));

        if let Err(e) = write_parquet(&tmp_path, batch) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        self.drop_indexes(table)?;
        fs::rename(&tmp_path, &final_path).map_err(io_err(&final_path))?;
        debug!(path = %final_path.display(), "table replaced");
        Ok(batch.num_rows())
    }

    /// Read the whole table as one batch, rows in stored order.
    pub fn read_table(&self, table: &str) -> Result<RecordBatch, StoreError> {
        check_name(table)?;
        let path = self.table_path(table);
        if !path.is_file() {
            return Err(StoreError::MissingTable(table.to_string()));
        }
        let file = File::open(&path).map_err(io_err(&path))?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        let schema = builder.schema().clone();
        let reader = builder.build()?;
        let batches = reader.collect::<Result<Vec<_>, ArrowError>>()?;
        Ok(concat_batches(&schema, &batches)?)
    }

    /// Row count from the Parquet footer, without reading column data.
    pub fn row_count(&self, table: &str) -> Result<usize, StoreError> {
        check_name(table)?;
        let path = self.table_path(table);
        if !path.is_file() {
            return Err(StoreError::MissingTable(table.to_string()));
        }
        let file = File::open(&path).map_err(io_err(&path))?;
        let reader = SerializedFileReader::new(file)?;
        Ok(reader.metadata().file_metadata().num_rows() as usize)
    }

    /// Persist `index` next to its table, replacing any index of the same name.
    pub fn create_index(&self, index: &ColumnIndex) -> Result<(), StoreError> {
        check_name(&index.table)?;
        check_name(&index.name)?;
        if !self.table_exists(&index.table) {
            return Err(StoreError::MissingTable(index.table.clone()));
        }
        let path = self.index_path(&index.table, &index.name);
        let tmp_path = self
            .root
            .join(format!(".{}.{}.idx.json.tmp", index.table, index.name));

        let file = File::create(&tmp_path).map_err(io_err(&tmp_path))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, index).map_err(|source| StoreError::IndexFormat {
            path: tmp_path.clone(),
            source,
        })?;
        writer.flush().map_err(io_err(&tmp_path))?;
        drop(writer);

        fs::rename(&tmp_path, &path).map_err(io_err(&path))?;
        debug!(path = %path.display(), keys = index.len(), "index written");
        Ok(())
    }

    pub fn read_index(&self, table: &str, name: &str) -> Result<Option<ColumnIndex>, StoreError> {
        check_name(table)?;
        check_name(name)?;
        let path = self.index_path(table, name);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(&path)(e)),
        };
        let index = serde_json::from_reader(io::BufReader::new(file))
            .map_err(|source| StoreError::IndexFormat { path, source })?;
        Ok(Some(index))
    }

    pub fn drop_index(&self, table: &str, name: &str) -> Result<bool, StoreError> {
        check_name(table)?;
        check_name(name)?;
        let path = self.index_path(table, name);
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(table, index = name, "dropped index");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(&path)(e)),
        }
    }

    fn drop_indexes(&self, table: &str) -> Result<(), StoreError> {
        for path in self.matching(&format!("{}.*.idx.json", table))? {
            fs::remove_file(&path).map_err(io_err(&path))?;
        }
        Ok(())
    }
}

fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<(), StoreError> {
    let file = File::create(path).map_err(io_err(path))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(BufWriter::new(file), batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use arrow::{
        array::{Int64Array, StringArray},
        datatypes::{DataType, Field, Schema},
    };
    use std::sync::Arc;
    use tempfile::tempdir;

    fn batch(ids: Vec<i64>, districts: Vec<&str>) -> Result<RecordBatch> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, true),
            Field::new("district", DataType::Utf8, true),
        ]));
        Ok(RecordBatch::try_new(
            schema,
            vec![
                Arc::new(Int64Array::from(ids)),
                Arc::new(StringArray::from(districts)),
            ],
        )?)
    }

    #[test]
    fn replace_then_read_preserves_rows_in_order() -> Result<()> {
        let dir = tempdir()?;
        let wh = Warehouse::open(dir.path())?;

        let first = batch(vec![3, 1, 2], vec!["a", "b", "c"])?;
        assert_eq!(wh.replace_table("incidents", &first)?, 3);
        assert_eq!(wh.read_table("incidents")?.columns(), first.columns());

        let second = batch(vec![9], vec!["z"])?;
        wh.replace_table("incidents", &second)?;
        assert_eq!(wh.row_count("incidents")?, 1);
        assert_eq!(wh.read_table("incidents")?.columns(), second.columns());
        assert_eq!(wh.list_tables()?, vec!["incidents".to_string()]);
        Ok(())
    }

    #[test]
    fn replacing_a_table_drops_its_indexes() -> Result<()> {
        let dir = tempdir()?;
        let wh = Warehouse::open(dir.path())?;
        let b = batch(vec![1, 2], vec!["a", "b"])?;
        wh.replace_table("incidents", &b)?;
        wh.create_index(&ColumnIndex::build("idx_d", "incidents", "district", &b)?)?;
        assert!(wh.read_index("incidents", "idx_d")?.is_some());

        wh.replace_table("incidents", &b)?;
        assert!(wh.read_index("incidents", "idx_d")?.is_none());
        Ok(())
    }

    #[test]
    fn index_on_a_missing_table_is_rejected() -> Result<()> {
        let dir = tempdir()?;
        let wh = Warehouse::open(dir.path())?;
        let b = batch(vec![1], vec!["a"])?;
        let index = ColumnIndex::build("idx_d", "ghost", "district", &b)?;
        assert!(matches!(
            wh.create_index(&index),
            Err(StoreError::MissingTable(_))
        ));
        Ok(())
    }

    #[test]
    fn missing_tables_are_reported() -> Result<()> {
        let dir = tempdir()?;
        let wh = Warehouse::open(dir.path())?;
        assert!(!wh.table_exists("incidents"));
        assert!(matches!(
            wh.read_table("incidents"),
            Err(StoreError::MissingTable(_))
        ));
        assert!(matches!(
            wh.row_count("incidents"),
            Err(StoreError::MissingTable(_))
        ));
        Ok(())
    }

    #[test]
    fn a_file_is_not_a_warehouse_root() -> Result<()> {
        let db = tempfile::NamedTempFile::new()?;
        match Warehouse::open(db.path()) {
            Err(StoreError::NotADirectory(path)) => assert_eq!(path, db.path()),
            Err(other) => panic!("expected NotADirectory, got {other}"),
            Ok(_) => panic!("expected NotADirectory, got a warehouse"),
        }
        Ok(())
    }

    #[test]
    fn open_clears_stale_temp_files_and_rejects_bad_names() -> Result<()> {
        let dir = tempdir()?;
        let stale = dir.path().join(".incidents.parquet.tmp");
        fs::write(&stale, b"half a table")?;

        let wh = Warehouse::open(dir.path())?;
        assert!(!stale.exists());
        assert!(matches!(
            wh.replace_table("../escape", &batch(vec![1], vec!["a"])?),
            Err(StoreError::InvalidName(_))
        ));
        Ok(())
    }
}
