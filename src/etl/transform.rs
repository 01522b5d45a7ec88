// src/etl/transform.rs

use arrow::{
    array::{Array, ArrayRef, Float64Array, Int64Array, Scalar, UInt32Array},
    compute::{cast, is_null, kernels::zip::zip, take_record_batch},
    datatypes::DataType,
    error::ArrowError,
    record_batch::RecordBatch,
    row::{RowConverter, SortField},
};
use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};
use tracing::{debug, info, instrument, warn};

use super::{open_warehouse, replace_column};
use crate::{
    config::{ColumnNames, PipelineConfig},
    error::{PipelineError, Result, Stage},
    process::convert::{to_canonical_timestamps, ConvertError},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformSummary {
    pub rows_in: usize,
    pub rows_out: usize,
    pub duplicates_removed: usize,
    /// Loss column → number of nulls replaced with 0.
    pub imputed: BTreeMap<String, usize>,
}

/// Clean the staging table in place: dedup, normalise the incident date,
/// impute zero losses.
#[instrument(level = "info", skip_all, fields(table = %config.staging_table))]
pub fn transform_data(config: &PipelineConfig) -> Result<TransformSummary> {
    let warehouse = open_warehouse(config, Stage::Transform)?;
    let storage_err = |e| PipelineError::storage(Stage::Transform, &config.staging_table, e);

    let staged = warehouse
        .read_table(&config.staging_table)
        .map_err(storage_err)?;
    let (cleaned, mut summary) = clean_batch(&staged, &config.columns)?;

    warehouse
        .replace_table(&config.staging_table, &cleaned)
        .map_err(storage_err)?;
    summary.rows_out = warehouse
        .row_count(&config.staging_table)
        .map_err(storage_err)?;

    info!(
        rows_in = summary.rows_in,
        rows_out = summary.rows_out,
        duplicates = summary.duplicates_removed,
        "staging table cleaned"
    );
    Ok(summary)
}

/// Apply the cleaning rules in order. Running it on its own output changes nothing.
pub fn clean_batch(
    batch: &RecordBatch,
    columns: &ColumnNames,
) -> Result<(RecordBatch, TransformSummary)> {
    let rows_in = batch.num_rows();

    let deduped = deduplicate(batch).map_err(Stage::Transform.compute())?;
    let duplicates_removed = rows_in - deduped.num_rows();
    if duplicates_removed > 0 {
        debug!(duplicates_removed, "dropped duplicate rows");
    }

    let dated = normalize_dates(&deduped, &columns.incident_date)?;
    let (imputed_batch, imputed) = impute_losses(&dated, &columns.loss_columns)?;

    let summary = TransformSummary {
        rows_in,
        rows_out: imputed_batch.num_rows(),
        duplicates_removed,
        imputed,
    };
    Ok((imputed_batch, summary))
}

/// Drop rows identical to an earlier row across every column; the first
/// occurrence keeps its position.
pub fn deduplicate(batch: &RecordBatch) -> std::result::Result<RecordBatch, ArrowError> {
    if batch.num_rows() < 2 || batch.num_columns() == 0 {
        return Ok(batch.clone());
    }

    let fields = batch
        .schema()
        .fields()
        .iter()
        .map(|f| SortField::new(f.data_type().clone()))
        .collect();
    let converter = RowConverter::new(fields)?;
    let rows = converter.convert_columns(batch.columns())?;

    let mut seen = HashSet::with_capacity(rows.num_rows());
    let keep: Vec<u32> = rows
        .iter()
        .enumerate()
        .filter(|(_, row)| seen.insert(*row))
        .map(|(i, _)| i as u32)
        .collect();

    if keep.len() == batch.num_rows() {
        return Ok(batch.clone());
    }
    take_record_batch(batch, &UInt32Array::from(keep))
}

fn normalize_dates(batch: &RecordBatch, column: &str) -> Result<RecordBatch> {
    let idx = batch
        .schema()
        .index_of(column)
        .map_err(|_| PipelineError::DerivationError {
            stage: Stage::Transform,
            derived: format!("canonical `{}`", column),
            reason: format!("column `{}` is absent from the staging table", column),
        })?;

    let canonical = to_canonical_timestamps(batch.column(idx)).map_err(|e| match e {
        ConvertError::Unparseable { row, value } => PipelineError::ParseError {
            stage: Stage::Transform,
            column: column.to_string(),
            row,
            value,
        },
        ConvertError::Arrow(source) => Stage::Transform.compute()(source),
    })?;

    replace_column(batch, idx, canonical).map_err(Stage::Transform.compute())
}

fn impute_losses(
    batch: &RecordBatch,
    loss_columns: &[String],
) -> Result<(RecordBatch, BTreeMap<String, usize>)> {
    let mut out = batch.clone();
    let mut imputed = BTreeMap::new();

    for column in loss_columns {
        let Ok(idx) = out.schema().index_of(column) else {
            warn!(column = %column, "loss column absent, nothing to impute");
            continue;
        };
        let arr = out.column(idx).clone();
        // NullArray carries no validity buffer, so null_count() reports 0 for it
        let nulls = if arr.data_type() == &DataType::Null {
            arr.len()
        } else {
            arr.null_count()
        };
        imputed.insert(column.clone(), nulls);
        if nulls == 0 {
            continue;
        }
        let filled = fill_zero(&arr).map_err(Stage::Transform.compute())?;
        out = replace_column(&out, idx, filled).map_err(Stage::Transform.compute())?;
    }

    Ok((out, imputed))
}

/// Replace nulls with 0 in the column's own type. An all-null column has no
/// type to keep and becomes Float64.
fn fill_zero(arr: &ArrayRef) -> std::result::Result<ArrayRef, ArrowError> {
    if arr.data_type() == &DataType::Null {
        return Ok(Arc::new(Float64Array::from(vec![0.0; arr.len()])));
    }
    let zero_i64: ArrayRef = Arc::new(Int64Array::from(vec![0]));
    let zero = Scalar::new(cast(&zero_i64, arr.data_type())?);
    zip(&is_null(arr.as_ref())?, &zero, arr)
}
