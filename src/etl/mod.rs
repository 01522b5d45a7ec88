// src/etl/mod.rs

//! The four pipeline stages. Each opens its own warehouse handle, fully
//! materialises its output, and drops the handle on every exit path.

pub mod extract;
pub mod load;
pub mod transform;
pub mod validate;

pub use extract::{extract_data, ExtractSummary};
pub use load::{add_incident_month, load_data, IndexStatus, LoadSummary};
pub use transform::{clean_batch, deduplicate, transform_data, TransformSummary};
pub use validate::validate_source;

use arrow::{
    array::ArrayRef,
    datatypes::{Field, Schema},
    error::ArrowError,
    record_batch::RecordBatch,
};
use std::sync::Arc;

use crate::{
    config::PipelineConfig,
    error::{PipelineError, Result, Stage},
    store::Warehouse,
};

pub(crate) fn open_warehouse(config: &PipelineConfig, stage: Stage) -> Result<Warehouse> {
    Warehouse::open(&config.warehouse_path).map_err(|e| {
        PipelineError::storage(stage, config.warehouse_path.display().to_string(), e)
    })
}

/// Swap column `idx` for `array`, retyping its field to match.
pub(crate) fn replace_column(
    batch: &RecordBatch,
    idx: usize,
    array: ArrayRef,
) -> std::result::Result<RecordBatch, ArrowError> {
    let schema = batch.schema();
    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    fields[idx] = fields[idx].clone().with_data_type(array.data_type().clone());
    let mut columns = batch.columns().to_vec();
    columns[idx] = array;
    RecordBatch::try_new(
        Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone())),
        columns,
    )
}
