// src/etl/load.rs

use arrow::{
    array::{Array, ArrayRef, TimestampMicrosecondArray},
    datatypes::{Field, Schema, TimestampMicrosecondType},
    record_batch::RecordBatch,
};
use std::{fmt, sync::Arc};
use tracing::{info, instrument, warn};

use super::{open_warehouse, replace_column};
use crate::{
    config::{ColumnNames, PipelineConfig},
    error::{PipelineError, Result, Stage},
    process::{
        convert::{canonical_timestamp_type, is_canonical_timestamp},
        date_parser::month_start_micros,
    },
    store::{ColumnIndex, Warehouse},
};

/// Whether the district index exists after a load. A missing index slows
/// grouped reads but never changes their results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexStatus {
    Built { keys: usize },
    Missing { reason: String },
}

impl fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexStatus::Built { keys } => write!(f, "built ({} keys)", keys),
            IndexStatus::Missing { reason } => write!(f, "missing ({})", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub rows: usize,
    pub index: IndexStatus,
}

/// Derive `incident_month`, replace the partitioned table, then index districts.
#[instrument(level = "info", skip_all, fields(table = %config.partitioned_table))]
pub fn load_data(config: &PipelineConfig) -> Result<LoadSummary> {
    let warehouse = open_warehouse(config, Stage::Load)?;

    let cleaned = warehouse
        .read_table(&config.staging_table)
        .map_err(|e| PipelineError::storage(Stage::Load, &config.staging_table, e))?;
    let partitioned = add_incident_month(&cleaned, &config.columns)?;

    let rows = warehouse
        .replace_table(&config.partitioned_table, &partitioned)
        .map_err(|e| PipelineError::storage(Stage::Load, &config.partitioned_table, e))?;

    let index = build_district_index(&warehouse, config, &partitioned);
    info!(rows, index = %index, "partitioned table loaded");
    Ok(LoadSummary { rows, index })
}

/// Append (or recompute) the first-of-month column from the canonical incident date.
pub fn add_incident_month(batch: &RecordBatch, columns: &ColumnNames) -> Result<RecordBatch> {
    let derivation = |reason: String| PipelineError::DerivationError {
        stage: Stage::Load,
        derived: columns.incident_month.clone(),
        reason,
    };

    let schema = batch.schema();
    let idx = schema.index_of(&columns.incident_date).map_err(|_| {
        derivation(format!(
            "column `{}` is absent from the cleaned table",
            columns.incident_date
        ))
    })?;
    let dates = batch.column(idx);
    let dates = dates
        .as_any()
        .downcast_ref::<TimestampMicrosecondArray>()
        .filter(|_| is_canonical_timestamp(dates.data_type()))
        .ok_or_else(|| {
            derivation(format!(
                "column `{}` is {} rather than a canonical timestamp; has the transform stage run?",
                columns.incident_date,
                dates.data_type()
            ))
        })?;

    let months: ArrayRef = Arc::new(dates.unary_opt::<_, TimestampMicrosecondType>(month_start_micros));
    if months.null_count() > dates.null_count() {
        return Err(derivation("incident date outside the representable range".into()));
    }

    match schema.index_of(&columns.incident_month) {
        Ok(existing) => replace_column(batch, existing, months).map_err(Stage::Load.compute()),
        Err(_) => {
            let mut fields: Vec<Field> =
                schema.fields().iter().map(|f| f.as_ref().clone()).collect();
            fields.push(Field::new(
                &columns.incident_month,
                canonical_timestamp_type(),
                true,
            ));
            let mut cols = batch.columns().to_vec();
            cols.push(months);
            RecordBatch::try_new(
                Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone())),
                cols,
            )
            .map_err(Stage::Load.compute())
        }
    }
}

fn build_district_index(
    warehouse: &Warehouse,
    config: &PipelineConfig,
    partitioned: &RecordBatch,
) -> IndexStatus {
    let built = ColumnIndex::build(
        &config.district_index,
        &config.partitioned_table,
        &config.columns.district,
        partitioned,
    )
    .and_then(|index| warehouse.create_index(&index).map(|_| index.len()));

    match built {
        Ok(keys) => IndexStatus::Built { keys },
        Err(e) => {
            warn!(index = %config.district_index, error = %e, "district index not built");
            IndexStatus::Missing {
                reason: e.to_string(),
            }
        }
    }
}
