// src/etl/extract.rs

use tracing::{info, instrument};

use super::open_warehouse;
use crate::{
    config::PipelineConfig,
    error::{PipelineError, Result, Stage},
    process::read_source,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractSummary {
    pub rows: usize,
    pub columns: usize,
}

/// Read the raw source and replace the staging table with it verbatim.
#[instrument(level = "info", skip_all, fields(table = %config.staging_table))]
pub fn extract_data(config: &PipelineConfig) -> Result<ExtractSummary> {
    let batch =
        read_source(&config.source_path).map_err(|e| PipelineError::SourceUnavailable {
            stage: Stage::Extract,
            path: config.source_path.clone(),
            source: e.into(),
        })?;

    let warehouse = open_warehouse(config, Stage::Extract)?;
    let storage_err = |e| PipelineError::storage(Stage::Extract, &config.staging_table, e);
    warehouse
        .replace_table(&config.staging_table, &batch)
        .map_err(storage_err)?;
    let rows = warehouse
        .row_count(&config.staging_table)
        .map_err(storage_err)?;

    info!(rows, "staging table loaded");
    Ok(ExtractSummary {
        rows,
        columns: batch.num_columns(),
    })
}
