// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::schema::ExpectedSchema;

/// Environment variable naming an optional YAML config file.
pub const CONFIG_ENV: &str = "FIRE_ETL_CONFIG";

/// What a failing schema check does to the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    /// Report and continue.
    #[default]
    Advisory,
    /// Report and stop before extraction.
    Blocking,
}

/// Source column names the stages and queries read or write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub incident_date: String,
    pub district: String,
    pub battalion: String,
    pub alarm_time: String,
    pub arrival_time: String,
    /// Columns whose nulls are imputed with 0.
    pub loss_columns: Vec<String>,
    /// Derived first-of-month column added by the loader.
    pub incident_month: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            incident_date: "Incident Date".into(),
            district: "neighborhood_district".into(),
            battalion: "Battalion".into(),
            alarm_time: "Alarm DtTm".into(),
            arrival_time: "Arrival DtTm".into(),
            loss_columns: vec![
                "Estimated Property Loss".into(),
                "Estimated Contents Loss".into(),
            ],
            incident_month: "incident_month".into(),
        }
    }
}

/// Immutable run configuration, handed by reference to every stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub source_path: PathBuf,
    pub warehouse_path: PathBuf,
    pub staging_table: String,
    pub partitioned_table: String,
    pub district_index: String,
    pub columns: ColumnNames,
    pub expected_schema: ExpectedSchema,
    pub validation_policy: ValidationPolicy,
    /// Rows surfaced by the ranked queries.
    pub report_limit: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_path: PathBuf::from("./data/source/fire_incidents_20250520.csv"),
            warehouse_path: PathBuf::from("./data/dw/fire_incidents"),
            staging_table: "fire_incidents".into(),
            partitioned_table: "fire_incidents_partitioned".into(),
            district_index: "idx_fire_district".into(),
            columns: ColumnNames::default(),
            expected_schema: ExpectedSchema::default(),
            validation_policy: ValidationPolicy::default(),
            report_limit: 10,
        }
    }
}

impl PipelineConfig {
    /// Read a YAML config; keys it leaves out keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("reading config {:?}", path))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing config {:?}", path))
    }

    /// Load the file named by `FIRE_ETL_CONFIG`, or fall back to defaults.
    pub fn from_env() -> Result<Self> {
        match env::var_os(CONFIG_ENV) {
            Some(path) => {
                info!(path = ?path, "loading config");
                Self::load(path)
            }
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::LogicalType;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn partial_yaml_keeps_defaults() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(
            file,
            "source_path: /tmp/incidents.csv\nvalidation_policy: blocking\ncolumns:\n  district: district"
        )?;

        let cfg = PipelineConfig::load(file.path())?;
        assert_eq!(cfg.source_path, PathBuf::from("/tmp/incidents.csv"));
        assert_eq!(cfg.validation_policy, ValidationPolicy::Blocking);
        assert_eq!(cfg.columns.district, "district");
        assert_eq!(cfg.columns.incident_date, "Incident Date");
        assert_eq!(cfg.staging_table, "fire_incidents");
        assert_eq!(cfg.report_limit, 10);
        assert_eq!(cfg.expected_schema.len(), 7);
        Ok(())
    }

    #[test]
    fn expected_schema_reads_logical_type_names() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(
            file,
            "expected_schema:\n  Incident Number: INT\n  Estimated Property Loss: NUMERIC"
        )?;

        let cfg = PipelineConfig::load(file.path())?;
        assert_eq!(cfg.expected_schema.len(), 2);
        assert_eq!(
            cfg.expected_schema.get("Estimated Property Loss"),
            Some(LogicalType::Numeric)
        );
        Ok(())
    }
}
