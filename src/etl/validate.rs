// src/etl/validate.rs

use tracing::{info, instrument, warn};

use crate::{
    config::{PipelineConfig, ValidationPolicy},
    error::{PipelineError, Result, Stage},
    process::read_source,
    schema::{validate_schema, ValidationReport},
};

/// Read the raw source and check it against the expected schema.
///
/// A failing check is returned as a report under the advisory policy and as
/// `SchemaMismatch` under the blocking one.
#[instrument(level = "info", skip_all, fields(source = %config.source_path.display()))]
pub fn validate_source(config: &PipelineConfig) -> Result<ValidationReport> {
    let batch =
        read_source(&config.source_path).map_err(|e| PipelineError::SourceUnavailable {
            stage: Stage::Validate,
            path: config.source_path.clone(),
            source: e.into(),
        })?;

    let report = validate_schema(&batch.schema(), &config.expected_schema);
    if report.passed() {
        info!("schema validation passed");
        return Ok(report);
    }

    warn!(
        missing = report.missing.len(),
        extra = report.extra.len(),
        mismatched = report.mismatches.len(),
        policy = ?config.validation_policy,
        "schema validation failed: {}",
        report
    );
    match config.validation_policy {
        ValidationPolicy::Advisory => Ok(report),
        ValidationPolicy::Blocking => Err(PipelineError::SchemaMismatch {
            stage: Stage::Validate,
            report,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::tests::{init_test_logging, write_csv};
    use anyhow::Result;

    const HEADER: &str =
        "Incident Number,Incident Date,Address,City,zipcode,Battalion,Primary Situation";

    #[test]
    fn matching_source_passes() -> Result<()> {
        init_test_logging();
        let csv = write_csv(&format!(
            "{HEADER}\n1,2018-06-05T10:00:00,1 Main St,SF,94103a,B01,fire\n"
        ))?;
        let config = PipelineConfig {
            source_path: csv.path().to_path_buf(),
            ..PipelineConfig::default()
        };
        assert!(validate_source(&config)?.passed());
        Ok(())
    }

    #[test]
    fn advisory_policy_reports_and_blocking_policy_stops() -> Result<()> {
        init_test_logging();
        let csv = write_csv(
            "Incident Number,Incident Date,Address,City,zipcode,Primary Situation\n\
             1,2018-06-05T10:00:00,1 Main St,SF,94103,fire\n",
        )?;
        let mut config = PipelineConfig {
            source_path: csv.path().to_path_buf(),
            ..PipelineConfig::default()
        };

        let report = validate_source(&config)?;
        assert!(report.missing.contains("Battalion"));
        assert_eq!(
            report.mismatches.get("zipcode").map(String::as_str),
            Some("Int64")
        );

        config.validation_policy = ValidationPolicy::Blocking;
        match validate_source(&config) {
            Err(PipelineError::SchemaMismatch { stage, report }) => {
                assert_eq!(stage, Stage::Validate);
                assert!(report.missing.contains("Battalion"));
            }
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn unreadable_source_names_the_stage_and_path() {
        let config = PipelineConfig {
            source_path: "/no/such/incidents.csv".into(),
            ..PipelineConfig::default()
        };
        let err = validate_source(&config).unwrap_err();
        assert_eq!(err.stage(), Stage::Validate);
        assert!(err.to_string().contains("/no/such/incidents.csv"));
    }
}
