use anyhow::{Context, Result};
use fire_etl::{process::read_source, report, schema::validate_schema, PipelineConfig};
use std::{env, path::PathBuf, process::exit};
use tracing_subscriber::{fmt, EnvFilter};

/// Pre-load check: compare a CSV's inferred schema with the configured one.
/// Usage: schema_check [CSV_PATH]   (defaults to the configured source)
fn main() -> Result<()> {
    fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = PipelineConfig::from_env()?;
    let path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.source_path.clone());

    let batch = read_source(&path).with_context(|| format!("reading {}", path.display()))?;
    let result = validate_schema(&batch.schema(), &config.expected_schema);
    report::print_validation(&result);

    if !result.passed() {
        exit(1);
    }
    Ok(())
}
