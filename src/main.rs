use anyhow::{Context, Result};
use fire_etl::{pipeline::PipelineRun, report, PipelineConfig};
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();
    info!("startup");

    // ─── 2) configuration ────────────────────────────────────────────
    let config = PipelineConfig::from_env().context("loading configuration")?;
    info!(
        source = %config.source_path.display(),
        warehouse = %config.warehouse_path.display(),
        policy = ?config.validation_policy,
        "configured"
    );

    // ─── 3) validate → extract → transform → load → query ────────────
    let start = Instant::now();
    let mut run = PipelineRun::new(&config);
    match run.execute() {
        Ok(outcome) => {
            report::print_run(&outcome);
            info!(elapsed = ?start.elapsed(), "run complete");
            Ok(())
        }
        Err(e) => {
            error!(state = %run.state(), "run aborted: {}", e);
            let stage = e.stage();
            Err(e).context(format!("pipeline failed during {}", stage))
        }
    }
}
