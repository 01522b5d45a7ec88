// src/pipeline.rs

use std::fmt;
use tracing::{error, info, instrument};

use crate::{
    analysis::{self, BattalionResponse, DistrictCount, MonthCount},
    config::PipelineConfig,
    error::{Result, Stage},
    etl::{self, ExtractSummary, LoadSummary, TransformSummary},
    schema::ValidationReport,
};

/// Where a run is. Any failure moves it to `Failed` and nothing runs after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Validating,
    Extracting,
    Transforming,
    Loading,
    Querying,
    Complete,
    Failed(Stage),
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => f.write_str("idle"),
            RunState::Validating => f.write_str("validating"),
            RunState::Extracting => f.write_str("extracting"),
            RunState::Transforming => f.write_str("transforming"),
            RunState::Loading => f.write_str("loading"),
            RunState::Querying => f.write_str("querying"),
            RunState::Complete => f.write_str("complete"),
            RunState::Failed(stage) => write!(f, "failed in {}", stage),
        }
    }
}

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub validation: ValidationReport,
    pub extract: ExtractSummary,
    pub transform: TransformSummary,
    pub load: LoadSummary,
    pub trends: Vec<MonthCount>,
    pub neighborhoods: Vec<DistrictCount>,
    pub response_times: Vec<BattalionResponse>,
}

/// One sequential pass over the stages against a single config.
pub struct PipelineRun<'a> {
    config: &'a PipelineConfig,
    state: RunState,
    history: Vec<RunState>,
}

impl<'a> PipelineRun<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self {
            config,
            state: RunState::Idle,
            history: vec![RunState::Idle],
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Every state visited so far, starting with `Idle`.
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    fn enter(&mut self, next: RunState) {
        info!(from = %self.state, to = %next, "run state");
        self.state = next;
        self.history.push(next);
    }

    fn step<T>(
        &mut self,
        state: RunState,
        f: impl FnOnce(&PipelineConfig) -> Result<T>,
    ) -> Result<T> {
        self.enter(state);
        f(self.config).map_err(|e| {
            error!(error = %e, "stage failed");
            self.enter(RunState::Failed(e.stage()));
            e
        })
    }

    /// Validate → extract → transform → load → query.
    ///
    /// Executing again starts a fresh pass from `Idle`; every stage replaces
    /// its table wholesale, so re-runs converge on the same result.
    #[instrument(level = "info", skip_all, fields(source = %self.config.source_path.display()))]
    pub fn execute(&mut self) -> Result<RunReport> {
        if self.state != RunState::Idle {
            self.state = RunState::Idle;
            self.history = vec![RunState::Idle];
        }

        let validation = self.step(RunState::Validating, etl::validate_source)?;
        let extract = self.step(RunState::Extracting, etl::extract_data)?;
        let transform = self.step(RunState::Transforming, etl::transform_data)?;
        let load = self.step(RunState::Loading, etl::load_data)?;
        let (trends, neighborhoods, response_times) =
            self.step(RunState::Querying, |config| {
                Ok((
                    analysis::incident_trends(config)?,
                    analysis::neighborhood_counts(config)?,
                    analysis::response_times(config)?,
                ))
            })?;
        self.enter(RunState::Complete);

        Ok(RunReport {
            validation,
            extract,
            transform,
            load,
            trends,
            neighborhoods,
            response_times,
        })
    }
}

/// Run the whole pipeline once.
pub fn run(config: &PipelineConfig) -> Result<RunReport> {
    PipelineRun::new(config).execute()
}
