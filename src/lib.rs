pub mod analysis;
pub mod config;
pub mod error;
pub mod etl;
pub mod pipeline;
pub mod process;
pub mod report;
pub mod schema;
pub mod store;

pub use config::PipelineConfig;
pub use error::{PipelineError, Stage};
pub use pipeline::{run, PipelineRun, RunReport, RunState};
