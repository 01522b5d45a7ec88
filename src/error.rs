// src/error.rs

use arrow::error::ArrowError;
use std::{fmt, path::PathBuf};
use thiserror::Error;

use crate::schema::ValidationReport;
use crate::store::StoreError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Pipeline stage an error or state belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Validate,
    Extract,
    Transform,
    Load,
    Query,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::Extract => "extract",
            Stage::Transform => "transform",
            Stage::Load => "load",
            Stage::Query => "query",
        }
    }

    pub(crate) fn compute(self) -> impl FnOnce(ArrowError) -> PipelineError {
        move |source| PipelineError::Compute {
            stage: self,
            source,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every way a run can stop. Nothing here is retried or rolled back.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Only raised under the blocking validation policy.
    #[error("[{stage}] schema check failed: {report}")]
    SchemaMismatch {
        stage: Stage,
        report: ValidationReport,
    },

    #[error("[{stage}] source {path:?} unavailable: {source}")]
    SourceUnavailable {
        stage: Stage,
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("[{stage}] storage unavailable for `{target}`: {source}")]
    StorageUnavailable {
        stage: Stage,
        target: String,
        #[source]
        source: StoreError,
    },

    #[error("[{stage}] cannot parse {value:?} in column `{column}` at row {row} as a timestamp")]
    ParseError {
        stage: Stage,
        column: String,
        row: usize,
        value: String,
    },

    #[error("[{stage}] cannot derive `{derived}`: {reason}")]
    DerivationError {
        stage: Stage,
        derived: String,
        reason: String,
    },

    /// An Arrow kernel rejected the data (e.g. an unsupported column type).
    #[error("[{stage}] compute failure: {source}")]
    Compute {
        stage: Stage,
        #[source]
        source: ArrowError,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::SchemaMismatch { stage, .. }
            | PipelineError::SourceUnavailable { stage, .. }
            | PipelineError::StorageUnavailable { stage, .. }
            | PipelineError::ParseError { stage, .. }
            | PipelineError::DerivationError { stage, .. }
            | PipelineError::Compute { stage, .. } => *stage,
        }
    }

    pub(crate) fn storage(stage: Stage, target: impl Into<String>, source: StoreError) -> Self {
        PipelineError::StorageUnavailable {
            stage,
            target: target.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
