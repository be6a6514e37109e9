//! Error types for pipeline orchestration.
//!
//! The taxonomy separates configuration errors (reported before any
//! external process launches), input errors (checked eagerly for all
//! inputs before the first stage), external-engine failures (fatal,
//! with the offending stage identified), and per-label failures (which
//! are isolated, aggregated, and reported at end of run).

use std::path::PathBuf;
use thiserror::Error;

use ravens_core::cache::StageFailure;
use ravens_core::CoreError;
use ravens_engine::EngineError;

/// Main error type for pipeline runs.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Invalid configuration, detected before any stage runs.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An external engine process failed; no downstream stage is
    /// attempted and no retry is made.
    #[error("Stage '{stage}' failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: EngineError,
    },

    /// One or more labels did not complete during fan-out. Sibling
    /// labels were still processed; the IDs listed here are the ones
    /// left incomplete.
    #[error("{} label(s) did not complete: {}", .0.len(), format_labels(.0))]
    IncompleteLabels(Vec<u32>),

    /// Data-model error (missing inputs, chain validation, cache).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// I/O-layer failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn format_labels(labels: &[u32]) -> String {
    labels
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a stage error.
    pub fn stage(stage: impl Into<String>, source: EngineError) -> Self {
        Self::Stage {
            stage: stage.into(),
            source,
        }
    }

    /// Lift a cached-stage failure whose body called the engine.
    pub fn from_engine_failure(stage: &str, failure: StageFailure<EngineError>) -> Self {
        match failure {
            StageFailure::Cache(err) => Self::Core(err),
            StageFailure::Stage(err) => Self::stage(stage, err),
        }
    }

    /// Lift a cached-stage failure whose body ran in-process.
    pub fn from_io_failure(stage: &str, failure: StageFailure<anyhow::Error>) -> Self {
        match failure {
            StageFailure::Cache(err) => Self::Core(err),
            StageFailure::Stage(err) => Self::Other(err.context(format!("Stage '{stage}'"))),
        }
    }

    /// Lift an engine configuration error (e.g. unknown profile).
    pub fn from_engine_config(err: EngineError) -> Self {
        Self::Config(err.to_string())
    }

    /// A missing input volume.
    pub fn missing_input(path: impl Into<PathBuf>) -> Self {
        Self::Core(CoreError::MissingInput(path.into()))
    }
}
