//! Error types for engine invocation.

use std::path::PathBuf;
use thiserror::Error;

use ravens_core::CoreError;

/// Main error type for external-engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Unknown registration profile name. Reported before any process
    /// launch; the pipeline never guesses a default for an explicitly
    /// wrong name.
    #[error("Unknown registration profile '{name}' (known profiles: {known})")]
    UnknownProfile { name: String, known: String },

    /// An engine process could not be started.
    #[error("Failed to launch '{program}' for stage '{stage}': {source}")]
    Spawn {
        stage: String,
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// An engine process exited nonzero.
    #[error("'{program}' failed during stage '{stage}' ({status}): {stderr}")]
    ProcessFailed {
        stage: String,
        program: String,
        status: String,
        stderr: String,
    },

    /// The engine exited cleanly but an expected artifact is missing.
    #[error("Stage '{stage}' did not produce expected artifact {}", .path.display())]
    MissingArtifact { stage: String, path: PathBuf },

    /// Data-model error (chain validation and the like).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// General I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Create a missing-artifact error.
    pub fn missing_artifact(stage: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::MissingArtifact {
            stage: stage.into(),
            path: path.into(),
        }
    }
}
