//! Error types for the pipeline data model.
//!
//! This module provides structured error types for transform-chain
//! validation, input checking, and the stage cache.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for data-model operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// An input volume does not exist on disk.
    #[error("Missing input volume: {}", .0.display())]
    MissingInput(PathBuf),

    /// A chain element's effective direction does not match the chain's
    /// declared endpoints.
    #[error(
        "Transform chain direction mismatch: element {index} maps {found}, chain is declared {expected}"
    )]
    DirectionMismatch {
        index: usize,
        expected: String,
        found: String,
    },

    /// A chain element is flagged for inversion but is not invertible.
    #[error(
        "Transform {}: inversion requested but no inverse is available \
         (dense fields require a precomputed inverse field)",
        .0.display()
    )]
    NotInvertible(PathBuf),

    /// A transform chain with no elements.
    #[error("Transform chain is empty")]
    EmptyChain,

    /// Stage cache I/O failure.
    #[error("Stage cache error for {}: {source}", .path.display())]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// General I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for data-model operations.
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create a stage cache error.
    pub fn cache(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Cache {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_input_display() {
        let err = CoreError::MissingInput(PathBuf::from("/data/t1.nii.gz"));
        assert_eq!(err.to_string(), "Missing input volume: /data/t1.nii.gz");
    }

    #[test]
    fn test_not_invertible_display() {
        let err = CoreError::NotInvertible(PathBuf::from("warp.nii.gz"));
        assert!(err.to_string().contains("precomputed inverse field"));
    }
}
