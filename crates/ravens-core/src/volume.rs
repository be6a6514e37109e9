//! Volume references.
//!
//! A [`VolumeRef`] identifies a 3-D volume by its file path and the
//! coordinate space it lives in. Voxel data is never held here; the
//! orchestrator moves volumes around purely by path, and loading is the
//! concern of the I/O layer.

use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::space::CoordinateSpace;

/// A path-identified volume with a coordinate-space tag.
///
/// Volumes are immutable once produced and are identified purely by
/// their file path for caching purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeRef {
    path: PathBuf,
    space: CoordinateSpace,
}

impl VolumeRef {
    pub fn new(path: impl Into<PathBuf>, space: CoordinateSpace) -> Self {
        Self {
            path: path.into(),
            space,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn space(&self) -> CoordinateSpace {
        self.space
    }

    /// Check that the file exists, returning a fatal input error otherwise.
    ///
    /// The pipeline calls this eagerly for every input before the first
    /// stage runs, so a missing file is reported before any external
    /// process is launched.
    pub fn verify(&self) -> Result<()> {
        if self.path.is_file() {
            Ok(())
        } else {
            Err(CoreError::MissingInput(self.path.clone()))
        }
    }
}
