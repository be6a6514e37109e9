//! Individual transform elements.

use std::path::{Path, PathBuf};

use crate::space::CoordinateSpace;

/// The two kinds of spatial transform the pipeline handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    /// A single invertible matrix (rigid or affine) stored in one file.
    Linear,
    /// A dense per-voxel displacement field. Not closed-form invertible;
    /// inversion is only possible when a separately computed inverse
    /// field was recorded at registration time.
    Dense,
}

/// One element of a directed spatial mapping between two coordinate
/// spaces, identified by its artifact path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transform {
    path: PathBuf,
    kind: TransformKind,
    from: CoordinateSpace,
    to: CoordinateSpace,
    /// Precomputed inverse field, dense transforms only.
    inverse_path: Option<PathBuf>,
}

impl Transform {
    /// A linear (matrix) transform. Always invertible.
    pub fn linear(path: impl Into<PathBuf>, from: CoordinateSpace, to: CoordinateSpace) -> Self {
        Self {
            path: path.into(),
            kind: TransformKind::Linear,
            from,
            to,
            inverse_path: None,
        }
    }

    /// A dense displacement field with no recorded inverse.
    pub fn dense(path: impl Into<PathBuf>, from: CoordinateSpace, to: CoordinateSpace) -> Self {
        Self {
            path: path.into(),
            kind: TransformKind::Dense,
            from,
            to,
            inverse_path: None,
        }
    }

    /// A dense displacement field whose inverse field was also computed
    /// by the registration engine.
    pub fn dense_with_inverse(
        path: impl Into<PathBuf>,
        inverse_path: impl Into<PathBuf>,
        from: CoordinateSpace,
        to: CoordinateSpace,
    ) -> Self {
        Self {
            path: path.into(),
            kind: TransformKind::Dense,
            from,
            to,
            inverse_path: Some(inverse_path.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> TransformKind {
        self.kind
    }

    pub fn from_space(&self) -> CoordinateSpace {
        self.from
    }

    pub fn to_space(&self) -> CoordinateSpace {
        self.to
    }

    /// The recorded inverse field for a dense transform, if any.
    pub fn inverse_path(&self) -> Option<&Path> {
        self.inverse_path.as_deref()
    }

    /// Whether applying this transform inverted is possible at all.
    ///
    /// Linear transforms are always invertible; dense fields only when
    /// an inverse field is on record. The pipeline never approximates a
    /// dense inverse implicitly.
    pub fn is_invertible(&self) -> bool {
        match self.kind {
            TransformKind::Linear => true,
            TransformKind::Dense => self.inverse_path.is_some(),
        }
    }
}
