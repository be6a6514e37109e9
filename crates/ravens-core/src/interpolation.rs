//! Interpolation mode selection.
//!
//! The pipeline resamples both continuous images (the subject scan,
//! statistical maps) and categorical volumes (label masks) through the
//! same composed transform; the interpolation mode is chosen per call,
//! never globally.

use std::fmt;
use std::str::FromStr;

/// Interpolation mode for a resampling call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Continuous (trilinear) interpolation, for intensity and
    /// statistical maps.
    #[default]
    Linear,
    /// Nearest-neighbor interpolation, for categorical volumes where
    /// partial-voxel values are meaningless.
    NearestNeighbor,
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::NearestNeighbor => write!(f, "nearest"),
        }
    }
}

impl FromStr for Interpolation {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "linear" | "continuous" => Ok(Self::Linear),
            "nearest" | "nearest-neighbor" => Ok(Self::NearestNeighbor),
            other => Err(format!(
                "unknown interpolation mode '{other}' (expected 'linear' or 'nearest')"
            )),
        }
    }
}
