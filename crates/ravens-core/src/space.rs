//! Coordinate space tags.
//!
//! Every volume and transform in the pipeline is anchored to one of two
//! physical coordinate spaces: the subject's native space or the
//! reference template space.

use std::fmt;

/// Coordinate space of a volume or transform endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinateSpace {
    /// The subject's native scanner space.
    Subject,
    /// The reference template space.
    Template,
}

impl CoordinateSpace {
    /// The opposite space.
    pub fn opposite(self) -> Self {
        match self {
            Self::Subject => Self::Template,
            Self::Template => Self::Subject,
        }
    }
}

impl fmt::Display for CoordinateSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subject => write!(f, "subject"),
            Self::Template => write!(f, "template"),
        }
    }
}
