pub mod artifact;
pub mod cache;
pub mod error;
pub mod interpolation;
pub mod space;
pub mod transform;
pub mod volume;

pub use artifact::ArtifactLayout;
pub use error::{CoreError, Result};
pub use interpolation::Interpolation;
pub use space::CoordinateSpace;
pub use transform::{ChainElement, Transform, TransformChain, TransformKind};
pub use volume::VolumeRef;
