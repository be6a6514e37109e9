//! Spatial transform model.
//!
//! Transforms are on-disk artifacts produced by the external
//! registration engine; this module only tracks their kind, direction,
//! and invertibility, and validates how they may be chained.

mod chain;
mod element;

pub use chain::{ChainElement, TransformChain};
pub use element::{Transform, TransformKind};
