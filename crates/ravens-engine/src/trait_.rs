//! Engine trait for external spatial-normalization tooling.
//!
//! The registration optimizer, the resampler, and the Jacobian
//! computation are all consumed as black boxes behind this one
//! interface. Backends spawn the underlying numerical tools as child
//! processes and translate between the pipeline's transform model and
//! each tool's conventions.

use std::path::Path;

use ravens_core::{Interpolation, TransformChain};

use crate::error::Result;
use crate::profile::ProfileRecipe;

/// Capability set of an external registration engine.
pub trait RegistrationEngine {
    /// The transform chain a registration with this recipe will emit
    /// under the given output prefix, without running anything.
    ///
    /// Pure naming: the pipeline uses this both for cache checks and to
    /// know the final artifact paths before promotion.
    fn expected_transforms(
        &self,
        recipe: &ProfileRecipe,
        out_prefix: &Path,
    ) -> Result<TransformChain>;

    /// Register `moving` onto `fixed`, writing transform artifacts
    /// under `out_prefix`, and return the emitted chain
    /// (subject -> template, outermost first).
    fn register(
        &self,
        fixed: &Path,
        moving: &Path,
        recipe: &ProfileRecipe,
        out_prefix: &Path,
    ) -> Result<TransformChain>;

    /// Resample `input` onto the grid of `reference` through the chain,
    /// with the given interpolation mode, writing to `out`.
    fn resample(
        &self,
        input: &Path,
        reference: &Path,
        chain: &TransformChain,
        interpolation: Interpolation,
        out: &Path,
    ) -> Result<()>;

    /// Collapse the chain into a single dense deformation field on the
    /// grid of `reference`, writing to `out`.
    fn compose(&self, chain: &TransformChain, reference: &Path, out: &Path) -> Result<()>;

    /// Compute the Jacobian determinant field of a dense deformation
    /// field, writing to `out`. Values above 1 mark local expansion
    /// relative to the reference, below 1 contraction.
    fn jacobian_determinant(&self, field: &Path, out: &Path) -> Result<()>;
}
