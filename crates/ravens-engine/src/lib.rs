pub mod ants;
pub mod error;
pub mod legacy;
pub mod process;
pub mod profile;
pub mod trait_;

use std::path::Path;

use ravens_core::{Interpolation, TransformChain};

pub use ants::AntsEngine;
pub use error::{EngineError, Result};
pub use legacy::LegacyEngine;
pub use profile::{Metric, ProfileRecipe, StageParams, DEFAULT_PROFILE};
pub use trait_::RegistrationEngine;

/// Variant dispatch over the available engine backends, so
/// backend-specific quirks (artifact naming, inversion conventions)
/// stay isolated in each implementation.
#[derive(Debug, Clone)]
pub enum Engine {
    Ants(AntsEngine),
    Legacy(LegacyEngine),
}

impl Engine {
    /// Pick the backend a profile's transform topology calls for.
    pub fn for_recipe(recipe: &ProfileRecipe, threads: u32) -> Self {
        if recipe.legacy_layout {
            Engine::Legacy(LegacyEngine::new(threads))
        } else {
            Engine::Ants(AntsEngine::new(threads))
        }
    }
}

impl RegistrationEngine for Engine {
    fn expected_transforms(
        &self,
        recipe: &ProfileRecipe,
        out_prefix: &Path,
    ) -> Result<TransformChain> {
        match self {
            Engine::Ants(e) => e.expected_transforms(recipe, out_prefix),
            Engine::Legacy(e) => e.expected_transforms(recipe, out_prefix),
        }
    }

    fn register(
        &self,
        fixed: &Path,
        moving: &Path,
        recipe: &ProfileRecipe,
        out_prefix: &Path,
    ) -> Result<TransformChain> {
        match self {
            Engine::Ants(e) => e.register(fixed, moving, recipe, out_prefix),
            Engine::Legacy(e) => e.register(fixed, moving, recipe, out_prefix),
        }
    }

    fn resample(
        &self,
        input: &Path,
        reference: &Path,
        chain: &TransformChain,
        interpolation: Interpolation,
        out: &Path,
    ) -> Result<()> {
        match self {
            Engine::Ants(e) => e.resample(input, reference, chain, interpolation, out),
            Engine::Legacy(e) => e.resample(input, reference, chain, interpolation, out),
        }
    }

    fn compose(&self, chain: &TransformChain, reference: &Path, out: &Path) -> Result<()> {
        match self {
            Engine::Ants(e) => e.compose(chain, reference, out),
            Engine::Legacy(e) => e.compose(chain, reference, out),
        }
    }

    fn jacobian_determinant(&self, field: &Path, out: &Path) -> Result<()> {
        match self {
            Engine::Ants(e) => e.jacobian_determinant(field, out),
            Engine::Legacy(e) => e.jacobian_determinant(field, out),
        }
    }
}
