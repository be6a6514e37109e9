//! Registration-quality profiles.
//!
//! A profile name maps deterministically to an invocation recipe: which
//! transform kinds the registration emits, the iteration and smoothing
//! schedules, and the similarity metric. Profiles are pure
//! configuration; execution belongs to the engine backends.

use crate::error::{EngineError, Result};

/// Multi-resolution schedule for one registration stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageParams {
    /// Iterations per resolution level, coarsest first, e.g. "1000x500x250".
    pub iterations: &'static str,
    /// Shrink factors per level, e.g. "4x2x1".
    pub shrink_factors: &'static str,
    /// Smoothing sigmas per level, e.g. "2x1x0vox".
    pub smoothing_sigmas: &'static str,
}

/// Intensity similarity metric driving the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    MutualInformation,
    CrossCorrelation,
}

/// Invocation recipe for one named profile.
///
/// `deformable` being `None` means the profile is linear-only and no
/// dense warp will exist on disk; downstream composition branches on
/// this, so the flag is explicit rather than inferred later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRecipe {
    pub name: &'static str,
    pub rigid: Option<StageParams>,
    pub affine: StageParams,
    pub deformable: Option<StageParams>,
    pub metric: Metric,
    /// Legacy two-file output convention: a single affine matrix plus a
    /// forward warp, with no inverse warp emitted.
    pub legacy_layout: bool,
}

impl ProfileRecipe {
    /// Whether a dense warp transform will exist for this profile.
    pub fn produces_dense(&self) -> bool {
        self.deformable.is_some()
    }

    /// Names of all known profiles, for error messages.
    pub fn known_names() -> Vec<&'static str> {
        PROFILES.iter().map(|p| p.name).collect()
    }

    /// Look up a profile by name.
    ///
    /// An unknown name is a configuration error reported immediately;
    /// the pipeline must not silently fall back to a default when a
    /// name is explicitly wrong.
    pub fn resolve(name: &str) -> Result<&'static ProfileRecipe> {
        PROFILES
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| EngineError::UnknownProfile {
                name: name.to_string(),
                known: Self::known_names().join(", "),
            })
    }
}

/// The default, balanced linear+dense profile.
pub const DEFAULT_PROFILE: &str = "balanced";

const RIGID_DEFAULT: StageParams = StageParams {
    iterations: "1000x500x250",
    shrink_factors: "4x2x1",
    smoothing_sigmas: "2x1x0vox",
};

const AFFINE_DEFAULT: StageParams = StageParams {
    iterations: "1000x500x250",
    shrink_factors: "4x2x1",
    smoothing_sigmas: "2x1x0vox",
};

static PROFILES: &[ProfileRecipe] = &[
    // Linear-only: a single affine matrix, no dense warp.
    ProfileRecipe {
        name: "affine",
        rigid: Some(RIGID_DEFAULT),
        affine: AFFINE_DEFAULT,
        deformable: None,
        metric: Metric::MutualInformation,
        legacy_layout: false,
    },
    // Default: rigid + affine + a moderate diffeomorphic stage.
    ProfileRecipe {
        name: "balanced",
        rigid: Some(RIGID_DEFAULT),
        affine: AFFINE_DEFAULT,
        deformable: Some(StageParams {
            iterations: "70x50x20",
            shrink_factors: "4x2x1",
            smoothing_sigmas: "2x1x0vox",
        }),
        metric: Metric::MutualInformation,
        legacy_layout: false,
    },
    // Larger iteration budget and a cross-correlation deformable stage.
    ProfileRecipe {
        name: "accurate",
        rigid: Some(RIGID_DEFAULT),
        affine: AFFINE_DEFAULT,
        deformable: Some(StageParams {
            iterations: "100x70x50x20",
            shrink_factors: "8x4x2x1",
            smoothing_sigmas: "3x2x1x0vox",
        }),
        metric: Metric::CrossCorrelation,
        legacy_layout: false,
    },
    // Legacy two-file convention: affine matrix + forward warp only.
    ProfileRecipe {
        name: "legacy",
        rigid: None,
        affine: AFFINE_DEFAULT,
        deformable: Some(StageParams {
            iterations: "100x50x10",
            shrink_factors: "4x2x1",
            smoothing_sigmas: "2x1x0vox",
        }),
        metric: Metric::MutualInformation,
        legacy_layout: true,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_profiles() {
        for name in ["affine", "balanced", "accurate", "legacy"] {
            let recipe = ProfileRecipe::resolve(name).unwrap();
            assert_eq!(recipe.name, name);
        }
    }

    #[test]
    fn test_unknown_profile_is_fatal() {
        let err = ProfileRecipe::resolve("fastest").unwrap_err();
        assert!(matches!(err, EngineError::UnknownProfile { .. }));
    }

    #[test]
    fn test_dense_flag_per_topology() {
        assert!(!ProfileRecipe::resolve("affine").unwrap().produces_dense());
        assert!(ProfileRecipe::resolve("balanced").unwrap().produces_dense());
        assert!(ProfileRecipe::resolve("legacy").unwrap().legacy_layout);
    }

    #[test]
    fn test_default_profile_exists_and_is_dense() {
        let recipe = ProfileRecipe::resolve(DEFAULT_PROFILE).unwrap();
        assert!(recipe.produces_dense());
        assert!(!recipe.legacy_layout);
    }
}
