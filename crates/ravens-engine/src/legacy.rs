//! Legacy (greedy-style) engine backend.
//!
//! Wraps the `greedy` registration tool and its two-file output
//! convention: one affine matrix (`<prefix>_affine.mat`) and one
//! forward warp (`<prefix>_warp.nii.gz`), with no inverse warp emitted.
//! Greedy's inversion syntax (`path,-1` for matrices) stays confined to
//! this module. Greedy has no Jacobian tool of its own, so that one
//! call is delegated to `CreateJacobianDeterminantImage`.

use std::path::{Path, PathBuf};

use ravens_core::CoordinateSpace::{Subject, Template};
use ravens_core::{ChainElement, Interpolation, Transform, TransformChain, TransformKind};
use tracing::info;

use crate::error::Result;
use crate::process::{ensure_artifacts, run_tool};
use crate::profile::ProfileRecipe;
use crate::trait_::RegistrationEngine;

const AFFINE_SUFFIX: &str = "_affine.mat";
const WARP_SUFFIX: &str = "_warp.nii.gz";

/// Engine backend for the legacy greedy toolchain.
#[derive(Debug, Clone)]
pub struct LegacyEngine {
    threads: u32,
}

impl LegacyEngine {
    pub fn new(threads: u32) -> Self {
        Self { threads }
    }
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}{}", prefix.display(), suffix))
}

/// Transform arguments in greedy's `-r` convention, chain order.
fn reslice_transform_args(chain: &TransformChain) -> Vec<String> {
    let mut args = vec!["-r".to_string()];
    for element in chain.elements() {
        let arg = match (element.transform.kind(), element.invert) {
            (TransformKind::Linear, true) => {
                format!("{},-1", element.transform.path().display())
            }
            (TransformKind::Dense, true) => element
                .transform
                .inverse_path()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            (_, false) => element.transform.path().display().to_string(),
        };
        args.push(arg);
    }
    args
}

impl RegistrationEngine for LegacyEngine {
    fn expected_transforms(
        &self,
        recipe: &ProfileRecipe,
        out_prefix: &Path,
    ) -> Result<TransformChain> {
        let mut elements = Vec::new();
        if recipe.produces_dense() {
            // Two-file convention: forward warp only, no inverse field.
            elements.push(ChainElement::forward(Transform::dense(
                with_suffix(out_prefix, WARP_SUFFIX),
                Subject,
                Template,
            )));
        }
        elements.push(ChainElement::forward(Transform::linear(
            with_suffix(out_prefix, AFFINE_SUFFIX),
            Subject,
            Template,
        )));
        Ok(TransformChain::new(Subject, Template, elements)?)
    }

    fn register(
        &self,
        fixed: &Path,
        moving: &Path,
        recipe: &ProfileRecipe,
        out_prefix: &Path,
    ) -> Result<TransformChain> {
        let affine = with_suffix(out_prefix, AFFINE_SUFFIX);

        info!(profile = recipe.name, "running greedy affine registration");
        let affine_args = vec![
            "-d".to_string(),
            "3".to_string(),
            "-a".to_string(),
            "-m".to_string(),
            "NMI".to_string(),
            "-i".to_string(),
            fixed.display().to_string(),
            moving.display().to_string(),
            "-o".to_string(),
            affine.display().to_string(),
            "-n".to_string(),
            recipe.affine.iterations.to_string(),
        ];
        run_tool("register", "greedy", &affine_args, self.threads)?;

        if let Some(deformable) = &recipe.deformable {
            info!(profile = recipe.name, "running greedy deformable registration");
            let warp = with_suffix(out_prefix, WARP_SUFFIX);
            let deformable_args = vec![
                "-d".to_string(),
                "3".to_string(),
                "-m".to_string(),
                "NMI".to_string(),
                "-i".to_string(),
                fixed.display().to_string(),
                moving.display().to_string(),
                "-it".to_string(),
                affine.display().to_string(),
                "-o".to_string(),
                warp.display().to_string(),
                "-n".to_string(),
                deformable.iterations.to_string(),
            ];
            run_tool("register", "greedy", &deformable_args, self.threads)?;
        }

        let chain = self.expected_transforms(recipe, out_prefix)?;
        ensure_artifacts(
            "register",
            chain.artifact_paths().iter().map(PathBuf::as_path),
        )?;
        Ok(chain)
    }

    fn resample(
        &self,
        input: &Path,
        reference: &Path,
        chain: &TransformChain,
        interpolation: Interpolation,
        out: &Path,
    ) -> Result<()> {
        let interp = match interpolation {
            Interpolation::Linear => "LINEAR",
            Interpolation::NearestNeighbor => "NN",
        };
        let mut args = vec![
            "-d".to_string(),
            "3".to_string(),
            "-rf".to_string(),
            reference.display().to_string(),
            "-rm".to_string(),
            input.display().to_string(),
            out.display().to_string(),
            "-ri".to_string(),
            interp.to_string(),
        ];
        args.extend(reslice_transform_args(chain));
        run_tool("resample", "greedy", &args, self.threads)?;
        ensure_artifacts("resample", [out])
    }

    fn compose(&self, chain: &TransformChain, reference: &Path, out: &Path) -> Result<()> {
        let mut args = vec![
            "-d".to_string(),
            "3".to_string(),
            "-rf".to_string(),
            reference.display().to_string(),
            "-rc".to_string(),
            out.display().to_string(),
        ];
        args.extend(reslice_transform_args(chain));
        run_tool("compose", "greedy", &args, self.threads)?;
        ensure_artifacts("compose", [out])
    }

    fn jacobian_determinant(&self, field: &Path, out: &Path) -> Result<()> {
        let args = vec![
            "3".to_string(),
            field.display().to_string(),
            out.display().to_string(),
            "0".to_string(),
            "0".to_string(),
        ];
        run_tool("jacobian", "CreateJacobianDeterminantImage", &args, self.threads)?;
        ensure_artifacts("jacobian", [out])
    }
}
