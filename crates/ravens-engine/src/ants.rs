//! ANTs-style engine backend.
//!
//! Wraps `antsRegistration`, `antsApplyTransforms`, and
//! `CreateJacobianDeterminantImage`. ANTs-specific conventions live
//! here and nowhere else: the `0GenericAffine.mat` / `1Warp.nii.gz` /
//! `1InverseWarp.nii.gz` artifact suffixes, the `[path,1]` syntax for
//! inverted linear transforms, and the fact that an inverted dense
//! transform must be handed over as its precomputed inverse-field file
//! (ANTs does not invert dense fields on the fly).

use std::path::{Path, PathBuf};

use ravens_core::CoordinateSpace::{Subject, Template};
use ravens_core::{ChainElement, Interpolation, Transform, TransformChain, TransformKind};
use tracing::info;

use crate::error::Result;
use crate::process::{ensure_artifacts, run_tool};
use crate::profile::{Metric, ProfileRecipe, StageParams};
use crate::trait_::RegistrationEngine;

const AFFINE_SUFFIX: &str = "0GenericAffine.mat";
const WARP_SUFFIX: &str = "1Warp.nii.gz";
const INVERSE_WARP_SUFFIX: &str = "1InverseWarp.nii.gz";

/// Engine backend built on the ANTs command-line tools.
#[derive(Debug, Clone)]
pub struct AntsEngine {
    threads: u32,
}

impl AntsEngine {
    pub fn new(threads: u32) -> Self {
        Self { threads }
    }
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    PathBuf::from(format!("{}{}", prefix.display(), suffix))
}

fn metric_arg(metric: Metric, fixed: &Path, moving: &Path, deformable: bool) -> String {
    let f = fixed.display();
    let m = moving.display();
    match (metric, deformable) {
        (Metric::CrossCorrelation, true) => format!("CC[{f},{m},1,4]"),
        _ => format!("MI[{f},{m},1,32,Regular,0.25]"),
    }
}

fn push_stage(
    args: &mut Vec<String>,
    transform: &str,
    params: &StageParams,
    metric: String,
) {
    args.push("-t".into());
    args.push(transform.into());
    args.push("-m".into());
    args.push(metric);
    args.push("-c".into());
    args.push(format!("[{},1e-6,10]", params.iterations));
    args.push("-f".into());
    args.push(params.shrink_factors.into());
    args.push("-s".into());
    args.push(params.smoothing_sigmas.into());
}

fn registration_args(
    fixed: &Path,
    moving: &Path,
    recipe: &ProfileRecipe,
    out_prefix: &Path,
) -> Vec<String> {
    let mut args = vec![
        "-d".into(),
        "3".into(),
        "-o".into(),
        out_prefix.display().to_string(),
        "--interpolation".into(),
        "Linear".into(),
        "-v".into(),
        "0".into(),
    ];
    if let Some(rigid) = &recipe.rigid {
        push_stage(
            &mut args,
            "Rigid[0.1]",
            rigid,
            metric_arg(recipe.metric, fixed, moving, false),
        );
    }
    push_stage(
        &mut args,
        "Affine[0.1]",
        &recipe.affine,
        metric_arg(recipe.metric, fixed, moving, false),
    );
    if let Some(deformable) = &recipe.deformable {
        push_stage(
            &mut args,
            "SyN[0.1,3,0]",
            deformable,
            metric_arg(recipe.metric, fixed, moving, true),
        );
    }
    args
}

/// One `-t` argument per chain element, in chain order.
///
/// Chain order maps directly to the `-t` listing order;
/// antsApplyTransforms treats the list as a transform stack.
fn transform_args(chain: &TransformChain) -> Vec<String> {
    let mut args = Vec::new();
    for element in chain.elements() {
        args.push("-t".into());
        let arg = match (element.transform.kind(), element.invert) {
            (TransformKind::Linear, true) => {
                format!("[{},1]", element.transform.path().display())
            }
            (TransformKind::Dense, true) => {
                // Chain validation guarantees the inverse field exists.
                element
                    .transform
                    .inverse_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default()
            }
            (_, false) => element.transform.path().display().to_string(),
        };
        args.push(arg);
    }
    args
}

fn apply_args(
    input: &Path,
    reference: &Path,
    chain: &TransformChain,
    interpolation: Interpolation,
    out: &str,
) -> Vec<String> {
    let interp = match interpolation {
        Interpolation::Linear => "Linear",
        Interpolation::NearestNeighbor => "NearestNeighbor",
    };
    let mut args = vec![
        "-d".into(),
        "3".into(),
        "-i".into(),
        input.display().to_string(),
        "-r".into(),
        reference.display().to_string(),
        "-o".into(),
        out.to_string(),
        "-n".into(),
        interp.into(),
    ];
    args.extend(transform_args(chain));
    args
}

impl RegistrationEngine for AntsEngine {
    fn expected_transforms(
        &self,
        recipe: &ProfileRecipe,
        out_prefix: &Path,
    ) -> Result<TransformChain> {
        let mut elements = Vec::new();
        if recipe.produces_dense() {
            elements.push(ChainElement::forward(Transform::dense_with_inverse(
                with_suffix(out_prefix, WARP_SUFFIX),
                with_suffix(out_prefix, INVERSE_WARP_SUFFIX),
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
        info!(profile = recipe.name, "running antsRegistration");
        let args = registration_args(fixed, moving, recipe, out_prefix);
        run_tool("register", "antsRegistration", &args, self.threads)?;

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
        let args = apply_args(
            input,
            reference,
            chain,
            interpolation,
            &out.display().to_string(),
        );
        run_tool("resample", "antsApplyTransforms", &args, self.threads)?;
        ensure_artifacts("resample", [out])
    }

    fn compose(&self, chain: &TransformChain, reference: &Path, out: &Path) -> Result<()> {
        // `-o [path,1]` asks for the collapsed displacement field
        // instead of a resampled image.
        let args = apply_args(
            reference,
            reference,
            chain,
            Interpolation::Linear,
            &format!("[{},1]", out.display()),
        );
        run_tool("compose", "antsApplyTransforms", &args, self.threads)?;
        ensure_artifacts("compose", [out])
    }

    fn jacobian_determinant(&self, field: &Path, out: &Path) -> Result<()> {
        // Geometric (non-log) determinant.
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
