//! Subject-space projection.
//!
//! Carries template-space maps back into subject space by reversing the
//! registration outputs, and projects arbitrary volumes through a
//! user-specified transform chain. Projection runs outside the stage
//! cache: it is invoked ad hoc against existing pipeline outputs and
//! always recomputes.

use std::path::{Path, PathBuf};

use ravens_core::CoordinateSpace::{self, Subject, Template};
use ravens_core::{ChainElement, Interpolation, Transform, TransformChain, TransformKind};
use ravens_engine::RegistrationEngine;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::resample::resample_uncached;

/// Build the template-to-subject chain from the forward registration
/// chain.
///
/// The deformable leg is replaced by its precomputed inverse field
/// applied forward, while the linear leg is applied with its inversion
/// flag set. The two legs are deliberately not handled uniformly: a
/// dense field has no closed-form inverse, so only an engine-recorded
/// inverse field is acceptable, and a profile that recorded none cannot
/// project back at all.
pub fn map_to_subject_chain(forward: &TransformChain) -> Result<TransformChain> {
    if forward.from_space() != Subject || forward.to_space() != Template {
        return Err(PipelineError::config(format!(
            "registration chain must map subject -> template, got {} -> {}",
            forward.from_space(),
            forward.to_space()
        )));
    }

    let mut elements = Vec::with_capacity(forward.len());
    for element in forward.elements() {
        match element.transform.kind() {
            TransformKind::Dense => {
                let inverse = element.transform.inverse_path().ok_or_else(|| {
                    PipelineError::config(format!(
                        "deformation field {} has no recorded inverse; \
                         this registration profile cannot project back to subject space",
                        element.transform.path().display()
                    ))
                })?;
                elements.push(ChainElement::forward(Transform::dense(
                    inverse, Template, Subject,
                )));
            }
            TransformKind::Linear => {
                elements.push(ChainElement::inverted(element.transform.clone()));
            }
        }
    }
    Ok(TransformChain::new(Template, Subject, elements)?)
}

/// Resample a template-space map onto the subject grid.
pub fn map_to_subject<E: RegistrationEngine>(
    engine: &E,
    map: &Path,
    subject_reference: &Path,
    forward: &TransformChain,
    interpolation: Interpolation,
    output: &Path,
) -> Result<()> {
    let chain = map_to_subject_chain(forward)?;
    project_map(engine, map, subject_reference, &chain, interpolation, output)
}

/// Project a volume through an explicit chain onto a reference grid.
///
/// Every referenced file is checked before the engine launches, so a
/// bad invocation fails with a missing-input error rather than an
/// opaque child-process failure.
pub fn project_map<E: RegistrationEngine>(
    engine: &E,
    map: &Path,
    reference: &Path,
    chain: &TransformChain,
    interpolation: Interpolation,
    output: &Path,
) -> Result<()> {
    for path in [map, reference] {
        if !path.is_file() {
            return Err(PipelineError::missing_input(path));
        }
    }
    for path in chain.artifact_paths() {
        if !path.is_file() {
            return Err(PipelineError::missing_input(path));
        }
    }

    info!(
        map = %map.display(),
        chain = %chain.describe(),
        output = %output.display(),
        "projecting map"
    );
    resample_uncached(engine, map, reference, chain, interpolation, output)
}

/// Parse command-line transform specifications into a chain.
///
/// Each spec is `PATH` or `PATH,invert`, listed outermost first. The
/// transform kind is inferred from the file extension: matrix files
/// (`.mat`, `.txt`) are linear, volume files (`.nii`, `.nii.gz`,
/// `.mha`, `.nrrd`) are dense fields. A dense field cannot be flagged
/// for inversion; supply the precomputed inverse field forward instead.
pub fn build_projection_chain(
    specs: &[String],
    from: CoordinateSpace,
    to: CoordinateSpace,
) -> Result<TransformChain> {
    if specs.is_empty() {
        return Err(PipelineError::config(
            "at least one transform specification is required",
        ));
    }

    let mut elements = Vec::with_capacity(specs.len());
    for spec in specs {
        let (path, invert) = match spec.rsplit_once(',') {
            Some((path, "invert")) => (PathBuf::from(path), true),
            Some((_, flag)) => {
                return Err(PipelineError::config(format!(
                    "unknown transform flag '{flag}' in '{spec}' (expected 'invert')"
                )));
            }
            None => (PathBuf::from(spec), false),
        };

        let kind = infer_kind(&path).ok_or_else(|| {
            PipelineError::config(format!(
                "cannot infer transform kind from '{}': \
                 expected a matrix (.mat, .txt) or field (.nii, .nii.gz, .mha, .nrrd) file",
                path.display()
            ))
        })?;

        let element = match (kind, invert) {
            (TransformKind::Linear, false) => {
                ChainElement::forward(Transform::linear(path, from, to))
            }
            (TransformKind::Linear, true) => {
                ChainElement::inverted(Transform::linear(path, to, from))
            }
            (TransformKind::Dense, false) => ChainElement::forward(Transform::dense(path, from, to)),
            (TransformKind::Dense, true) => {
                return Err(PipelineError::config(format!(
                    "deformation field {} cannot be inverted on the fly; \
                     supply its precomputed inverse field without the invert flag",
                    path.display()
                )));
            }
        };
        elements.push(element);
    }

    Ok(TransformChain::new(from, to, elements)?)
}

fn infer_kind(path: &Path) -> Option<TransformKind> {
    let name = path.file_name()?.to_str()?.to_ascii_lowercase();
    if name.ends_with(".mat") || name.ends_with(".txt") {
        Some(TransformKind::Linear)
    } else if name.ends_with(".nii")
        || name.ends_with(".nii.gz")
        || name.ends_with(".mha")
        || name.ends_with(".nrrd")
    {
        Some(TransformKind::Dense)
    } else {
        None
    }
}
