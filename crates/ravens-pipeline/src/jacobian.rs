//! Jacobian stage.
//!
//! Derives the scalar local-volume-change field from the composed
//! deformation field. This field is the multiplicative
//! density-correction factor applied to every warped label mask.

use std::path::{Path, PathBuf};

use ravens_core::cache::{self, StageOutcome};
use ravens_engine::{EngineError, RegistrationEngine};
use tracing::info;

use crate::compose::{densify, ComposedTransform};
use crate::error::{PipelineError, Result};

/// Compute the Jacobian determinant field of `composed`, cached at
/// `output`.
///
/// A linear-only composition carries no field to differentiate, so it
/// is first densified onto the reference grid at `field_path` (the
/// resulting determinant is spatially constant, which is exactly the
/// volume change an affine implies).
pub fn jacobian_stage<E: RegistrationEngine>(
    engine: &E,
    composed: &ComposedTransform,
    reference: &Path,
    field_path: &Path,
    output: &Path,
) -> Result<StageOutcome> {
    let field: PathBuf = match composed {
        ComposedTransform::Dense(chain) => chain.elements()[0].transform.path().to_path_buf(),
        ComposedTransform::Linear(chain) => {
            densify(engine, chain, reference, field_path)?;
            field_path.to_path_buf()
        }
    };

    let outcome =
        cache::run_stage::<EngineError, _>("jacobian", "", &[field.as_path()], output, |scratch| {
            engine.jacobian_determinant(&field, scratch)
        })
        .map_err(|f| PipelineError::from_engine_failure("jacobian", f))?;

    if outcome == StageOutcome::CacheHit {
        info!(output = %output.display(), "Jacobian field exists, skipping");
    }
    Ok(outcome)
}
