//! Transform composer.
//!
//! Chains one or more elementary transforms into a single dense
//! deformation field so that one downstream resampling call suffices.
//! A chain that is a single linear transform is passed through
//! unchanged rather than densified; callers must treat both return
//! shapes as valid and branch accordingly.

use std::path::Path;

use ravens_core::CoordinateSpace::{Subject, Template};
use ravens_core::{cache, ChainElement, Transform, TransformChain};
use ravens_engine::{EngineError, RegistrationEngine};
use tracing::info;

use crate::error::{PipelineError, Result};

/// Result of composing a transform chain.
///
/// Both shapes carry a chain ready to hand to a resampling call: the
/// `Linear` shape is the original single-matrix chain, the `Dense`
/// shape wraps the composed field artifact.
#[derive(Debug, Clone)]
pub enum ComposedTransform {
    Linear(TransformChain),
    Dense(TransformChain),
}

impl ComposedTransform {
    /// The chain to resample through.
    pub fn chain(&self) -> &TransformChain {
        match self {
            Self::Linear(chain) | Self::Dense(chain) => chain,
        }
    }

    pub fn is_dense(&self) -> bool {
        matches!(self, Self::Dense(_))
    }
}

/// Compose a chain into a single transform, cached at `out`.
///
/// The actual field arithmetic is delegated to the engine; this stage
/// owns validation, the single-linear shortcut, and idempotency.
pub fn compose_chain<E: RegistrationEngine>(
    engine: &E,
    chain: &TransformChain,
    reference: &Path,
    out: &Path,
) -> Result<ComposedTransform> {
    if chain.is_single_linear() {
        info!("composition is a no-op for a single linear transform");
        return Ok(ComposedTransform::Linear(chain.clone()));
    }
    let dense = densify(engine, chain, reference, out)?;
    Ok(ComposedTransform::Dense(dense))
}

/// Collapse a chain into a dense field at `out` unconditionally, even
/// for a single linear transform. The Jacobian stage uses this when a
/// linear-only profile still needs a field to differentiate.
pub fn densify<E: RegistrationEngine>(
    engine: &E,
    chain: &TransformChain,
    reference: &Path,
    out: &Path,
) -> Result<TransformChain> {
    let mut inputs: Vec<&Path> = vec![reference];
    let artifact_paths = chain.artifact_paths();
    inputs.extend(artifact_paths.iter().map(|p| p.as_path()));

    cache::run_stage::<EngineError, _>(
        "compose",
        &chain.describe(),
        &inputs,
        out,
        |scratch| engine.compose(chain, reference, scratch),
    )
    .map_err(|f| PipelineError::from_engine_failure("compose", f))?;

    let field = Transform::dense(out, chain.from_space(), chain.to_space());
    Ok(TransformChain::single(ChainElement::forward(field))?)
}

/// The forward chain of the main pipeline always runs subject to
/// template; anything else is a wiring bug caught here before any
/// engine launch.
pub fn check_forward_chain(chain: &TransformChain) -> Result<()> {
    if chain.from_space() == Subject && chain.to_space() == Template {
        Ok(())
    } else {
        Err(PipelineError::config(format!(
            "forward chain must map subject -> template, got {} -> {}",
            chain.from_space(),
            chain.to_space()
        )))
    }
}
