//! Resampling stage.
//!
//! Applies a transform chain to a source volume on a reference grid
//! with a caller-chosen interpolation mode. The cached variant skips
//! work when the canonical output already exists; the uncached variant
//! serves the projection entry points, which are independent of the
//! forward pipeline's cache state. Both write atomically.

use std::fs;
use std::path::Path;

use ravens_core::cache::{self, StageOutcome};
use ravens_core::{CoreError, Interpolation, TransformChain};
use ravens_engine::{EngineError, RegistrationEngine};
use tracing::info;

use crate::error::{PipelineError, Result};

/// Resample under the stage cache.
pub fn resample_stage<E: RegistrationEngine>(
    engine: &E,
    stage: &str,
    input: &Path,
    reference: &Path,
    chain: &TransformChain,
    interpolation: Interpolation,
    output: &Path,
) -> Result<StageOutcome> {
    let mut inputs: Vec<&Path> = vec![input, reference];
    let artifact_paths = chain.artifact_paths();
    inputs.extend(artifact_paths.iter().map(|p| p.as_path()));
    let params = format!("{interpolation};{}", chain.describe());

    let outcome = cache::run_stage::<EngineError, _>(stage, &params, &inputs, output, |scratch| {
        engine.resample(input, reference, chain, interpolation, scratch)
    })
    .map_err(|f| PipelineError::from_engine_failure(stage, f))?;

    if outcome == StageOutcome::CacheHit {
        info!(stage, output = %output.display(), "artifact exists, skipping");
    }
    Ok(outcome)
}

/// Resample without cache participation, still atomically.
pub fn resample_uncached<E: RegistrationEngine>(
    engine: &E,
    input: &Path,
    reference: &Path,
    chain: &TransformChain,
    interpolation: Interpolation,
    output: &Path,
) -> Result<()> {
    let parent = output.parent().unwrap_or_else(|| Path::new("."));
    let scratch_dir = parent.join(".tmp");
    fs::create_dir_all(&scratch_dir).map_err(|e| CoreError::cache(scratch_dir.clone(), e))?;
    let scratch = scratch_dir.join(output.file_name().unwrap_or_default());

    engine
        .resample(input, reference, chain, interpolation, &scratch)
        .map_err(|e| PipelineError::stage("project", e))?;
    fs::rename(&scratch, output).map_err(|e| CoreError::cache(output.to_path_buf(), e))?;
    Ok(())
}
