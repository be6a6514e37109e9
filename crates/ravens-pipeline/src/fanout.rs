//! Label fan-out controller.
//!
//! Fans the composed transform and Jacobian field out across every
//! label in the manifest: warp the binary mask, then multiply it by the
//! Jacobian field and the density scaling factor. Labels are mutually
//! independent, so they run on a bounded worker pool with fully
//! isolated outputs; one label's failure never stops its siblings, but
//! the run as a whole fails at the end naming the incomplete labels.
//!
//! Label masks are warped with *continuous* interpolation, not
//! nearest-neighbor. This is intentional: RAVENS density preservation
//! wants partial-voxel tissue fractions at mask boundaries, which
//! nearest-neighbor would quantize away.

use std::path::Path;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use ravens_core::{cache, ArtifactLayout, Interpolation, TransformChain};
use ravens_io::{labels::LabelEntry, nifti_io, ops, LabelManifest};
use tracing::{info, warn};

use crate::error::{PipelineError, Result};
use crate::resample::resample_stage;
use ravens_engine::RegistrationEngine;

/// Fan-out tuning knobs.
#[derive(Debug, Clone)]
pub struct FanoutOptions {
    /// Unit-conversion multiplier applied to density values.
    pub scale: f32,
    /// Worker pool size for per-label processing.
    pub jobs: usize,
}

impl Default for FanoutOptions {
    fn default() -> Self {
        Self {
            scale: 1000.0,
            jobs: 1,
        }
    }
}

/// Process every label in manifest order.
pub fn process_labels<E: RegistrationEngine + Sync>(
    engine: &E,
    manifest: &LabelManifest,
    chain: &TransformChain,
    jacobian: &Path,
    reference: &Path,
    layout: &ArtifactLayout,
    options: &FanoutOptions,
) -> Result<()> {
    info!(
        labels = manifest.len(),
        jobs = options.jobs,
        "fanning out per-label density computation"
    );
    let bar = ProgressBar::new(manifest.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} labels")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs)
        .build()
        .map_err(|e| PipelineError::config(format!("failed to build worker pool: {e}")))?;

    let failures: Vec<u32> = pool.install(|| {
        manifest
            .entries()
            .par_iter()
            .filter_map(|entry| {
                let result =
                    process_one(engine, entry, chain, jacobian, reference, layout, options);
                bar.inc(1);
                match result {
                    Ok(()) => None,
                    Err(err) => {
                        warn!(label = entry.id, error = %err, "label failed; continuing with siblings");
                        Some(entry.id)
                    }
                }
            })
            .collect()
    });
    bar.finish_and_clear();

    if failures.is_empty() {
        Ok(())
    } else {
        let mut failures = failures;
        failures.sort_unstable();
        Err(PipelineError::IncompleteLabels(failures))
    }
}

fn process_one<E: RegistrationEngine>(
    engine: &E,
    entry: &LabelEntry,
    chain: &TransformChain,
    jacobian: &Path,
    reference: &Path,
    layout: &ArtifactLayout,
    options: &FanoutOptions,
) -> Result<()> {
    let warped_mask = layout.warped_mask(entry.id);
    resample_stage(
        engine,
        &format!("warp-mask-{}", entry.id),
        &entry.mask,
        reference,
        chain,
        // Continuous on purpose, see module docs.
        Interpolation::Linear,
        &warped_mask,
    )?;

    let stage = format!("ravens-{}", entry.id);
    let ravens_path = layout.ravens_map(entry.id);
    let scale = options.scale;
    cache::run_stage::<anyhow::Error, _>(
        &stage,
        &format!("scale={scale}"),
        &[warped_mask.as_path(), jacobian],
        &ravens_path,
        |scratch| {
            let mask = nifti_io::read_volume(&warped_mask)
                .with_context(|| format!("label {} warped mask", entry.id))?;
            let jac = nifti_io::read_volume(jacobian).context("Jacobian field")?;
            let ravens = ops::scaled_product(&mask, &jac, scale)?;
            nifti_io::write_volume(scratch, &ravens)
        },
    )
    .map_err(|f| PipelineError::from_io_failure(&stage, f))?;

    Ok(())
}
