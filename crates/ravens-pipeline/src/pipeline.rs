//! End-to-end pipeline for one subject.
//!
//! Stage order: registration (external), transform composition,
//! Jacobian, subject-image warp, label-mask decomposition, then the
//! per-label fan-out. Every stage is individually idempotent, so a
//! re-run after a fault or a manual artifact deletion recomputes only
//! what is missing or stale.
//!
//! One pipeline invocation exclusively owns its scratch directory;
//! concurrent invocations targeting the same output prefix are not
//! coordinated and must be serialized by the caller.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use ravens_core::cache::{self, StageOutcome};
use ravens_core::CoordinateSpace::{Subject, Template};
use ravens_core::{ArtifactLayout, Interpolation, TransformChain, VolumeRef};
use ravens_engine::{Engine, EngineError, ProfileRecipe, RegistrationEngine};
use ravens_io::{labels, nifti_io, LabelManifest};
use tracing::info;

use crate::compose::{check_forward_chain, compose_chain};
use crate::error::{PipelineError, Result};
use crate::fanout::{process_labels, FanoutOptions};
use crate::jacobian::jacobian_stage;
use crate::resample::resample_stage;

/// Configuration for one subject run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Subject anatomical scan, subject space.
    pub input: PathBuf,
    /// Multi-label segmentation of the input, subject space.
    pub segmentation: PathBuf,
    /// Reference template defining the output grid.
    pub template: PathBuf,
    pub out_dir: PathBuf,
    pub prefix: String,
    /// Registration profile name.
    pub profile: String,
    /// Optional label subset; default is every nonzero label present.
    pub labels: Option<Vec<u32>>,
    /// Density scaling factor. The default of 1000 is a unit-conversion
    /// multiplier and changes the numeric magnitude of output values.
    pub scale: f32,
    /// Worker pool size for the label fan-out.
    pub jobs: usize,
    /// Thread count handed to external engine processes.
    pub threads: u32,
}

/// What a run did, for logging and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub labels: Vec<u32>,
    pub stages_executed: usize,
    pub cache_hits: usize,
}

impl PipelineReport {
    fn record(&mut self, outcome: StageOutcome) {
        match outcome {
            StageOutcome::Executed => self.stages_executed += 1,
            StageOutcome::CacheHit => self.cache_hits += 1,
        }
    }
}

/// The orchestrator for one subject.
#[derive(Debug)]
pub struct RavensPipeline<E> {
    engine: E,
    recipe: &'static ProfileRecipe,
    config: PipelineConfig,
    layout: ArtifactLayout,
}

impl RavensPipeline<Engine> {
    /// Resolve the profile, pick the matching engine backend, and
    /// validate configuration. No stage runs yet.
    pub fn from_config(config: PipelineConfig) -> Result<Self> {
        let recipe =
            ProfileRecipe::resolve(&config.profile).map_err(PipelineError::from_engine_config)?;
        let engine = Engine::for_recipe(recipe, config.threads);
        Self::with_engine(engine, recipe, config)
    }
}

impl<E: RegistrationEngine + Sync> RavensPipeline<E> {
    /// Assemble a pipeline around an explicit engine implementation.
    pub fn with_engine(
        engine: E,
        recipe: &'static ProfileRecipe,
        config: PipelineConfig,
    ) -> Result<Self> {
        if config.prefix.is_empty() {
            return Err(PipelineError::config("output prefix must not be empty"));
        }
        if config.jobs == 0 {
            return Err(PipelineError::config("worker count must be at least 1"));
        }
        let layout = ArtifactLayout::new(&config.out_dir, &config.prefix);
        Ok(Self {
            engine,
            recipe,
            config,
            layout,
        })
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Run the full pipeline.
    pub fn run(&self) -> Result<PipelineReport> {
        self.verify_inputs()?;
        fs::create_dir_all(self.layout.out_dir())
            .with_context(|| format!("creating {}", self.layout.out_dir().display()))?;

        let mut report = PipelineReport::default();

        let chain = self.registration_stage(&mut report)?;
        check_forward_chain(&chain)?;

        let composed = compose_chain(
            &self.engine,
            &chain,
            &self.config.template,
            &self.layout.composed_field(),
        )?;

        report.record(jacobian_stage(
            &self.engine,
            &composed,
            &self.config.template,
            &self.layout.composed_field(),
            &self.layout.jacobian(),
        )?);

        report.record(resample_stage(
            &self.engine,
            "warp-image",
            &self.config.input,
            &self.config.template,
            composed.chain(),
            Interpolation::Linear,
            &self.layout.warped_image(),
        )?);

        let manifest = self.mask_stage(&mut report)?;
        report.labels = manifest.ids().collect();

        process_labels(
            &self.engine,
            &manifest,
            composed.chain(),
            &self.layout.jacobian(),
            &self.config.template,
            &self.layout,
            &FanoutOptions {
                scale: self.config.scale,
                jobs: self.config.jobs,
            },
        )?;

        info!(
            executed = report.stages_executed,
            cached = report.cache_hits,
            labels = report.labels.len(),
            "pipeline complete"
        );
        Ok(report)
    }

    /// Eager existence check for every input, before any stage.
    fn verify_inputs(&self) -> Result<()> {
        VolumeRef::new(&self.config.input, Subject).verify()?;
        VolumeRef::new(&self.config.segmentation, Subject).verify()?;
        VolumeRef::new(&self.config.template, Template).verify()?;
        Ok(())
    }

    /// Run (or skip) the external registration, promoting its artifact
    /// set from scratch to the canonical prefix atomically.
    fn registration_stage(&self, report: &mut PipelineReport) -> Result<TransformChain> {
        let reg_prefix = self.layout.registration_prefix();
        let chain = self
            .engine
            .expected_transforms(self.recipe, &reg_prefix)
            .map_err(|e| PipelineError::stage("register", e))?;
        let outputs = chain.artifact_paths();

        let prefix_name = reg_prefix
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "reg".to_string());
        let scratch = self.layout.scratch_dir().join("register");

        let outcome = cache::run_stage_multi::<EngineError, _>(
            "register",
            self.recipe.name,
            &[&self.config.template, &self.config.input],
            &outputs,
            &scratch,
            |work| {
                let work_prefix = work.join(&prefix_name);
                let produced = self.engine.register(
                    &self.config.template,
                    &self.config.input,
                    self.recipe,
                    &work_prefix,
                )?;
                Ok(produced.artifact_paths())
            },
        )
        .map_err(|f| PipelineError::from_engine_failure("register", f))?;

        if outcome == StageOutcome::CacheHit {
            info!("registration artifacts exist, skipping");
        }
        report.record(outcome);
        Ok(chain)
    }

    /// Decompose the segmentation into per-label masks plus the
    /// manifest, as one multi-output cached stage.
    fn mask_stage(&self, report: &mut PipelineReport) -> Result<LabelManifest> {
        let segmentation = nifti_io::read_volume(&self.config.segmentation)
            .context("reading segmentation volume")?;
        let subset = self.config.labels.as_deref();
        let ids = labels::discover_labels(&segmentation, subset);
        if ids.is_empty() {
            return Err(PipelineError::config(
                "segmentation has no nonzero labels matching the request",
            ));
        }

        let manifest_path = self.layout.label_manifest();
        let mut outputs = vec![manifest_path.clone()];
        outputs.extend(ids.iter().map(|&id| self.layout.label_mask(id)));

        let scratch = self.layout.scratch_dir().join("masks");
        let params = format!("labels={ids:?}");
        let outcome = cache::run_stage_multi::<anyhow::Error, _>(
            "label-masks",
            &params,
            &[&self.config.segmentation],
            &outputs,
            &scratch,
            |work| {
                let work = work.to_path_buf();
                let manifest = labels::create_label_masks(&segmentation, subset, |id| {
                    work.join(format!("label_{id}.nii.gz"))
                })?;
                let scratch_manifest = work.join("labelList.csv");
                manifest.write(&scratch_manifest)?;

                let mut produced = vec![scratch_manifest];
                produced.extend(manifest.entries().iter().map(|e| e.mask.clone()));
                Ok(produced)
            },
        )
        .map_err(|f| PipelineError::from_io_failure("label-masks", f))?;

        if outcome == StageOutcome::CacheHit {
            info!("label masks and manifest exist, skipping");
        }
        report.record(outcome);

        let mask_path = |id: u32| self.layout.label_mask(id);
        Ok(LabelManifest::read(&manifest_path, mask_path)?)
    }
}
