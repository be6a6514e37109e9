//! Shared test fixtures: an in-process engine double and synthetic
//! volume builders.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use ndarray::Array3;
use nifti::NiftiHeader;
use ravens_core::CoordinateSpace::{Subject, Template};
use ravens_core::{ChainElement, Interpolation, Transform, TransformChain};
use ravens_engine::{EngineError, ProfileRecipe, RegistrationEngine};
use ravens_io::nifti_io::{read_volume, write_volume, Volume};

/// Engine double that performs all operations in-process on real NIfTI
/// files, counting every invocation.
#[derive(Default)]
pub struct MockEngine {
    pub registrations: AtomicUsize,
    pub resamples: AtomicUsize,
    pub composes: AtomicUsize,
    pub jacobians: AtomicUsize,
    /// Chain descriptions seen by `resample`, in call order.
    pub resample_chains: Mutex<Vec<String>>,
    /// Any resample whose input path contains this substring fails.
    pub fail_input_containing: Option<String>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(substring: &str) -> Self {
        Self {
            fail_input_containing: Some(substring.to_string()),
            ..Self::default()
        }
    }

    pub fn total_calls(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
            + self.resamples.load(Ordering::SeqCst)
            + self.composes.load(Ordering::SeqCst)
            + self.jacobians.load(Ordering::SeqCst)
    }

    fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
        PathBuf::from(format!("{}{}", prefix.display(), suffix))
    }

    fn chain_for(recipe: &ProfileRecipe, prefix: &Path) -> TransformChain {
        let affine = Transform::linear(Self::with_suffix(prefix, "_affine.mat"), Subject, Template);
        if recipe.produces_dense() {
            let warp = Transform::dense_with_inverse(
                Self::with_suffix(prefix, "_warp.nii.gz"),
                Self::with_suffix(prefix, "_inverse.nii.gz"),
                Subject,
                Template,
            );
            TransformChain::new(
                Subject,
                Template,
                vec![ChainElement::forward(warp), ChainElement::forward(affine)],
            )
            .unwrap()
        } else {
            TransformChain::single(ChainElement::forward(affine)).unwrap()
        }
    }
}

impl RegistrationEngine for MockEngine {
    fn expected_transforms(
        &self,
        recipe: &ProfileRecipe,
        out_prefix: &Path,
    ) -> ravens_engine::Result<TransformChain> {
        Ok(Self::chain_for(recipe, out_prefix))
    }

    fn register(
        &self,
        fixed: &Path,
        _moving: &Path,
        recipe: &ProfileRecipe,
        out_prefix: &Path,
    ) -> ravens_engine::Result<TransformChain> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        let chain = Self::chain_for(recipe, out_prefix);

        let template = read_volume(fixed).map_err(io_err)?;
        let field = Volume::like(Array3::ones(template.shape()), &template);
        for element in chain.elements() {
            let path = element.transform.path();
            if path.extension().map(|e| e == "mat").unwrap_or(false) {
                fs::write(path, "mock affine\n")?;
            } else {
                write_volume(path, &field).map_err(io_err)?;
            }
            if let Some(inverse) = element.transform.inverse_path() {
                write_volume(inverse, &field).map_err(io_err)?;
            }
        }
        Ok(chain)
    }

    fn resample(
        &self,
        input: &Path,
        reference: &Path,
        chain: &TransformChain,
        _interpolation: Interpolation,
        out: &Path,
    ) -> ravens_engine::Result<()> {
        self.resamples.fetch_add(1, Ordering::SeqCst);
        self.resample_chains
            .lock()
            .unwrap()
            .push(chain.describe());

        if let Some(needle) = &self.fail_input_containing {
            if input.display().to_string().contains(needle.as_str()) {
                return Err(EngineError::ProcessFailed {
                    stage: "resample".into(),
                    program: "mock".into(),
                    status: "exit status: 1".into(),
                    stderr: "injected failure".into(),
                });
            }
        }

        let source = read_volume(input).map_err(io_err)?;
        let reference = read_volume(reference).map_err(io_err)?;
        let warped = Volume::like(source.data().clone(), &reference);
        write_volume(out, &warped).map_err(io_err)
    }

    fn compose(
        &self,
        _chain: &TransformChain,
        reference: &Path,
        out: &Path,
    ) -> ravens_engine::Result<()> {
        self.composes.fetch_add(1, Ordering::SeqCst);
        let reference = read_volume(reference).map_err(io_err)?;
        write_volume(out, &reference).map_err(io_err)
    }

    fn jacobian_determinant(&self, field: &Path, out: &Path) -> ravens_engine::Result<()> {
        self.jacobians.fetch_add(1, Ordering::SeqCst);
        let field = read_volume(field).map_err(io_err)?;
        let ones = Volume::like(Array3::ones(field.shape()), &field);
        write_volume(out, &ones).map_err(io_err)
    }
}

fn io_err(err: anyhow::Error) -> EngineError {
    EngineError::Io(std::io::Error::other(err.to_string()))
}

/// Write a 4x4x4 volume whose voxels ramp from 0.
pub fn write_ramp_volume(path: &Path) {
    let data: Vec<f32> = (0..64).map(|x| x as f32).collect();
    let array = Array3::from_shape_vec((4, 4, 4), data).unwrap();
    write_volume(path, &Volume::new(array, NiftiHeader::default())).unwrap();
}

/// Write a 4x4x4 segmentation containing labels 1, 2 and 3.
pub fn write_segmentation(path: &Path) {
    let mut array = Array3::zeros((4, 4, 4));
    for z in 0..4 {
        array[[0, 0, z]] = 1.0;
        array[[1, 1, z]] = 2.0;
        array[[2, 2, z]] = 3.0;
    }
    write_volume(path, &Volume::new(array, NiftiHeader::default())).unwrap();
}
