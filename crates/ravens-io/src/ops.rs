//! Voxelwise arithmetic on volumes.
//!
//! The density computation and the standalone `multiply` /
//! `invert-intensity` utilities all reduce to elementwise operations on
//! same-grid volumes.

use anyhow::{bail, Result};
use tracing::warn;

use crate::nifti_io::Volume;

/// Voxelwise product of two volumes on the same grid.
pub fn multiply(a: &Volume, b: &Volume) -> Result<Volume> {
    check_grids(a, b)?;
    let data = a.data() * b.data();
    Ok(Volume::like(data, a))
}

/// Voxelwise product scaled by a constant factor.
///
/// This is the RAVENS density computation: warped label mask times the
/// Jacobian determinant field, times the unit-conversion scaling factor
/// (default 1000 at the pipeline surface, which changes the numeric
/// magnitude of output density values).
pub fn scaled_product(a: &Volume, b: &Volume, scale: f32) -> Result<Volume> {
    check_grids(a, b)?;
    let data = (a.data() * b.data()) * scale;
    Ok(Volume::like(data, a))
}

/// Invert image intensities within the nonzero (foreground) mask.
///
/// Nonzero intensities are rescaled to integers in `[0, scale_max]` and
/// inverted so the brightest foreground voxel maps to 0; background
/// stays 0.
pub fn invert_intensity(volume: &Volume, scale_max: u32) -> Result<Volume> {
    let data = volume.data();
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for &v in data.iter() {
        if v > 0.0 {
            min = min.min(v);
            max = max.max(v);
        }
    }
    if !min.is_finite() {
        bail!("Image has no nonzero voxels to invert");
    }
    if max == min {
        bail!("Image foreground has constant intensity values");
    }

    let scale_max = scale_max as f32;
    let range = max - min;
    let inverted = data.mapv(|v| {
        if v > 0.0 {
            scale_max - ((v - min) / range * scale_max).round()
        } else {
            0.0
        }
    });
    Ok(Volume::like(inverted, volume))
}

fn check_grids(a: &Volume, b: &Volume) -> Result<()> {
    if a.shape() != b.shape() {
        bail!(
            "Volumes must have the same shape: {:?} vs {:?}",
            a.shape(),
            b.shape()
        );
    }
    if !a.same_grid(b) {
        warn!("Volumes share a shape but not an affine; proceeding voxelwise");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use nifti::NiftiHeader;

    fn volume(values: impl Fn(usize) -> f32) -> Volume {
        let data = Array3::from_shape_fn((2, 2, 2), |(x, y, z)| values(x * 4 + y * 2 + z));
        Volume::new(data, NiftiHeader::default())
    }

    #[test]
    fn test_multiply() {
        let a = volume(|i| i as f32);
        let b = volume(|_| 2.0);
        let product = multiply(&a, &b).unwrap();
        assert_eq!(product.data()[[1, 1, 1]], 14.0);
    }

    #[test]
    fn test_multiply_shape_mismatch() {
        let a = volume(|i| i as f32);
        let b = Volume::new(Array3::zeros((3, 2, 2)), NiftiHeader::default());
        assert!(multiply(&a, &b).is_err());
    }

    #[test]
    fn test_scaled_product_applies_factor() {
        let mask = volume(|i| if i % 2 == 0 { 1.0 } else { 0.0 });
        let jacobian = volume(|_| 1.5);
        let ravens = scaled_product(&mask, &jacobian, 1000.0).unwrap();
        assert_eq!(ravens.data()[[0, 0, 0]], 1500.0);
        assert_eq!(ravens.data()[[0, 0, 1]], 0.0);
    }

    #[test]
    fn test_invert_intensity_foreground_only() {
        let v = volume(|i| match i {
            0 => 0.0,
            1 => 10.0,
            _ => 20.0,
        });
        let inverted = invert_intensity(&v, 2048).unwrap();
        // Background untouched.
        assert_eq!(inverted.data()[[0, 0, 0]], 0.0);
        // Dimmest foreground voxel maps to scale_max, brightest to 0.
        assert_eq!(inverted.data()[[0, 0, 1]], 2048.0);
        assert_eq!(inverted.data()[[1, 1, 1]], 0.0);
    }

    #[test]
    fn test_invert_intensity_rejects_empty_and_flat() {
        let empty = volume(|_| 0.0);
        assert!(invert_intensity(&empty, 2048).is_err());
        let flat = volume(|_| 5.0);
        assert!(invert_intensity(&flat, 2048).is_err());
    }
}
