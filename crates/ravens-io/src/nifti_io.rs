//! NIfTI volume I/O.
//!
//! Volumes are loaded as `f32` voxel arrays in NIfTI [X, Y, Z] axis
//! order; the source header is carried alongside so that derived
//! volumes (masks, density maps) are written back with the original
//! orientation metadata intact.

use anyhow::{Context, Result};
use nalgebra::Matrix4;
use ndarray::{Array3, Ix3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use std::path::Path;

/// An in-memory 3-D scalar volume with its NIfTI header.
#[derive(Debug, Clone)]
pub struct Volume {
    data: Array3<f32>,
    header: NiftiHeader,
}

impl Volume {
    /// Wrap voxel data with an existing header (dimensions in the
    /// header are corrected on write).
    pub fn new(data: Array3<f32>, header: NiftiHeader) -> Self {
        Self { data, header }
    }

    /// A derived volume on the same grid as `like`.
    pub fn like(data: Array3<f32>, like: &Volume) -> Self {
        Self {
            data,
            header: like.header.clone(),
        }
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn header(&self) -> &NiftiHeader {
        &self.header
    }

    pub fn shape(&self) -> [usize; 3] {
        let s = self.data.shape();
        [s[0], s[1], s[2]]
    }

    /// Voxel-to-world affine from the header, preferring the sform,
    /// then the qform, then plain pixdim scaling.
    pub fn affine(&self) -> Matrix4<f64> {
        let h = &self.header;
        if h.sform_code > 0 {
            let r0 = h.srow_x;
            let r1 = h.srow_y;
            let r2 = h.srow_z;
            Matrix4::new(
                r0[0] as f64, r0[1] as f64, r0[2] as f64, r0[3] as f64,
                r1[0] as f64, r1[1] as f64, r1[2] as f64, r1[3] as f64,
                r2[0] as f64, r2[1] as f64, r2[2] as f64, r2[3] as f64,
                0.0, 0.0, 0.0, 1.0,
            )
        } else if h.qform_code > 0 {
            // Quaternion form, see the NIfTI standard.
            let b = h.quatern_b as f64;
            let c = h.quatern_c as f64;
            let d = h.quatern_d as f64;
            let a = (1.0 - (b * b + c * c + d * d).min(1.0)).sqrt();

            let qfac = if h.pixdim[0] == 0.0 { 1.0 } else { h.pixdim[0] as f64 };

            let r11 = a * a + b * b - c * c - d * d;
            let r12 = 2.0 * b * c - 2.0 * a * d;
            let r13 = 2.0 * b * d + 2.0 * a * c;

            let r21 = 2.0 * b * c + 2.0 * a * d;
            let r22 = a * a + c * c - b * b - d * d;
            let r23 = 2.0 * c * d - 2.0 * a * b;

            let r31 = 2.0 * b * d - 2.0 * a * c;
            let r32 = 2.0 * c * d + 2.0 * a * b;
            let r33 = a * a + d * d - c * c - b * b;

            let dx = h.pixdim[1] as f64;
            let dy = h.pixdim[2] as f64;
            let dz = h.pixdim[3] as f64 * qfac;

            Matrix4::new(
                r11 * dx, r12 * dy, r13 * dz, h.quatern_x as f64,
                r21 * dx, r22 * dy, r23 * dz, h.quatern_y as f64,
                r31 * dx, r32 * dy, r33 * dz, h.quatern_z as f64,
                0.0, 0.0, 0.0, 1.0,
            )
        } else {
            // Fallback: pixdim scaling only.
            Matrix4::new(
                h.pixdim[1] as f64, 0.0, 0.0, 0.0,
                0.0, h.pixdim[2] as f64, 0.0, 0.0,
                0.0, 0.0, h.pixdim[3] as f64, 0.0,
                0.0, 0.0, 0.0, 1.0,
            )
        }
    }

    /// True when both volumes share shape and (to tolerance) affine.
    pub fn same_grid(&self, other: &Volume) -> bool {
        if self.shape() != other.shape() {
            return false;
        }
        let diff = self.affine() - other.affine();
        diff.iter().all(|v| v.abs() < 1e-4)
    }
}

/// Read a 3-D NIfTI volume as `f32`.
pub fn read_volume<P: AsRef<Path>>(path: P) -> Result<Volume> {
    let path = path.as_ref();
    let obj = ReaderOptions::new()
        .read_file(path)
        .with_context(|| format!("Failed to read NIfTI file {}", path.display()))?;
    let header = obj.header().clone();

    let volume = obj.into_volume();
    let data = volume
        .into_ndarray::<f32>()
        .with_context(|| format!("Failed to convert {} to ndarray", path.display()))?;

    let ndim = data.ndim();
    let data = data
        .into_dimensionality::<Ix3>()
        .map_err(|_| anyhow::anyhow!("Expected 3D NIfTI file, found {} dimensions", ndim))?;

    Ok(Volume::new(data, header))
}

/// Write a volume, carrying the orientation metadata of its header.
///
/// The `.nii` / `.nii.gz` container choice follows the path extension.
pub fn write_volume<P: AsRef<Path>>(path: P, volume: &Volume) -> Result<()> {
    use nifti::writer::WriterOptions;

    let path = path.as_ref();
    WriterOptions::new(path)
        .reference_header(volume.header())
        .write_nifti(volume.data())
        .with_context(|| format!("Failed to write NIfTI file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use tempfile::tempdir;

    #[test]
    fn test_write_read_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("vol.nii");

        let data: Vec<f32> = (0..3 * 4 * 5).map(|x| x as f32).collect();
        let array = Array3::from_shape_vec((3, 4, 5), data)?;
        let volume = Volume::new(array, NiftiHeader::default());
        write_volume(&path, &volume)?;

        let loaded = read_volume(&path)?;
        assert_eq!(loaded.shape(), [3, 4, 5]);
        assert_eq!(loaded.data()[[0, 0, 0]], 0.0);
        assert_eq!(loaded.data()[[2, 3, 4]], 59.0);
        Ok(())
    }

    #[test]
    fn test_affine_fallback_is_pixdim_scaling() {
        let mut header = NiftiHeader::default();
        header.sform_code = 0;
        header.qform_code = 0;
        header.pixdim = [1.0, 2.0, 3.0, 4.0, 0.0, 0.0, 0.0, 0.0];
        let volume = Volume::new(Array3::zeros((2, 2, 2)), header);

        let affine = volume.affine();
        assert_eq!(affine[(0, 0)], 2.0);
        assert_eq!(affine[(1, 1)], 3.0);
        assert_eq!(affine[(2, 2)], 4.0);
        assert_eq!(affine[(3, 3)], 1.0);
    }

    #[test]
    fn test_same_grid() {
        let a = Volume::new(Array3::zeros((2, 2, 2)), NiftiHeader::default());
        let b = Volume::like(Array3::ones((2, 2, 2)), &a);
        let c = Volume::new(Array3::zeros((3, 2, 2)), NiftiHeader::default());
        assert!(a.same_grid(&b));
        assert!(!a.same_grid(&c));
    }
}
