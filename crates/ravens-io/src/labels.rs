//! Label-mask decomposition and the label manifest.
//!
//! A segmentation volume is split into one binary mask per distinct
//! nonzero label, plus a manifest file listing the label IDs one per
//! line in discovery (ascending) order. Label IDs are never renumbered
//! after the manifest is created.

use anyhow::{bail, Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::nifti_io::{write_volume, Volume};

/// One manifest entry: a label ID and its binary-mask volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEntry {
    pub id: u32,
    pub mask: PathBuf,
}

/// An ordered set of distinct label IDs with their mask volumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelManifest {
    entries: Vec<LabelEntry>,
}

impl LabelManifest {
    pub fn entries(&self) -> &[LabelEntry] {
        &self.entries
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.iter().map(|e| e.id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the manifest file: one label ID per line, manifest order.
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut text = String::new();
        for entry in &self.entries {
            text.push_str(&entry.id.to_string());
            text.push('\n');
        }
        fs::write(path, text)
            .with_context(|| format!("Failed to write label manifest {}", path.display()))?;
        Ok(())
    }

    /// Read a manifest file back, resolving mask paths through the
    /// given naming function.
    pub fn read(path: &Path, mask_path: impl Fn(u32) -> PathBuf) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read label manifest {}", path.display()))?;
        let mut entries = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let id: u32 = line
                .parse()
                .with_context(|| format!("Invalid label ID '{line}' in {}", path.display()))?;
            entries.push(LabelEntry {
                id,
                mask: mask_path(id),
            });
        }
        Ok(Self { entries })
    }
}

/// Distinct nonzero labels present in a segmentation, ascending.
///
/// With a subset filter, only the requested labels that actually occur
/// are kept, still in ascending order.
pub fn discover_labels(segmentation: &Volume, subset: Option<&[u32]>) -> Vec<u32> {
    let mut present = BTreeSet::new();
    for &v in segmentation.data().iter() {
        if v > 0.0 {
            present.insert(v.round() as u32);
        }
    }
    match subset {
        Some(wanted) => {
            let wanted: BTreeSet<u32> = wanted.iter().copied().collect();
            present.intersection(&wanted).copied().collect()
        }
        None => present.into_iter().collect(),
    }
}

/// Split a segmentation into one binary mask per label and build the
/// manifest.
///
/// Mask volumes carry the segmentation's header, so orientation
/// metadata survives the decomposition.
pub fn create_label_masks(
    segmentation: &Volume,
    subset: Option<&[u32]>,
    mask_path: impl Fn(u32) -> PathBuf,
) -> Result<LabelManifest> {
    let labels = discover_labels(segmentation, subset);
    if labels.is_empty() {
        bail!("No labels to process: segmentation has no nonzero labels matching the request");
    }

    let mut entries = Vec::with_capacity(labels.len());
    for id in labels {
        let mask_data = segmentation
            .data()
            .mapv(|v| if v.round() as u32 == id && v > 0.0 { 1.0 } else { 0.0 });
        let mask = Volume::like(mask_data, segmentation);
        let path = mask_path(id);
        write_volume(&path, &mask)?;
        info!(label = id, path = %path.display(), "wrote label mask");
        entries.push(LabelEntry { id, mask: path });
    }

    Ok(LabelManifest { entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use nifti::NiftiHeader;
    use tempfile::tempdir;

    fn segmentation_with(values: &[f32]) -> Volume {
        let mut data = Array3::zeros((2, 2, 2));
        for (i, &v) in values.iter().enumerate() {
            data[[i / 4, (i / 2) % 2, i % 2]] = v;
        }
        Volume::new(data, NiftiHeader::default())
    }

    #[test]
    fn test_discover_excludes_background() {
        let seg = segmentation_with(&[0.0, 1.0, 2.0, 5.0, 0.0, 1.0, 2.0, 5.0]);
        assert_eq!(discover_labels(&seg, None), vec![1, 2, 5]);
    }

    #[test]
    fn test_discover_subset_keeps_present_only() {
        let seg = segmentation_with(&[0.0, 1.0, 2.0, 5.0, 0.0, 1.0, 2.0, 5.0]);
        assert_eq!(discover_labels(&seg, Some(&[2, 7])), vec![2]);
    }

    #[test]
    fn test_create_masks_and_manifest() -> Result<()> {
        let dir = tempdir()?;
        let seg = segmentation_with(&[0.0, 1.0, 2.0, 5.0, 0.0, 1.0, 2.0, 5.0]);
        let mask_path = |id: u32| dir.path().join(format!("label_{id}.nii"));

        let manifest = create_label_masks(&seg, None, mask_path)?;
        assert_eq!(manifest.ids().collect::<Vec<_>>(), vec![1, 2, 5]);
        for entry in manifest.entries() {
            assert!(entry.mask.is_file());
            let mask = crate::nifti_io::read_volume(&entry.mask)?;
            let ones = mask.data().iter().filter(|&&v| v == 1.0).count();
            assert_eq!(ones, 2);
        }

        let manifest_path = dir.path().join("labelList.csv");
        manifest.write(&manifest_path)?;
        assert_eq!(fs::read_to_string(&manifest_path)?, "1\n2\n5\n");

        let reread = LabelManifest::read(&manifest_path, mask_path)?;
        assert_eq!(reread, manifest);
        Ok(())
    }

    #[test]
    fn test_no_matching_labels_is_an_error() {
        let seg = segmentation_with(&[0.0; 8]);
        let result = create_label_masks(&seg, None, |id| PathBuf::from(format!("{id}.nii")));
        assert!(result.is_err());
    }
}
