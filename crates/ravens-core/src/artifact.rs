//! Deterministic artifact path scheme.
//!
//! Every stage writes to a canonical path derived from the output
//! directory, the run prefix, and a stage-specific suffix; per-label
//! artifacts additionally embed the label ID. The existence of an
//! artifact at its canonical path is what the stage cache keys on, so
//! the scheme must be stable across runs.

use std::path::{Path, PathBuf};

/// Canonical output paths for one pipeline run.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    out_dir: PathBuf,
    prefix: String,
}

impl ArtifactLayout {
    pub fn new(out_dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            out_dir: out_dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn named(&self, suffix: &str) -> PathBuf {
        self.out_dir.join(format!("{}{}", self.prefix, suffix))
    }

    /// Prefix handed to the registration engine; the engine appends its
    /// own per-transform suffixes.
    pub fn registration_prefix(&self) -> PathBuf {
        self.named("_reg")
    }

    /// The single dense field equivalent to the full forward chain.
    pub fn composed_field(&self) -> PathBuf {
        self.named("_composed_warp.nii.gz")
    }

    /// Local volume-change field derived from the composed field.
    pub fn jacobian(&self) -> PathBuf {
        self.named("_jacobian.nii.gz")
    }

    /// Subject image resampled onto the template grid.
    pub fn warped_image(&self) -> PathBuf {
        self.named("_warped.nii.gz")
    }

    /// Binary mask for one label, in subject space.
    pub fn label_mask(&self, label: u32) -> PathBuf {
        self.named(&format!("_label_{label}.nii.gz"))
    }

    /// Binary mask for one label, warped onto the template grid.
    pub fn warped_mask(&self, label: u32) -> PathBuf {
        self.named(&format!("_label_{label}_warped.nii.gz"))
    }

    /// RAVENS density map for one label.
    pub fn ravens_map(&self, label: u32) -> PathBuf {
        self.named(&format!("_ravens_{label}.nii.gz"))
    }

    /// Manifest of discovered label IDs, one per line.
    pub fn label_manifest(&self) -> PathBuf {
        self.named("_labelList.csv")
    }

    /// Per-run scratch directory for in-flight writes, exclusively owned
    /// by one pipeline invocation. Concurrent invocations targeting the
    /// same output prefix must be serialized by the caller.
    pub fn scratch_dir(&self) -> PathBuf {
        self.out_dir.join(format!(".{}_work", self.prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_deterministic() {
        let a = ArtifactLayout::new("/out", "subj01");
        let b = ArtifactLayout::new("/out", "subj01");
        assert_eq!(a.composed_field(), b.composed_field());
        assert_eq!(a.ravens_map(5), b.ravens_map(5));
    }

    #[test]
    fn test_label_artifacts_embed_id() {
        let layout = ArtifactLayout::new("/out", "subj01");
        assert_eq!(
            layout.warped_mask(2),
            PathBuf::from("/out/subj01_label_2_warped.nii.gz")
        );
        assert_eq!(
            layout.ravens_map(2),
            PathBuf::from("/out/subj01_ravens_2.nii.gz")
        );
    }

    #[test]
    fn test_stage_suffixes_distinct() {
        let layout = ArtifactLayout::new("/out", "s");
        let paths = [
            layout.composed_field(),
            layout.jacobian(),
            layout.warped_image(),
            layout.label_mask(1),
            layout.warped_mask(1),
            layout.ravens_map(1),
            layout.label_manifest(),
        ];
        for (i, a) in paths.iter().enumerate() {
            for b in &paths[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
