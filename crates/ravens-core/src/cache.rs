//! Stage cache / idempotency guard.
//!
//! Before executing, every stage checks whether its canonical output
//! artifact already exists; if so the stage is skipped and the existing
//! path returned. Each stage has its own independent cache key, so a
//! cache miss in one stage never invalidates sibling stages' outputs.
//!
//! Two hardenings over a bare existence check:
//!
//! * a sidecar `.stamp` file records a SHA-256 digest over the stage
//!   name, its parameter string, and the paths and contents of its
//!   inputs; a missing or stale stamp forces recomputation, so an old
//!   output is never silently reused after its inputs changed;
//! * stage output is written to a scratch sibling and atomically renamed
//!   into place, so an interrupted stage never leaves a complete-looking
//!   file at the canonical path. The stamp is written only after the
//!   rename succeeds.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{CoreError, Result};

/// Whether a stage actually ran or was satisfied from cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    CacheHit,
    Executed,
}

/// Failure from a cached stage: either the cache machinery itself or
/// the stage body.
#[derive(Debug)]
pub enum StageFailure<E> {
    Cache(CoreError),
    Stage(E),
}

impl<E> From<CoreError> for StageFailure<E> {
    fn from(err: CoreError) -> Self {
        StageFailure::Cache(err)
    }
}

/// Digest over (stage name, parameter string, input paths + contents).
///
/// This is the cache key recorded in the stamp sidecar.
pub fn stamp_digest(stage: &str, params: &str, inputs: &[&Path]) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(stage.as_bytes());
    hasher.update([0]);
    hasher.update(params.as_bytes());
    for input in inputs {
        hasher.update([0]);
        hasher.update(input.display().to_string().as_bytes());
        hasher.update([0]);
        let mut file =
            File::open(input).map_err(|e| CoreError::cache(input.to_path_buf(), e))?;
        io::copy(&mut file, &mut hasher)
            .map_err(|e| CoreError::cache(input.to_path_buf(), e))?;
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Sidecar stamp path for an artifact.
pub fn stamp_path(artifact: &Path) -> PathBuf {
    let mut name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".stamp");
    artifact.with_file_name(name)
}

/// True when every output exists and the primary output's stamp matches
/// the expected digest.
pub fn is_hit(outputs: &[PathBuf], digest: &str) -> bool {
    if outputs.is_empty() || !outputs.iter().all(|p| p.is_file()) {
        return false;
    }
    match fs::read_to_string(stamp_path(&outputs[0])) {
        Ok(recorded) => recorded.trim() == digest,
        Err(_) => false,
    }
}

fn write_stamp(primary: &Path, digest: &str) -> Result<()> {
    let path = stamp_path(primary);
    let tmp = path.with_extension("stamp.tmp");
    fs::write(&tmp, digest).map_err(|e| CoreError::cache(path.clone(), e))?;
    fs::rename(&tmp, &path).map_err(|e| CoreError::cache(path, e))?;
    Ok(())
}

fn scratch_sibling(output: &Path) -> Result<PathBuf> {
    let parent = output.parent().unwrap_or_else(|| Path::new("."));
    let dir = parent.join(".tmp");
    fs::create_dir_all(&dir).map_err(|e| CoreError::cache(dir.clone(), e))?;
    let name = output
        .file_name()
        .ok_or_else(|| {
            CoreError::cache(
                output.to_path_buf(),
                io::Error::new(io::ErrorKind::InvalidInput, "output path has no file name"),
            )
        })?
        .to_owned();
    Ok(dir.join(name))
}

/// Run a single-output stage under the cache.
///
/// The stage body receives a scratch path (same file name, `.tmp`
/// sibling directory, so extension-driven writers behave identically)
/// and must fully write its output there; on success the file is renamed
/// to the canonical path and stamped.
pub fn run_stage<E, F>(
    stage: &str,
    params: &str,
    inputs: &[&Path],
    output: &Path,
    body: F,
) -> std::result::Result<StageOutcome, StageFailure<E>>
where
    F: FnOnce(&Path) -> std::result::Result<(), E>,
{
    let digest = stamp_digest(stage, params, inputs)?;
    if is_hit(std::slice::from_ref(&output.to_path_buf()), &digest) {
        debug!(stage, output = %output.display(), "cache hit, skipping");
        return Ok(StageOutcome::CacheHit);
    }

    let scratch = scratch_sibling(output)?;
    match body(&scratch) {
        Ok(()) => {}
        Err(e) => {
            let _ = fs::remove_file(&scratch);
            return Err(StageFailure::Stage(e));
        }
    }
    fs::rename(&scratch, output)
        .map_err(|e| StageFailure::Cache(CoreError::cache(output.to_path_buf(), e)))?;
    write_stamp(output, &digest)?;
    Ok(StageOutcome::Executed)
}

/// Run a multi-output stage under the cache.
///
/// The stage body receives a scratch directory and returns the files it
/// produced there, one per expected output and in the same order; each
/// is renamed into place and the first output is stamped.
pub fn run_stage_multi<E, F>(
    stage: &str,
    params: &str,
    inputs: &[&Path],
    outputs: &[PathBuf],
    scratch_dir: &Path,
    body: F,
) -> std::result::Result<StageOutcome, StageFailure<E>>
where
    F: FnOnce(&Path) -> std::result::Result<Vec<PathBuf>, E>,
{
    let digest = stamp_digest(stage, params, inputs)?;
    if is_hit(outputs, &digest) {
        debug!(stage, "cache hit, skipping");
        return Ok(StageOutcome::CacheHit);
    }

    fs::create_dir_all(scratch_dir)
        .map_err(|e| StageFailure::Cache(CoreError::cache(scratch_dir.to_path_buf(), e)))?;
    let produced = body(scratch_dir).map_err(StageFailure::Stage)?;
    debug_assert_eq!(produced.len(), outputs.len());
    for (src, dst) in produced.iter().zip(outputs) {
        fs::rename(src, dst)
            .map_err(|e| StageFailure::Cache(CoreError::cache(dst.clone(), e)))?;
    }
    if let Some(primary) = outputs.first() {
        write_stamp(primary, &digest)?;
    }
    Ok(StageOutcome::Executed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path, contents: &str) {
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_miss_then_hit() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.txt");
        touch(&input, "data");
        let output = dir.path().join("out.txt");

        let outcome = run_stage::<CoreError, _>("demo", "p=1", &[&input], &output, |tmp| {
            touch(tmp, "result");
            Ok(())
        })
        .unwrap();
        assert_eq!(outcome, StageOutcome::Executed);
        assert_eq!(fs::read_to_string(&output).unwrap(), "result");

        let outcome = run_stage::<CoreError, _>("demo", "p=1", &[&input], &output, |_| {
            panic!("stage body must not run on a cache hit");
        })
        .unwrap();
        assert_eq!(outcome, StageOutcome::CacheHit);
    }

    #[test]
    fn test_changed_input_invalidates() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.txt");
        touch(&input, "v1");
        let output = dir.path().join("out.txt");

        run_stage::<CoreError, _>("demo", "", &[&input], &output, |tmp| {
            touch(tmp, "r1");
            Ok(())
        })
        .unwrap();

        touch(&input, "v2");
        let outcome = run_stage::<CoreError, _>("demo", "", &[&input], &output, |tmp| {
            touch(tmp, "r2");
            Ok(())
        })
        .unwrap();
        assert_eq!(outcome, StageOutcome::Executed);
        assert_eq!(fs::read_to_string(&output).unwrap(), "r2");
    }

    #[test]
    fn test_changed_params_invalidate() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.txt");
        touch(&input, "data");
        let output = dir.path().join("out.txt");

        run_stage::<CoreError, _>("demo", "scale=1000", &[&input], &output, |tmp| {
            touch(tmp, "r1");
            Ok(())
        })
        .unwrap();

        let outcome =
            run_stage::<CoreError, _>("demo", "scale=500", &[&input], &output, |tmp| {
                touch(tmp, "r2");
                Ok(())
            })
            .unwrap();
        assert_eq!(outcome, StageOutcome::Executed);
    }

    #[test]
    fn test_failed_stage_leaves_no_artifact() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.txt");
        touch(&input, "data");
        let output = dir.path().join("out.txt");

        let result = run_stage("demo", "", &[&input], &output, |tmp| {
            touch(tmp, "partial");
            Err(CoreError::MissingInput(PathBuf::from("x")))
        });
        assert!(matches!(result, Err(StageFailure::Stage(_))));
        assert!(!output.exists());
        assert!(!stamp_path(&output).exists());
    }

    #[test]
    fn test_deleted_artifact_recomputed() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.txt");
        touch(&input, "data");
        let output = dir.path().join("out.txt");

        run_stage::<CoreError, _>("demo", "", &[&input], &output, |tmp| {
            touch(tmp, "r1");
            Ok(())
        })
        .unwrap();

        fs::remove_file(&output).unwrap();
        let outcome = run_stage::<CoreError, _>("demo", "", &[&input], &output, |tmp| {
            touch(tmp, "r2");
            Ok(())
        })
        .unwrap();
        assert_eq!(outcome, StageOutcome::Executed);
    }

    #[test]
    fn test_multi_output_promotion() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.txt");
        touch(&input, "data");
        let outputs = vec![dir.path().join("a.txt"), dir.path().join("b.txt")];
        let scratch = dir.path().join("work");

        let outcome = run_stage_multi::<CoreError, _>(
            "reg",
            "profile=balanced",
            &[&input],
            &outputs,
            &scratch,
            |work| {
                let a = work.join("a.txt");
                let b = work.join("b.txt");
                touch(&a, "A");
                touch(&b, "B");
                Ok(vec![a, b])
            },
        )
        .unwrap();
        assert_eq!(outcome, StageOutcome::Executed);
        assert_eq!(fs::read_to_string(&outputs[0]).unwrap(), "A");
        assert_eq!(fs::read_to_string(&outputs[1]).unwrap(), "B");

        let outcome = run_stage_multi::<CoreError, _>(
            "reg",
            "profile=balanced",
            &[&input],
            &outputs,
            &scratch,
            |_| panic!("stage body must not run on a cache hit"),
        )
        .unwrap();
        assert_eq!(outcome, StageOutcome::CacheHit);
    }

    #[test]
    fn test_stamp_path_keeps_full_name() {
        let p = stamp_path(Path::new("/out/s_ravens_1.nii.gz"));
        assert_eq!(p, PathBuf::from("/out/s_ravens_1.nii.gz.stamp"));
    }
}
