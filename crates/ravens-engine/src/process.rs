//! Child-process invocation for external numerical tools.

use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::error::{EngineError, Result};

/// Maximum stderr bytes carried into an error message.
const STDERR_LIMIT: usize = 2048;

/// Run an external tool to completion, failing on nonzero exit.
///
/// The ITK thread count is an explicit configuration value passed to
/// the child's environment on every launch, never inherited ambient
/// process state.
pub fn run_tool(stage: &str, program: &str, args: &[String], threads: u32) -> Result<()> {
    debug!(stage, program, ?args, "launching engine process");

    let output = Command::new(program)
        .args(args)
        .env("ITK_GLOBAL_DEFAULT_NUMBER_OF_THREADS", threads.to_string())
        .env("OMP_NUM_THREADS", threads.to_string())
        .output()
        .map_err(|source| EngineError::Spawn {
            stage: stage.to_string(),
            program: program.to_string(),
            source,
        })?;

    if output.status.success() {
        Ok(())
    } else {
        let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if stderr.len() > STDERR_LIMIT {
            let mut cut = stderr.len() - STDERR_LIMIT;
            while !stderr.is_char_boundary(cut) {
                cut += 1;
            }
            stderr = format!("...{}", &stderr[cut..]);
        }
        Err(EngineError::ProcessFailed {
            stage: stage.to_string(),
            program: program.to_string(),
            status: output.status.to_string(),
            stderr,
        })
    }
}

/// Check that every artifact a stage was expected to produce exists.
pub fn ensure_artifacts<'a>(
    stage: &str,
    paths: impl IntoIterator<Item = &'a Path>,
) -> Result<()> {
    for path in paths {
        if !path.is_file() {
            return Err(EngineError::missing_artifact(stage, path));
        }
    }
    Ok(())
}
