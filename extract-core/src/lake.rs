//! Build preconditions for the Lean checking environment.
//!
//! Extraction needs two built Lake projects: the math project the sources
//! are elaborated in and the REPL checkout providing the `repl` binary.
//! Each is built only when its `.lake` directory is missing, so repeated
//! runs are cheap.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::lean::session::REPL_BINARY;

/// Runs `lake build` in Lean projects.
#[derive(Debug, Clone)]
pub struct LakeBuilder {
    lake: PathBuf,
}

impl LakeBuilder {
    /// Use an explicit `lake` executable.
    pub fn new(lake: impl Into<PathBuf>) -> Self {
        Self { lake: lake.into() }
    }

    /// Find `lake`, preferring an explicit path, then PATH, then elan's
    /// default install location.
    pub fn locate(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self::new(path));
        }

        if let Ok(path) = which::which("lake") {
            return Ok(Self::new(path));
        }

        let elan = shellexpand::tilde("~/.elan/bin/lake");
        if Path::new(elan.as_ref()).exists() {
            return Ok(Self::new(elan.as_ref()));
        }

        Err(Error::Config(
            "lake binary not found. Set EXTRACT_LAKE or install elan.".to_string(),
        ))
    }

    /// Path of the `lake` executable.
    pub fn lake(&self) -> &Path {
        &self.lake
    }

    /// Run `lake build [target]` in `project_dir`.
    pub async fn build(&self, project_dir: &Path, target: Option<&str>) -> Result<()> {
        let label = target.unwrap_or("default targets");
        info!(project = %project_dir.display(), target = label, "Running lake build");

        let mut cmd = Command::new(&self.lake);
        cmd.arg("build").current_dir(project_dir);
        if let Some(target) = target {
            cmd.arg(target);
        }

        let output = cmd.output().await.map_err(|e| {
            Error::build_precondition(format!(
                "failed to run {} in {}: {}",
                self.lake.display(),
                project_dir.display(),
                e
            ))
        })?;

        debug!("lake build output: {}", String::from_utf8_lossy(&output.stdout).trim());

        if !output.status.success() {
            return Err(Error::build_precondition(format!(
                "lake build {} in {} exited with {}: {}",
                label,
                project_dir.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(())
    }

    /// Build whatever is missing for extraction and check the REPL binary.
    pub async fn ensure_artifacts(&self, math_dir: &Path, repl_dir: &Path) -> Result<()> {
        if !math_dir.join(".lake").is_dir() {
            self.build(math_dir, Some("mathlib")).await?;
            self.build(math_dir, None).await?;
        }

        if !repl_dir.join(".lake").is_dir() {
            self.build(repl_dir, Some("repl")).await?;
        }

        let binary = repl_dir.join(REPL_BINARY);
        if !binary.is_file() {
            return Err(Error::build_precondition(format!(
                "REPL binary missing at {}",
                binary.display()
            )));
        }

        Ok(())
    }
}
