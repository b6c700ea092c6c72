//! Run configuration.
//!
//! Everything a worker needs is carried explicitly in [`ExtractionConfig`];
//! there are no process-wide globals. Values come from [`Default`], the
//! `with_*` builders, or `EXTRACT_*` environment variables via
//! [`ExtractionConfig::from_env`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::extraction::instrument::DEFAULT_TACTIC_PATTERNS;
use crate::lean::session::DEFAULT_MAX_READ_ATTEMPTS;
use crate::lean::SessionConfig;

/// A source tree and the target tree its extractions are written to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryPair {
    pub source: PathBuf,
    pub target: PathBuf,
}

impl DirectoryPair {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Configuration for one extraction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Lean project the sources are elaborated in.
    pub math_dir: PathBuf,
    /// Checkout of the REPL project.
    pub repl_dir: PathBuf,
    /// Lean file defining the `to_theorem` tactic, injected into every source.
    pub aux_block_path: PathBuf,
    /// Tactic names marked as candidates, highest priority first.
    pub tactic_patterns: Vec<String>,
    /// Minimum sibling tactics a marker must guard (1 keeps every marker).
    pub min_sibling_tactics: usize,
    /// Thresholds for which a graded variant of the annotated source is written.
    #[serde(default)]
    pub graded_thresholds: Vec<usize>,
    /// Maximum files processed concurrently.
    pub max_workers: usize,
    /// Merge per-file record files into one file per target directory.
    pub merge_outputs: bool,
    /// Skip the `lake build` preconditions.
    pub skip_build: bool,
    /// Explicit `lake` executable; located on PATH when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lake_path: Option<PathBuf>,
    /// File REPL stderr is appended to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
    /// Wall-clock bound on one REPL response in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_timeout_ms: Option<u64>,
    /// Cap on stdout lines read for one REPL response.
    pub max_read_attempts: u64,
    /// Log full REPL requests at debug level.
    #[serde(default)]
    pub verbose: bool,
    /// Overrides the `lake env repl` command, e.g. for a stand-in checker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_override: Option<(PathBuf, Vec<String>)>,
    /// Source and target trees to process.
    pub directories: Vec<DirectoryPair>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            math_dir: PathBuf::from("AutoML"),
            repl_dir: PathBuf::from("repl"),
            aux_block_path: PathBuf::from("AutoML/to_theorem_prooflength1.lean"),
            tactic_patterns: DEFAULT_TACTIC_PATTERNS.iter().map(|s| s.to_string()).collect(),
            min_sibling_tactics: 1,
            graded_thresholds: Vec::new(),
            max_workers: default_workers(),
            merge_outputs: false,
            skip_build: false,
            lake_path: None,
            log_file: Some(PathBuf::from("process.log")),
            response_timeout_ms: None,
            max_read_attempts: DEFAULT_MAX_READ_ATTEMPTS,
            verbose: false,
            session_override: None,
            directories: vec![
                DirectoryPair::new(
                    "AutoML/.lake/packages/optlib/Optlib/Algorithm",
                    "AutoML/FormalML/ProofLength1/convex",
                ),
                DirectoryPair::new(
                    "AutoML/.lake/packages/FoML/FoML",
                    "AutoML/FormalML/ProofLength1/probability",
                ),
            ],
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl ExtractionConfig {
    /// Build a configuration from `EXTRACT_*` environment variables, falling
    /// back to defaults.
    ///
    /// Directory lists are `:`-separated (`EXTRACT_SOURCE_DIRS`,
    /// `EXTRACT_TARGET_DIRS`) and must have equal length. Tactic patterns are
    /// `,`-separated, as are graded thresholds (`EXTRACT_GRADED_THRESHOLDS`).
    /// Paths may start with `~`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();
        let path = |key: &str| lookup(key).map(|v| expand(&v));
        let parsed = |key: &str| -> Result<Option<u64>> {
            lookup(key)
                .map(|v| {
                    v.trim()
                        .parse::<u64>()
                        .map_err(|e| Error::Config(format!("{}={:?}: {}", key, v, e)))
                })
                .transpose()
        };
        let flag = |key: &str| lookup(key).map(|v| matches!(v.trim(), "1" | "true" | "yes"));

        let graded_thresholds = match lookup("EXTRACT_GRADED_THRESHOLDS") {
            Some(v) => v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<usize>().map_err(|e| {
                        Error::Config(format!("EXTRACT_GRADED_THRESHOLDS={:?}: {}", v, e))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            None => default.graded_thresholds,
        };

        let directories = match (lookup("EXTRACT_SOURCE_DIRS"), lookup("EXTRACT_TARGET_DIRS")) {
            (None, None) => default.directories,
            (sources, targets) => {
                let sources = split_paths(sources.as_deref().unwrap_or(""));
                let targets = split_paths(targets.as_deref().unwrap_or(""));
                if sources.len() != targets.len() {
                    return Err(Error::Config(format!(
                        "mismatched number of source ({}) and target ({}) directories",
                        sources.len(),
                        targets.len()
                    )));
                }
                sources
                    .into_iter()
                    .zip(targets)
                    .map(|(s, t)| DirectoryPair::new(s, t))
                    .collect()
            }
        };

        Ok(Self {
            math_dir: path("EXTRACT_MATH_DIR").unwrap_or(default.math_dir),
            repl_dir: path("EXTRACT_REPL_DIR").unwrap_or(default.repl_dir),
            aux_block_path: path("EXTRACT_AUX_BLOCK").unwrap_or(default.aux_block_path),
            tactic_patterns: lookup("EXTRACT_TACTICS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or(default.tactic_patterns),
            min_sibling_tactics: parsed("EXTRACT_MIN_SIBLING_TACTICS")?
                .map(|n| n as usize)
                .unwrap_or(default.min_sibling_tactics),
            graded_thresholds,
            max_workers: parsed("EXTRACT_MAX_WORKERS")?
                .map(|n| (n as usize).max(1))
                .unwrap_or(default.max_workers),
            merge_outputs: flag("EXTRACT_MERGE").unwrap_or(default.merge_outputs),
            skip_build: flag("EXTRACT_SKIP_BUILD").unwrap_or(default.skip_build),
            lake_path: path("EXTRACT_LAKE").or(default.lake_path),
            log_file: path("EXTRACT_LOG_FILE").or(default.log_file),
            response_timeout_ms: parsed("EXTRACT_TIMEOUT_MS")?.or(default.response_timeout_ms),
            max_read_attempts: parsed("EXTRACT_MAX_READ_ATTEMPTS")?
                .map(|n| n.max(1))
                .unwrap_or(default.max_read_attempts),
            verbose: flag("EXTRACT_VERBOSE").unwrap_or(default.verbose),
            session_override: default.session_override,
            directories,
        })
    }

    /// Set the Lean project and REPL checkout.
    pub fn with_projects(mut self, math_dir: impl Into<PathBuf>, repl_dir: impl Into<PathBuf>) -> Self {
        self.math_dir = math_dir.into();
        self.repl_dir = repl_dir.into();
        self
    }

    /// Set the auxiliary block file.
    pub fn with_aux_block(mut self, path: impl Into<PathBuf>) -> Self {
        self.aux_block_path = path.into();
        self
    }

    /// Set the granularity threshold.
    pub fn with_min_sibling_tactics(mut self, n: usize) -> Self {
        self.min_sibling_tactics = n;
        self
    }

    /// Set the thresholds graded variants are written for.
    pub fn with_graded_thresholds(mut self, thresholds: Vec<usize>) -> Self {
        self.graded_thresholds = thresholds;
        self
    }

    /// Set whether REPL requests are logged in full.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Set the worker count (at least 1).
    pub fn with_max_workers(mut self, n: usize) -> Self {
        self.max_workers = n.max(1);
        self
    }

    /// Set whether per-directory records are merged after the run.
    pub fn with_merge_outputs(mut self, merge: bool) -> Self {
        self.merge_outputs = merge;
        self
    }

    /// Set whether the build preconditions are skipped.
    pub fn with_skip_build(mut self, skip: bool) -> Self {
        self.skip_build = skip;
        self
    }

    /// Set the REPL response timeout.
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.response_timeout_ms = Some(timeout_ms);
        self
    }

    /// Set the REPL stderr log file.
    pub fn with_log_file(mut self, path: Option<PathBuf>) -> Self {
        self.log_file = path;
        self
    }

    /// Run `program args` instead of `lake env repl` for every session.
    pub fn with_session_program(mut self, program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        self.session_override = Some((program.into(), args));
        self
    }

    /// Replace the directory pairs.
    pub fn with_directories(mut self, directories: Vec<DirectoryPair>) -> Self {
        self.directories = directories;
        self
    }

    /// Session configuration every extraction and verification session uses.
    pub fn session_config(&self, lake: &Path) -> SessionConfig {
        let mut session = match &self.session_override {
            Some((program, args)) => {
                let mut session = SessionConfig::program(program.clone(), args.clone());
                session.working_dir = Some(self.math_dir.clone());
                session
            }
            None => {
                let mut session = SessionConfig::lake_env(self.math_dir.clone(), &self.repl_dir);
                session.program = lake.to_path_buf();
                session
            }
        };

        session = session
            .with_max_read_attempts(self.max_read_attempts)
            .with_verbose(self.verbose);
        if let Some(ms) = self.response_timeout_ms {
            session = session.with_timeout(ms);
        }
        if let Some(log) = &self.log_file {
            session = session.with_stderr_log(log.clone());
        }
        session
    }
}

fn expand(value: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(value.trim()).as_ref())
}

fn split_paths(value: &str) -> Vec<PathBuf> {
    value
        .split(':')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(expand)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ExtractionConfig::default();
        assert_eq!(config.min_sibling_tactics, 1);
        assert!(config.max_workers >= 1);
        assert_eq!(
            config.tactic_patterns,
            vec!["rw", "simp", "apply", "exact", "simp_rw"]
        );
        assert_eq!(config.directories.len(), 2);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = ExtractionConfig::from_lookup(lookup(&[
            ("EXTRACT_MATH_DIR", "/srv/AutoML"),
            ("EXTRACT_TACTICS", "rw, simp"),
            ("EXTRACT_MIN_SIBLING_TACTICS", "3"),
            ("EXTRACT_MAX_WORKERS", "0"),
            ("EXTRACT_SKIP_BUILD", "true"),
            ("EXTRACT_GRADED_THRESHOLDS", "2, 3,5"),
            ("EXTRACT_VERBOSE", "1"),
            ("EXTRACT_SOURCE_DIRS", "a:b"),
            ("EXTRACT_TARGET_DIRS", "out/a:out/b"),
        ]))
        .unwrap();

        assert_eq!(config.math_dir, PathBuf::from("/srv/AutoML"));
        assert_eq!(config.tactic_patterns, vec!["rw", "simp"]);
        assert_eq!(config.min_sibling_tactics, 3);
        assert_eq!(config.max_workers, 1);
        assert!(config.skip_build);
        assert_eq!(config.graded_thresholds, vec![2, 3, 5]);
        assert!(config.verbose);
        assert!(config.session_config(Path::new("lake")).verbose);
        assert_eq!(
            config.directories,
            vec![DirectoryPair::new("a", "out/a"), DirectoryPair::new("b", "out/b")]
        );
    }

    #[test]
    fn test_tilde_is_expanded() {
        let config = ExtractionConfig::from_lookup(lookup(&[("EXTRACT_REPL_DIR", "~/repl")])).unwrap();
        assert!(!config.repl_dir.to_string_lossy().starts_with('~'));
        assert!(config.repl_dir.ends_with("repl"));
    }

    #[test]
    fn test_mismatched_directories_rejected() {
        let err = ExtractionConfig::from_lookup(lookup(&[
            ("EXTRACT_SOURCE_DIRS", "a:b"),
            ("EXTRACT_TARGET_DIRS", "out/a"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.is_fatal_to_run());
    }

    #[test]
    fn test_bad_graded_threshold_rejected() {
        let err = ExtractionConfig::from_lookup(lookup(&[("EXTRACT_GRADED_THRESHOLDS", "2,x")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_bad_number_rejected() {
        let err = ExtractionConfig::from_lookup(lookup(&[("EXTRACT_MAX_WORKERS", "many")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_session_config_runs_repl_through_lake() {
        let config = ExtractionConfig::default()
            .with_projects("/w/AutoML", "/w/repl")
            .with_timeout(5_000);
        let session = config.session_config(Path::new("/opt/elan/bin/lake"));

        assert_eq!(session.program, PathBuf::from("/opt/elan/bin/lake"));
        assert_eq!(session.args, vec!["env", "/w/repl/.lake/build/bin/repl"]);
        assert_eq!(session.working_dir, Some(PathBuf::from("/w/AutoML")));
        assert_eq!(session.response_timeout_ms, Some(5_000));
        assert_eq!(session.stderr_log, Some(PathBuf::from("process.log")));
    }

    #[test]
    fn test_session_override() {
        let config = ExtractionConfig::default()
            .with_session_program("sh", vec!["-c".to_string(), "cat".to_string()])
            .with_log_file(None);
        let session = config.session_config(Path::new("lake"));
        assert_eq!(session.program, PathBuf::from("sh"));
        assert_eq!(session.args, vec!["-c", "cat"]);
        assert!(session.stderr_log.is_none());
    }
}
