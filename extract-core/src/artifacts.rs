//! On-disk layout of extraction inputs and outputs.
//!
//! A source `X.lean` under a source tree maps to `X_extract.lean` at the
//! mirrored location under its target tree. Next to it live the records
//! (`X_extract.json`), the instrumented source as submitted
//! (`X_extract_fullcontext.lean`) and any graded variants
//! (`X_extract_min{N}.lean`).

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::extraction::{Extraction, ExtractionRecord};

/// Suffix appended to the stem of every target file.
pub const EXTRACT_SUFFIX: &str = "_extract";

/// One source file and where its extractions go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileTask {
    pub source: PathBuf,
    pub target: PathBuf,
}

impl FileTask {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Record file next to the target: `X_extract.json`.
    pub fn records_path(&self) -> PathBuf {
        self.target.with_extension("json")
    }

    /// Instrumented source next to the target: `X_extract_fullcontext.lean`.
    pub fn fullcontext_path(&self) -> PathBuf {
        let stem = self
            .target
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        self.target.with_file_name(format!("{}_fullcontext.lean", stem))
    }

    /// Annotated source filtered at `threshold`: `X_extract_min{threshold}.lean`.
    pub fn graded_path(&self, threshold: usize) -> PathBuf {
        let stem = self
            .target
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        self.target.with_file_name(format!("{}_min{}.lean", stem, threshold))
    }
}

/// Every `.lean` file below `source_dir`, mapped to the mirrored
/// `_extract.lean` path below `target_dir`. Target directories are created.
pub fn collect_tasks(source_dir: &Path, target_dir: &Path) -> Result<Vec<FileTask>> {
    fs::create_dir_all(target_dir).map_err(|e| Error::io(target_dir, e))?;

    let mut tasks = Vec::new();
    for source in walk(source_dir, "**/*.lean")? {
        let rel = source.strip_prefix(source_dir).unwrap_or(&source);
        let stem = rel
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let target = target_dir
            .join(rel)
            .with_file_name(format!("{}{}.lean", stem, EXTRACT_SUFFIX));

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        tasks.push(FileTask::new(source, target));
    }

    Ok(tasks)
}

/// Files below `dir` matching `pattern`, in path order.
fn walk(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let root = glob::Pattern::escape(&dir.to_string_lossy());
    let full = format!("{}/{}", root.trim_end_matches('/'), pattern);
    let entries = glob::glob(&full).map_err(|e| Error::Config(format!("{}: {}", full, e)))?;

    let mut paths: Vec<PathBuf> = entries.flatten().filter(|p| p.is_file()).collect();
    paths.sort();
    Ok(paths)
}

/// Statement file contents: the header, then every goal separated by two
/// blank lines.
pub fn statement_file(header: &str, goals: &[String]) -> String {
    format!("{}\n{}", header, goals.join("\n\n\n"))
}

/// Write the statement and record files for one task.
pub fn write_outputs(task: &FileTask, header: &str, extraction: &Extraction) -> Result<()> {
    fs::write(&task.target, statement_file(header, &extraction.goals))
        .map_err(|e| Error::io(&task.target, e))?;

    let path = task.records_path();
    fs::write(&path, records_json(&extraction.records)?).map_err(|e| Error::io(&path, e))?;
    Ok(())
}

/// Remove the statement and record files of a previous run, if any.
pub fn clear_outputs(task: &FileTask) -> Result<()> {
    for path in [task.target.clone(), task.records_path()] {
        match fs::remove_file(&path) {
            Ok(()) => debug!(path = %path.display(), "Removed stale output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io(&path, e)),
        }
    }
    Ok(())
}

/// Write one graded variant of the annotated source.
pub fn write_graded(task: &FileTask, threshold: usize, text: &str) -> Result<()> {
    let path = task.graded_path(threshold);
    fs::write(&path, text).map_err(|e| Error::io(&path, e))
}

/// Write the instrumented source as submitted.
pub fn write_fullcontext(task: &FileTask, text: &str) -> Result<()> {
    let path = task.fullcontext_path();
    fs::write(&path, text).map_err(|e| Error::io(&path, e))
}

/// Records as JSON indented by four spaces.
pub fn records_json(records: &[ExtractionRecord]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    records.serialize(&mut serializer)?;
    Ok(out)
}

/// Merge every `.json` file below each directory into `<parent>/<dir>.json`.
///
/// Arrays are concatenated and any other value is appended as one element.
/// Unreadable files are skipped. Returns each output path with its element
/// count.
pub fn merge_records<P: AsRef<Path>>(dirs: &[P]) -> Result<Vec<(PathBuf, usize)>> {
    let mut merged = Vec::new();

    for dir in dirs {
        let dir = dir.as_ref();
        let mut all: Vec<Value> = Vec::new();

        for path in walk(dir, "**/*.json")? {
            match read_json(&path) {
                Ok(Value::Array(items)) => all.extend(items),
                Ok(other) => all.push(other),
                Err(e) => warn!(path = %path.display(), "Skipping unreadable record file: {}", e),
            }
        }

        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "records".to_string());
        let output = dir
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(format!("{}.json", name));

        let body = serde_json::to_string_pretty(&all)?;
        fs::write(&output, body).map_err(|e| Error::io(&output, e))?;
        info!(output = %output.display(), count = all.len(), "Merged record files");
        merged.push((output, all.len()));
    }

    Ok(merged)
}

/// Total records across every `*_extract.json` file below `target_dir`.
///
/// Arrays count their elements and objects their keys; anything else or an
/// unreadable file counts zero.
pub fn count_records(target_dir: &Path) -> Result<usize> {
    let mut total = 0;
    for path in walk(target_dir, &format!("**/*{}.json", EXTRACT_SUFFIX))? {
        match read_json(&path) {
            Ok(Value::Array(items)) => total += items.len(),
            Ok(Value::Object(map)) => total += map.len(),
            Ok(_) => warn!(path = %path.display(), "Unexpected record file structure"),
            Err(e) => warn!(path = %path.display(), "Failed to parse record file: {}", e),
        }
    }
    Ok(total)
}

fn read_json(path: &Path) -> Result<Value> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(serde_json::from_str(&text)?)
}
