//! Core types for sub-proof extraction.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Library a source file belongs to; selects the theorem header imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Library {
    Optlib,
    #[serde(rename = "foml")]
    FoML,
}

impl Library {
    /// Infer the library from a source path. Anything outside an `optlib`
    /// package is treated as FoML.
    pub fn from_path(path: &Path) -> Self {
        if path.to_string_lossy().contains("optlib") {
            Self::Optlib
        } else {
            Self::FoML
        }
    }

    /// Import lines every extracted theorem is checked under.
    pub fn header_imports(&self) -> [&'static str; 2] {
        match self {
            Self::Optlib => ["import Mathlib", "import Optlib"],
            Self::FoML => ["import Mathlib", "import FoML"],
        }
    }

    /// Header extracted theorems are checked and published under: the
    /// library imports, a blank line, then the source file's `open` lines.
    pub fn theorem_header<S: AsRef<str>>(&self, open_lines: &[S]) -> String {
        let mut parts: Vec<&str> = self.header_imports().to_vec();
        parts.push("");
        parts.extend(open_lines.iter().map(|l| l.as_ref()));
        parts.join("\n")
    }
}

impl std::fmt::Display for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Optlib => write!(f, "optlib"),
            Self::FoML => write!(f, "foml"),
        }
    }
}

/// A Lean source file split into lines.
///
/// Lines keep their terminators so the file can be reassembled verbatim.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path the file was read from.
    pub path: PathBuf,
    /// Lines including their trailing `\n`.
    pub lines: Vec<String>,
    /// Library affiliation.
    pub library: Library,
}

impl SourceFile {
    /// Build a source file from text already in memory.
    pub fn from_text(path: impl Into<PathBuf>, text: &str) -> Self {
        let path = path.into();
        let library = Library::from_path(&path);
        Self {
            lines: text.split_inclusive('\n').map(str::to_string).collect(),
            path,
            library,
        }
    }

    /// Read a source file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Ok(Self::from_text(path, &text))
    }

    /// Name recorded in extraction records: the path below `.lake/packages/`
    /// when the file lives in a dependency, otherwise the full path.
    pub fn record_name(&self) -> String {
        let full = self.path.to_string_lossy();
        match full.split_once(".lake/packages/") {
            Some((_, rest)) if !rest.is_empty() => rest.to_string(),
            _ => full.to_string(),
        }
    }
}

/// A verified, standalone sub-proof with its surrounding tactic context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    /// Running index within the file, starting at 0.
    pub index: usize,
    /// Source file the sub-proof came from.
    pub filename: String,
    /// Line of the marked tactic in the original source.
    pub line: i64,
    /// Proof state before the marked tactic ran.
    pub tactic_state_before: String,
    /// The marked tactic.
    pub tactic: String,
    /// Proof states after the marked tactic ran.
    pub tactic_state_after: String,
    /// Tactic state of the extracted theorem.
    pub goal: String,
    /// Imports and `open` lines the statement is checked under.
    #[serde(rename = "theorem_header")]
    pub header: String,
    /// Extracted theorem statement.
    pub formal_statement: String,
    /// Extracted theorem statement with its full local context.
    pub full_formal_statement: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_from_path() {
        let optlib = Path::new("AutoML/.lake/packages/optlib/Optlib/Algorithm/GD.lean");
        let foml = Path::new("AutoML/.lake/packages/FoML/FoML/Rademacher.lean");
        assert_eq!(Library::from_path(optlib), Library::Optlib);
        assert_eq!(Library::from_path(foml), Library::FoML);
        assert_eq!(Library::Optlib.header_imports()[1], "import Optlib");
        assert_eq!(Library::FoML.header_imports()[1], "import FoML");
    }

    #[test]
    fn test_theorem_header_layout() {
        let header = Library::Optlib.theorem_header(&["open Real", "open Finset"]);
        assert_eq!(header, "import Mathlib\nimport Optlib\n\nopen Real\nopen Finset");

        let bare = Library::FoML.theorem_header::<&str>(&[]);
        assert_eq!(bare, "import Mathlib\nimport FoML\n");
    }

    #[test]
    fn test_source_file_keeps_terminators() {
        let file = SourceFile::from_text("A.lean", "import Mathlib\n\n  simp\nend");
        assert_eq!(file.lines, vec!["import Mathlib\n", "\n", "  simp\n", "end"]);
    }

    #[test]
    fn test_record_name_strips_package_prefix() {
        let file = SourceFile::from_text("/w/AutoML/.lake/packages/optlib/Optlib/GD.lean", "");
        assert_eq!(file.record_name(), "optlib/Optlib/GD.lean");

        let local = SourceFile::from_text("/w/Local.lean", "");
        assert_eq!(local.record_name(), "/w/Local.lean");
    }

    #[test]
    fn test_record_serializes_theorem_header() {
        let record = ExtractionRecord {
            index: 0,
            filename: "GD.lean".to_string(),
            line: 12,
            tactic_state_before: String::new(),
            tactic: "rw foo".to_string(),
            tactic_state_after: String::new(),
            goal: String::new(),
            header: "import Mathlib".to_string(),
            formal_statement: String::new(),
            full_formal_statement: String::new(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["theorem_header"], "import Mathlib");
        assert!(json.get("header").is_none());
    }
}
