//! Error types for extract-core.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias using extract-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while extracting sub-proofs.
#[derive(Error, Debug)]
pub enum Error {
    /// The REPL never produced a decodable response within the read budget.
    #[error("Lean REPL response did not decode after {attempts} line reads")]
    ProtocolDecodeExhausted { attempts: u64 },

    /// The instrumented file produced an error diagnostic.
    #[error("Lean reported an error in {}: {message}", file.display())]
    SourceDiagnostic { file: PathBuf, message: String },

    /// Subprocess communication error
    #[error("Subprocess communication error: {0}")]
    SubprocessComm(String),

    /// Timeout during operation
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Reading or writing a source or output artifact failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required build artifact is missing or its build failed.
    #[error("Build precondition failed: {0}")]
    BuildPrecondition(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an I/O error tagged with the path it happened on.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a source diagnostic error.
    pub fn source_diagnostic(file: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::SourceDiagnostic {
            file: file.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a build precondition error.
    pub fn build_precondition(message: impl Into<String>) -> Self {
        Self::BuildPrecondition(message.into())
    }

    /// Whether this error aborts the whole run rather than a single file.
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(self, Self::BuildPrecondition(_) | Self::Config(_))
    }
}
