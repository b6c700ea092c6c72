//! Lean-specific types for the REPL integration.
//!
//! These types model the subset of the leanprover-community/repl JSON
//! protocol the extraction engine needs: whole-file commands in, compiler
//! messages out.
//! See: https://github.com/leanprover-community/repl

use serde::{Deserialize, Serialize};

/// A command sent to the Lean REPL.
///
/// Each submission is a complete Lean source text elaborated in a fresh
/// environment, so no `env` id is ever carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeanCommand {
    /// The Lean code to execute.
    pub cmd: String,
}

impl LeanCommand {
    /// Create a new command execution request.
    pub fn command(cmd: impl Into<String>) -> Self {
        Self { cmd: cmd.into() }
    }
}

/// Response from the Lean REPL.
///
/// Fields the engine does not consume (`env`, `sorries`, ...) are ignored on
/// decode.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeanResponse {
    /// Compiler messages (info, warning, error).
    #[serde(default)]
    pub messages: Vec<LeanMessage>,
}

impl LeanResponse {
    /// Check if there are any errors.
    pub fn has_errors(&self) -> bool {
        has_errors(&self.messages)
    }
}

/// Whether any message in the slice has error severity.
pub fn has_errors(messages: &[LeanMessage]) -> bool {
    messages
        .iter()
        .any(|m| m.severity == MessageSeverity::Error)
}

/// A message from the Lean compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeanMessage {
    /// Message severity (error, warning, info).
    pub severity: MessageSeverity,

    /// Start position in the source.
    #[serde(default)]
    pub pos: Option<Position>,

    /// End position in the source.
    #[serde(rename = "endPos", default)]
    pub end_pos: Option<Position>,

    /// Message content.
    pub data: String,
}

impl LeanMessage {
    /// Create a message spanning `pos..end_pos`.
    pub fn new(
        severity: MessageSeverity,
        data: impl Into<String>,
        pos: Option<Position>,
        end_pos: Option<Position>,
    ) -> Self {
        Self {
            severity,
            pos,
            end_pos,
            data: data.into(),
        }
    }

    /// Shorthand for an info message spanning `pos..end_pos`.
    pub fn info(data: impl Into<String>, pos: Position, end_pos: Position) -> Self {
        Self::new(MessageSeverity::Info, data, Some(pos), Some(end_pos))
    }

    /// Render as `line:col: severity: data` for logs.
    pub fn located(&self) -> String {
        match &self.pos {
            Some(p) => format!("{}:{}: {}: {}", p.line, p.column, self.severity, self.data),
            None => format!("{}: {}", self.severity, self.data),
        }
    }
}

/// Message severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for MessageSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// Position in source code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// 1-indexed line number.
    pub line: u32,
    /// 0-indexed column number.
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}
