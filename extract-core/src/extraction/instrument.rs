//! Marker insertion into Lean proof sources.
//!
//! Every line that starts with one of the configured tactics gets the
//! `to_theorem` marker tactic prepended. The checking process then reports
//! the proof state around each marked tactic as a candidate theorem. The
//! auxiliary block defining `to_theorem` is spliced in right after the
//! imports.

use regex::Regex;

use crate::error::{Error, Result};

/// Marker tactic inserted in front of candidate tactics.
pub const MARKER: &str = "to_theorem";

/// Tactics marked by default, in priority order.
pub const DEFAULT_TACTIC_PATTERNS: &[&str] = &["rw", "simp", "apply", "exact", "simp_rw"];

/// Any line containing this enters (or widens) a conv block.
const CONV_KEYWORD: &str = "conv ";

/// Matches a line's trimmed content against an ordered tactic list.
#[derive(Debug, Clone)]
pub struct TacticMatcher {
    tactics: Vec<String>,
    pattern: Option<Regex>,
}

impl TacticMatcher {
    /// Build a matcher. Earlier tactics win when several could match.
    pub fn new<S: AsRef<str>>(tactics: &[S]) -> Result<Self> {
        let tactics: Vec<String> = tactics
            .iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        if tactics.is_empty() {
            return Ok(Self {
                tactics,
                pattern: None,
            });
        }

        // Alternation is leftmost-first, so list order is the priority order.
        let alternation = tactics
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"^({})(?:\s|;|$)", alternation))
            .map_err(|e| Error::Config(format!("Invalid tactic pattern: {}", e)))?;

        Ok(Self {
            tactics,
            pattern: Some(pattern),
        })
    }

    /// Matcher over [`DEFAULT_TACTIC_PATTERNS`].
    pub fn with_defaults() -> Result<Self> {
        Self::new(DEFAULT_TACTIC_PATTERNS)
    }

    /// The configured tactics in priority order.
    pub fn tactics(&self) -> &[String] {
        &self.tactics
    }

    /// Return the tactic keyword `content` starts with, if any.
    ///
    /// The keyword must be followed by whitespace, `;`, or the end of the
    /// content, so `simp_rw` never matches `simp`.
    pub fn match_start<'a>(&self, content: &'a str) -> Option<&'a str> {
        let captures = self.pattern.as_ref()?.captures(content)?;
        captures.get(1).map(|m| m.as_str())
    }
}

/// Per-file state threaded through the instrumentation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstrumentationState {
    /// Whether the current line is inside a conv block.
    pub in_conv_block: bool,
    /// Smallest indentation of a conv-entry line in the current block.
    pub conv_min_indent: Option<usize>,
    /// Whether the auxiliary definition block has been emitted.
    pub marker_injected: bool,
    /// Whether an import line has been seen.
    pub imported: bool,
}

impl InstrumentationState {
    /// Update the conv-block tracking with one line and report whether the
    /// line is inside a conv block.
    pub fn observe_conv(&mut self, line: &str) -> bool {
        let indent = conv_indent(line);

        if line.contains(CONV_KEYWORD) {
            self.conv_min_indent = Some(match self.conv_min_indent {
                Some(min) if self.in_conv_block => min.min(indent),
                _ => indent,
            });
            self.in_conv_block = true;
        } else if self.in_conv_block && self.conv_min_indent.map_or(true, |min| indent <= min) {
            self.in_conv_block = false;
            self.conv_min_indent = None;
        }

        self.in_conv_block
    }
}

/// Output of one instrumentation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstrumentedSource {
    /// Annotated lines, including the injected auxiliary block as one entry.
    pub lines: Vec<String>,
    /// Number of markers inserted.
    pub marker_count: usize,
    /// `open ...` lines, without terminators, for the theorem header.
    pub open_lines: Vec<String>,
}

impl InstrumentedSource {
    /// The annotated source as one text.
    pub fn text(&self) -> String {
        self.lines.concat()
    }
}

/// Insert markers into `lines` and splice in `aux_block` after the imports.
pub fn instrument<S: AsRef<str>>(
    lines: &[S],
    aux_block: &str,
    matcher: &TacticMatcher,
) -> InstrumentedSource {
    let mut state = InstrumentationState::default();
    let mut out = InstrumentedSource::default();

    for line in lines {
        let line = line.as_ref();

        if line.starts_with("import") {
            state.imported = true;
            out.lines.push(line.to_string());
            continue;
        }

        let emitted = if line.starts_with("open") {
            out.open_lines.push(line.trim_end().to_string());
            line.to_string()
        } else if state.observe_conv(line) {
            line.to_string()
        } else {
            match mark_line(line, matcher) {
                Some(marked) => {
                    out.marker_count += 1;
                    marked
                }
                None => line.to_string(),
            }
        };

        if state.imported && !state.marker_injected {
            out.lines.push(aux_block.to_string());
            state.marker_injected = true;
        }
        out.lines.push(emitted);
    }

    out
}

/// Prefix `line` with the marker if it starts with a known tactic.
pub fn mark_line(line: &str, matcher: &TacticMatcher) -> Option<String> {
    let content = line.trim_start();
    let indent = &line[..line.len() - content.len()];
    matcher.match_start(content)?;
    Some(format!("{}{} {}", indent, MARKER, content))
}

/// Whether `line` carries a marker.
pub fn is_marked(line: &str) -> bool {
    line.trim_start().starts_with(marker_prefix())
}

/// Remove the first marker from `line`.
pub fn strip_marker(line: &str) -> String {
    line.replacen(marker_prefix(), "", 1)
}

fn marker_prefix() -> &'static str {
    // MARKER followed by the separating space.
    "to_theorem "
}

/// Leading whitespace width, where a whitespace-only line counts entirely.
fn conv_indent(line: &str) -> usize {
    line.len() - line.trim_start().len()
}
