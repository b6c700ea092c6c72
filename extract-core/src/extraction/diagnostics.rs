//! Reconstructing extraction sites from Lean diagnostics.
//!
//! The `to_theorem` tactic reports each marked site as several info messages
//! sharing one source span. Messages are grouped by that span, the tagged
//! fields are recovered from each group, and every full statement is
//! re-verified before it becomes an [`ExtractionRecord`].

use std::collections::HashMap;

use tracing::{debug, warn};

use super::types::{ExtractionRecord, SourceFile};
use super::verify::Verify;
use crate::error::{Error, Result};
use crate::lean::{LeanMessage, MessageSeverity, Position};

/// Tag preceding the proof state before the marked tactic.
pub const TACTIC_STATE_BEFORE_TAG: &str = "tactic state before the tactic:";
/// Tag preceding the marked tactic itself.
pub const EXECUTED_TACTIC_TAG: &str = "executed tactic:";
/// Tag preceding the proof states after the marked tactic.
pub const TACTIC_STATE_AFTER_TAG: &str = "tactic states after the tactic:";
/// Tag preceding the goal of the extracted theorem.
pub const EXTRACTED_GOAL_TAG: &str = "tactic state of the extracted theorem:";
/// Theorem name used for the extracted statement.
pub const FORMAL_STATEMENT_NAME: &str = "extracted_formal_statement";
/// Theorem name used for the extracted statement with full context.
pub const FULL_FORMAL_STATEMENT_NAME: &str = "extracted_full_formal_statement";

/// Source span shared by every message of one extraction site.
pub type PositionKey = (Option<Position>, Option<Position>);

/// Messages reported for one extraction site, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageGroup {
    pub key: PositionKey,
    pub messages: Vec<LeanMessage>,
}

impl MessageGroup {
    /// Line of the site in the submitted source.
    pub fn line(&self) -> Option<u32> {
        self.key.0.map(|p| p.line)
    }
}

/// Partition `messages` by span.
///
/// Groups appear in the order their first message arrived. Any error message
/// makes the whole file unusable.
pub fn group(file: &SourceFile, messages: Vec<LeanMessage>) -> Result<Vec<MessageGroup>> {
    if let Some(error) = messages
        .iter()
        .find(|m| m.severity == MessageSeverity::Error)
    {
        return Err(Error::source_diagnostic(&file.path, error.located()));
    }

    let mut groups: Vec<MessageGroup> = Vec::new();
    let mut slots: HashMap<PositionKey, usize> = HashMap::new();

    for message in messages {
        let key = (message.pos, message.end_pos);
        match slots.get(&key) {
            Some(&slot) => groups[slot].messages.push(message),
            None => {
                slots.insert(key, groups.len());
                groups.push(MessageGroup {
                    key,
                    messages: vec![message],
                });
            }
        }
    }

    Ok(groups)
}

/// Fields recovered from one group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialRecord {
    pub tactic_state_before: String,
    pub tactic: String,
    pub tactic_state_after: String,
    pub goal: String,
    pub formal_statement: String,
    pub full_formal_statement: Option<String>,
}

impl PartialRecord {
    /// Fold one message into the record, naming statements with `index`.
    ///
    /// Returns true when the message carried the full formal statement,
    /// which is the point a candidate is ready for verification.
    pub fn absorb(&mut self, message: &LeanMessage, index: usize) -> bool {
        let data = message.data.as_str();

        if let Some(rest) = after_tag(data, TACTIC_STATE_BEFORE_TAG) {
            self.tactic_state_before = rest;
        } else if let Some(rest) = after_tag(data, EXECUTED_TACTIC_TAG) {
            self.tactic = rest;
        } else if let Some(rest) = after_tag(data, TACTIC_STATE_AFTER_TAG) {
            self.tactic_state_after = rest;
        } else if let Some(rest) = after_tag(data, EXTRACTED_GOAL_TAG) {
            self.goal = rest;
        } else if is_statement(data, FORMAL_STATEMENT_NAME) {
            self.formal_statement = rename_statement(data, FORMAL_STATEMENT_NAME, index);
        } else if is_statement(data, FULL_FORMAL_STATEMENT_NAME) {
            self.full_formal_statement =
                Some(rename_statement(data, FULL_FORMAL_STATEMENT_NAME, index));
            return true;
        }

        false
    }
}

/// Recover every tagged field of `group`, naming statements with `index`.
pub fn reconstruct(group: &MessageGroup, index: usize) -> PartialRecord {
    let mut partial = PartialRecord::default();
    for message in &group.messages {
        partial.absorb(message, index);
    }
    partial
}

fn after_tag(data: &str, tag: &str) -> Option<String> {
    data.split_once(tag).map(|(_, rest)| rest.trim().to_string())
}

fn is_statement(data: &str, name: &str) -> bool {
    data.contains("theorem") && data.contains(name)
}

fn rename_statement(data: &str, name: &str, index: usize) -> String {
    data.replace(name, &format!("{}_{}", name, index))
}

/// Records and goal statements accepted from one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Accepted records in acceptance order.
    pub records: Vec<ExtractionRecord>,
    /// Formal statements of the accepted records, same order.
    pub goals: Vec<String>,
}

/// Turn the diagnostics of one instrumented submission into records.
///
/// `aux_line_count` is the number of lines the injected auxiliary block
/// shifted the source by; record lines are reported against the original
/// file.
pub async fn extract_records<V>(
    source: &SourceFile,
    header: &str,
    aux_line_count: usize,
    messages: Vec<LeanMessage>,
    verifier: &V,
) -> Result<Extraction>
where
    V: Verify + ?Sized,
{
    let groups = group(source, messages)?;
    let mut extraction = Extraction::default();
    let filename = source.record_name();

    for group in &groups {
        let mut partial = PartialRecord::default();

        for message in &group.messages {
            let index = extraction.records.len();
            if !partial.absorb(message, index) {
                continue;
            }

            let full = partial.full_formal_statement.clone().unwrap_or_default();
            if !verifier.verify(header, &full).await? {
                debug!(line = ?group.line(), "Candidate rejected on re-check");
                continue;
            }

            let line = group.line().map_or(0, i64::from) - aux_line_count as i64;
            if partial.formal_statement.is_empty() {
                warn!(line, "Accepted candidate carried no formal statement");
            }

            extraction.goals.push(partial.formal_statement.clone());
            extraction.records.push(ExtractionRecord {
                index,
                filename: filename.clone(),
                line,
                tactic_state_before: partial.tactic_state_before.clone(),
                tactic: partial.tactic.clone(),
                tactic_state_after: partial.tactic_state_after.clone(),
                goal: partial.goal.clone(),
                header: header.to_string(),
                formal_statement: partial.formal_statement.clone(),
                full_formal_statement: full,
            });
        }
    }

    Ok(extraction)
}
