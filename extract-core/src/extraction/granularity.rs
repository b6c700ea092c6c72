//! Difficulty grading by proof length.
//!
//! A marker survives only if the block it opens contains at least `N`
//! tactic invocations at the marker's own indentation. Markers nested inside
//! a scanned block are demoted, so only the outermost marker of a chain can
//! survive. Blocks are found from indentation alone; no parse tree is built.

use super::instrument::{is_marked, strip_marker};

/// Count the top-level tactics on one line: one plus the number of `;`
/// separators outside brackets. A trailing separator does not start a new
/// tactic. Blank lines count zero.
pub fn count_tactics_on_line(line: &str) -> usize {
    let line = line.trim();
    let Some((body, _)) = line.char_indices().last().map(|(i, _)| line.split_at(i)) else {
        return 0;
    };

    let mut depth = 0usize;
    let mut separators = 0;
    for c in body.chars() {
        match c {
            '(' | '[' | '{' | '<' => depth += 1,
            ')' | ']' | '}' | '>' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => separators += 1,
            _ => {}
        }
    }
    separators + 1
}

/// Number of leading spaces.
pub fn indent_level(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// Keep only markers guarding at least `min_sibling_tactics` tactics.
///
/// Every marker of the input scans its block: blank lines are skipped, the
/// scan ends at the first line indented less than the marker, lines at the
/// marker's indentation add their tactic count, and any other marker met on
/// the way is demoted. A marker is kept if its count reached the threshold
/// and no earlier scan demoted it.
pub fn filter_by_length<S: AsRef<str>>(lines: &[S], min_sibling_tactics: usize) -> Vec<String> {
    let lines: Vec<&str> = lines.iter().map(|l| l.as_ref()).collect();
    let mut demoted = vec![false; lines.len()];

    for (start, line) in lines.iter().enumerate() {
        if !is_marked(line) {
            continue;
        }

        let base_indent = indent_level(line);
        let mut total = 0;

        for (offset, next) in lines[start..].iter().enumerate() {
            if next.trim().is_empty() {
                continue;
            }
            let indent = indent_level(next);
            if indent < base_indent {
                break;
            }
            if indent == base_indent {
                total += count_tactics_on_line(next);
            }
            if offset > 0 && is_marked(next) {
                demoted[start + offset] = true;
            }
            if total >= min_sibling_tactics {
                break;
            }
        }

        if total < min_sibling_tactics {
            demoted[start] = true;
        }
    }

    lines
        .iter()
        .zip(demoted)
        .map(|(line, demoted)| {
            if demoted && is_marked(line) {
                strip_marker(line)
            } else {
                line.to_string()
            }
        })
        .collect()
}

/// Number of markers in `lines`.
pub fn marker_count<S: AsRef<str>>(lines: &[S]) -> usize {
    lines.iter().filter(|l| is_marked(l.as_ref())).count()
}

/// One filtered variant per threshold, in the order given.
pub fn graded_variants<S: AsRef<str>>(
    lines: &[S],
    thresholds: &[usize],
) -> Vec<(usize, Vec<String>)> {
    thresholds
        .iter()
        .map(|&threshold| (threshold, filter_by_length(lines, threshold)))
        .collect()
}
