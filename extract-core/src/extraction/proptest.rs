//! Property-based tests for the extraction passes using proptest.
//!
//! These check the structural guarantees the pipeline relies on:
//!
//! - Sources without candidate tactics produce no markers and no records
//! - Conv blocks never receive markers, however deeply nested
//! - At most one marker lands on a line, chosen by tactic priority
//! - Grouping is insensitive to the arrival order of messages
//! - Raising the granularity threshold never adds markers

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use proptest::prelude::*;

    use crate::error::Result;
    use crate::extraction::diagnostics::{extract_records, group};
    use crate::extraction::granularity::{filter_by_length, marker_count};
    use crate::extraction::instrument::{instrument, TacticMatcher, MARKER};
    use crate::extraction::types::SourceFile;
    use crate::extraction::verify::Verify;
    use crate::lean::{LeanMessage, MessageSeverity, Position};

    const AUX: &str = "syntax \"to_theorem\" tactic : tactic\nmacro_rules | `(tactic| to_theorem $t) => `(tactic| $t)\n";

    struct AcceptAll;

    #[async_trait]
    impl Verify for AcceptAll {
        async fn verify(&self, _header: &str, _statement: &str) -> Result<bool> {
            Ok(true)
        }
    }

    fn matcher() -> TacticMatcher {
        TacticMatcher::with_defaults().unwrap()
    }

    fn indent() -> impl Strategy<Value = String> {
        (0usize..4).prop_map(|n| " ".repeat(n * 2))
    }

    // Tactic-free proof lines
    fn plain_line() -> impl Strategy<Value = String> {
        (
            indent(),
            prop_oneof![
                Just("intro x"),
                Just("ring"),
                Just("linarith"),
                Just("rwa [h]"),
                Just("simpa using h"),
                Just("apply_fun f at h"),
                Just("exacts [a, b]"),
                Just("have h : a = b := by"),
                Just(""),
            ],
        )
            .prop_map(|(indent, body)| format!("{}{}\n", indent, body))
    }

    fn tactic_line() -> impl Strategy<Value = String> {
        (
            indent(),
            prop_oneof![
                Just("rw [h]"),
                Just("simp"),
                Just("simp; ring"),
                Just("simp_rw [a]"),
                Just("apply foo"),
                Just("exact bar"),
                Just("rw [a] at h ⊢"),
            ],
        )
            .prop_map(|(indent, body)| format!("{}{}\n", indent, body))
    }

    fn annotated_line() -> impl Strategy<Value = String> {
        prop_oneof![
            plain_line(),
            tactic_line().prop_map(|l| {
                let body = l.trim_start();
                let indent = &l[..l.len() - body.len()];
                format!("{}{} {}", indent, MARKER, body)
            }),
        ]
    }

    fn message(line: u32, data: &str) -> LeanMessage {
        LeanMessage::new(
            MessageSeverity::Info,
            data,
            Some(Position::new(line, 0)),
            Some(Position::new(line, 10)),
        )
    }

    proptest! {
        /// Sources without candidate tactics yield no markers and no records.
        #[test]
        fn no_tactics_means_no_markers(body in prop::collection::vec(plain_line(), 0..30)) {
            let mut lines = vec!["import Mathlib\n".to_string(), "open Nat\n".to_string()];
            lines.extend(body);

            let out = instrument(&lines, AUX, &matcher());
            prop_assert_eq!(out.marker_count, 0);
            prop_assert!(!out.lines.iter().any(|l| l.trim_start().starts_with(MARKER)));

            // With no markers the checking process reports no extraction sites.
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let source = SourceFile::from_text("A.lean", &lines.concat());
            let extraction = rt
                .block_on(extract_records(&source, "import Mathlib", 2, Vec::new(), &AcceptAll))
                .unwrap();
            prop_assert!(extraction.records.is_empty());
        }

        /// Nothing inside a conv block is marked, however the block nests.
        #[test]
        fn conv_blocks_are_never_marked(
            depth in 1usize..4,
            inner in prop::collection::vec((1usize..4, any::<bool>(), tactic_line()), 1..12),
        ) {
            let base = " ".repeat(depth * 2);
            let mut lines = vec![
                "import Mathlib\n".to_string(),
                "theorem t : a = b := by\n".to_string(),
                format!("{}conv =>\n", base),
            ];
            for (extra, nested_conv, tactic) in inner {
                let pad = " ".repeat(depth * 2 + extra * 2);
                if nested_conv {
                    lines.push(format!("{}conv in x => {}", pad, tactic.trim_start()));
                } else {
                    lines.push(format!("{}{}", pad, tactic.trim_start()));
                }
            }
            lines.push(format!("{}rw [done]\n", base));

            let out = instrument(&lines, AUX, &matcher());
            prop_assert_eq!(out.marker_count, 1);
            let last = out.lines.last().unwrap();
            prop_assert!(last.trim_start().starts_with(MARKER));
        }

        /// Each line gets at most one marker, chosen by tactic priority.
        #[test]
        fn at_most_one_marker_per_line(lines in prop::collection::vec(tactic_line(), 1..20)) {
            let out = instrument(&lines, AUX, &matcher());
            prop_assert_eq!(out.marker_count, lines.len());
            for (original, marked) in lines.iter().zip(&out.lines) {
                prop_assert_eq!(marked.matches(MARKER).count(), 1);
                prop_assert_eq!(
                    marked.replacen(&format!("{} ", MARKER), "", 1),
                    original.clone()
                );
            }
        }

        /// Messages sharing a span always land in one group, in any order.
        #[test]
        fn grouping_ignores_arrival_order(
            sites in prop::collection::vec((1u32..6, "[a-z]{1,6}"), 1..20)
                .prop_shuffle(),
        ) {
            let source = SourceFile::from_text("A.lean", "");
            let messages: Vec<LeanMessage> =
                sites.iter().map(|(line, data)| message(*line, data)).collect();
            let groups = group(&source, messages).unwrap();

            let mut keys: Vec<u32> = groups.iter().filter_map(|g| g.line()).collect();
            let before = keys.len();
            keys.sort_unstable();
            keys.dedup();
            prop_assert_eq!(keys.len(), before);

            for g in &groups {
                let line = g.line().unwrap();
                let expected: Vec<&str> = sites
                    .iter()
                    .filter(|(l, _)| *l == line)
                    .map(|(_, d)| d.as_str())
                    .collect();
                let actual: Vec<&str> = g.messages.iter().map(|m| m.data.as_str()).collect();
                prop_assert_eq!(actual, expected);
            }
        }

        /// Raising the threshold never increases the number of markers.
        #[test]
        fn filter_is_monotone_in_threshold(
            lines in prop::collection::vec(annotated_line(), 0..25),
            threshold in 0usize..6,
        ) {
            let lower = marker_count(&filter_by_length(&lines, threshold));
            let higher = marker_count(&filter_by_length(&lines, threshold + 1));
            prop_assert!(
                higher <= lower,
                "threshold {} kept {} markers, threshold {} kept {}",
                threshold, lower, threshold + 1, higher
            );
            prop_assert!(lower <= marker_count(&lines));
        }
    }
}
