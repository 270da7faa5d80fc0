//! Replaying hunks onto a base that may have shifted

use super::{ends_with_newline, join_lines, line_ending, split_lines, DiffHunk, PatchError};

/// Default search window either side of a hunk's expected position.
pub const DEFAULT_MAX_OFFSET: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOptions {
    /// How many lines away from its expected position a hunk may land
    pub max_offset: usize,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            max_offset: DEFAULT_MAX_OFFSET,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkResult {
    pub index: usize,
    pub header: String,
    pub success: bool,
    /// 0-based line the hunk was applied at in the output
    pub applied_at: Option<usize>,
    /// Distance from the expected position
    pub offset: isize,
}

impl HunkResult {
    pub fn summary(&self) -> String {
        match (self.success, self.applied_at) {
            (true, Some(line)) if self.offset == 0 => format!(
                "Hunk #{} {}: applied at line {}",
                self.index + 1,
                self.header,
                line + 1
            ),
            (true, Some(line)) => format!(
                "Hunk #{} {}: applied at line {} (offset {} lines)",
                self.index + 1,
                self.header,
                line + 1,
                self.offset
            ),
            _ => format!("Hunk #{} {}: failed", self.index + 1, self.header),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    pub lines: Vec<String>,
    pub results: Vec<HunkResult>,
    /// Whether the text ends with a line break
    pub final_newline: bool,
    /// Line break of the base, used for every line of the result
    pub line_ending: &'static str,
}

impl PatchOutcome {
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }

    pub fn text(&self) -> String {
        join_lines(&self.lines, self.line_ending, self.final_newline)
    }

    pub fn summaries(&self) -> Vec<String> {
        self.results.iter().map(HunkResult::summary).collect()
    }
}

fn hunk_header(hunk: &DiffHunk) -> String {
    format!(
        "@@ -{},{} +{},{} @@",
        hunk.base_start + 1,
        hunk.base_len,
        hunk.patched_start + 1,
        hunk.patched_len
    )
}

/// Candidate positions nearest `expected` first, alternating later and
/// earlier, never before `floor`.
fn candidates(expected: usize, floor: usize, max_offset: usize) -> impl Iterator<Item = usize> {
    std::iter::once(expected).chain((1..=max_offset).flat_map(move |distance| {
        let later = expected.checked_add(distance);
        let earlier = expected.checked_sub(distance);
        later.into_iter().chain(earlier)
    }))
    .filter(move |&pos| pos >= floor)
}

/// `at_end` pins the match to the end of `lines`.
fn find(
    lines: &[String],
    wanted: &[&str],
    expected: usize,
    floor: usize,
    max_offset: usize,
    at_end: bool,
) -> Option<usize> {
    candidates(expected, floor, max_offset).find(|&pos| {
        pos + wanted.len() <= lines.len()
            && (!at_end || pos + wanted.len() == lines.len())
            && lines[pos..pos + wanted.len()]
                .iter()
                .zip(wanted)
                .all(|(have, want)| have == want)
    })
}

/// Apply every hunk that can be placed. Failed hunks are recorded and
/// skipped; the rest still apply.
pub fn apply(base: &str, hunks: &[DiffHunk], options: &ApplyOptions) -> PatchOutcome {
    let mut lines: Vec<String> = split_lines(base).into_iter().map(String::from).collect();
    let mut final_newline = ends_with_newline(base);
    let mut results = Vec::with_capacity(hunks.len());
    let mut drift: isize = 0;
    let mut floor = 0usize;

    for (index, hunk) in hunks.iter().enumerate() {
        let old = hunk.base_lines();
        let new = hunk.patched_lines();
        let expected = (hunk.base_start as isize + drift).clamp(0, lines.len() as isize) as usize;
        let header = hunk_header(hunk);

        let at_end = hunk.base_missing_newline;
        match find(&lines, &old, expected, floor, options.max_offset, at_end) {
            Some(pos) => {
                if at_end || (hunk.patched_missing_newline && pos + old.len() == lines.len()) {
                    final_newline = !hunk.patched_missing_newline;
                }
                lines.splice(pos..pos + old.len(), new.iter().map(|s| s.to_string()));
                drift = pos as isize - hunk.base_start as isize + new.len() as isize
                    - old.len() as isize;
                floor = pos + new.len();
                let offset = pos as isize - expected as isize;
                if offset != 0 {
                    tracing::debug!(hunk = index + 1, offset, "hunk applied with offset");
                }
                results.push(HunkResult {
                    index,
                    header,
                    success: true,
                    applied_at: Some(pos),
                    offset,
                });
            }
            None => {
                tracing::warn!(hunk = index + 1, %header, "hunk did not apply");
                results.push(HunkResult {
                    index,
                    header,
                    success: false,
                    applied_at: None,
                    offset: 0,
                });
            }
        }
    }

    PatchOutcome {
        lines,
        results,
        final_newline,
        line_ending: line_ending(base),
    }
}

/// Like [`apply`], but all hunks must apply.
pub fn apply_strict(
    base: &str,
    hunks: &[DiffHunk],
    options: &ApplyOptions,
) -> Result<String, PatchError> {
    let outcome = apply(base, hunks, options);
    if outcome.is_success() {
        Ok(outcome.text())
    } else {
        Err(PatchError::ApplyFailed {
            summaries: outcome.summaries(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;
    use pretty_assertions::assert_eq;

    fn numbered(count: usize) -> String {
        (1..=count).map(|i| format!("line {i}\n")).collect()
    }

    #[test]
    fn test_apply_reproduces_patched_text() {
        let base = numbered(30);
        let patched = base
            .replace("line 3\n", "line three\n")
            .replace("line 20\n", "line 20\nextra\n");
        let hunks = diff(&base, &patched);
        assert_eq!(hunks.len(), 2);
        let outcome = apply(&base, &hunks, &ApplyOptions::default());
        assert!(outcome.is_success());
        assert_eq!(outcome.text(), patched);
    }

    #[test]
    fn test_apply_tolerates_shifted_base() {
        let base = numbered(20);
        let patched = base.replace("line 10\n", "line ten\n");
        let hunks = diff(&base, &patched);

        let shifted = format!("header 1\nheader 2\nheader 3\n{base}");
        let outcome = apply(&shifted, &hunks, &ApplyOptions::default());
        assert!(outcome.is_success());
        assert_eq!(outcome.results[0].offset, 3);
        assert_eq!(
            outcome.text(),
            format!("header 1\nheader 2\nheader 3\n{patched}")
        );
    }

    #[test]
    fn test_offset_limit() {
        let base = numbered(20);
        let patched = base.replace("line 10\n", "line ten\n");
        let hunks = diff(&base, &patched);
        let shifted = format!("a\nb\nc\nd\ne\n{base}");

        let outcome = apply(&shifted, &hunks, &ApplyOptions { max_offset: 2 });
        assert!(!outcome.is_success());
        assert_eq!(outcome.text(), shifted);
    }

    #[test]
    fn test_failed_hunk_does_not_stop_others() {
        let base = numbered(30);
        let patched = base
            .replace("line 3\n", "line three\n")
            .replace("line 25\n", "line twenty-five\n");
        let hunks = diff(&base, &patched);
        let drifted = base.replace("line 2\n", "line II\n");

        let outcome = apply(&drifted, &hunks, &ApplyOptions::default());
        assert!(!outcome.results[0].success);
        assert!(outcome.results[1].success);
        assert!(outcome.text().contains("line twenty-five"));
        assert!(outcome.summaries()[0].contains("failed"));
    }

    #[test]
    fn test_strict_apply_reports_every_hunk() {
        let base = numbered(10);
        let patched = base.replace("line 5\n", "line five\n");
        let hunks = diff(&base, &patched);

        match apply_strict("unrelated\n", &hunks, &ApplyOptions::default()) {
            Err(PatchError::ApplyFailed { summaries }) => {
                assert_eq!(summaries.len(), 1);
                assert!(summaries[0].starts_with("Hunk #1"));
            }
            other => panic!("Expected failure, got {other:?}"),
        }
        assert_eq!(
            apply_strict(&base, &hunks, &ApplyOptions::default()).unwrap(),
            patched
        );
    }

    #[test]
    fn test_final_newline_follows_the_patch() {
        for (base, patched) in [
            ("a\nb\nc\n", "a\nb\nc"),
            ("a\nb\nc", "a\nb\nc\nd\n"),
            ("a\nb", "A\nb"),
            ("", "x"),
            ("x\n", ""),
        ] {
            let hunks = diff(base, patched);
            assert_eq!(
                apply_strict(base, &hunks, &ApplyOptions::default()).unwrap(),
                patched,
                "{base:?} -> {patched:?}"
            );
        }
    }

    #[test]
    fn test_keeps_line_endings_of_the_base() {
        let hunks = diff("a\nb\nc\n", "a\nB\nc\n");
        let outcome = apply("a\r\nb\r\nc\r\n", &hunks, &ApplyOptions::default());
        assert!(outcome.is_success());
        assert_eq!(outcome.text(), "a\r\nB\r\nc\r\n");
    }
}
