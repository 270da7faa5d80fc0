//! Line diffs between a base file and its generated override
//!
//! [`diff`] aligns two texts line by line and groups the changes into
//! hunks with surrounding context. [`PatchDocument`] reads and writes the
//! unified patch format, and [`apply`] replays hunks onto a base that may
//! have moved since the patch was made.

mod apply;
mod format;
mod myers;

use thiserror::Error;

pub use apply::{apply, apply_strict, ApplyOptions, HunkResult, PatchOutcome, DEFAULT_MAX_OFFSET};
pub use format::PatchDocument;

/// Context lines around each change unless asked otherwise.
pub const DEFAULT_CONTEXT: usize = 3;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatchError {
    #[error("Malformed patch at line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("Patch failed:\n{}", summaries.join("\n"))]
    ApplyFailed { summaries: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    Context(String),
    Removed(String),
    Added(String),
}

impl DiffLine {
    pub fn text(&self) -> &str {
        match self {
            DiffLine::Context(text) | DiffLine::Removed(text) | DiffLine::Added(text) => text,
        }
    }

    fn in_base(&self) -> bool {
        !matches!(self, DiffLine::Added(_))
    }

    fn in_patched(&self) -> bool {
        !matches!(self, DiffLine::Removed(_))
    }
}

/// One contiguous group of changes. Starts are 0-based line indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffHunk {
    pub base_start: usize,
    pub base_len: usize,
    pub patched_start: usize,
    pub patched_len: usize,
    pub lines: Vec<DiffLine>,
    /// The hunk's last base line ends the base text without a line break
    pub base_missing_newline: bool,
    /// The hunk's last patched line ends the patched text without a line break
    pub patched_missing_newline: bool,
}

impl DiffHunk {
    pub fn removed_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|l| matches!(l, DiffLine::Removed(_)))
            .map(DiffLine::text)
            .collect()
    }

    pub fn added_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|l| matches!(l, DiffLine::Added(_)))
            .map(DiffLine::text)
            .collect()
    }

    /// What the hunk expects to find in the base: context and removed lines.
    pub fn base_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|l| l.in_base())
            .map(DiffLine::text)
            .collect()
    }

    /// What the hunk leaves behind: context and added lines.
    pub fn patched_lines(&self) -> Vec<&str> {
        self.lines
            .iter()
            .filter(|l| l.in_patched())
            .map(DiffLine::text)
            .collect()
    }
}

/// Split on `\r\n`, `\r` or `\n`. Line breaks are dropped, and a trailing
/// line break does not start another line.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..i]);
                start = i + 1;
            }
            b'\r' => {
                lines.push(&text[start..i]);
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

/// Whether the last line of `text` is terminated. Empty text counts as
/// terminated.
pub fn ends_with_newline(text: &str) -> bool {
    text.is_empty() || text.ends_with('\n') || text.ends_with('\r')
}

/// The first line break used in `text`, `\n` if there is none.
pub fn line_ending(text: &str) -> &'static str {
    match text.find(['\r', '\n']) {
        Some(i) if text[i..].starts_with("\r\n") => "\r\n",
        Some(i) if text[i..].starts_with('\r') => "\r",
        _ => "\n",
    }
}

/// Join `lines` with `ending`, ending the last line too if `final_newline`.
pub fn join_lines<S: AsRef<str>>(lines: &[S], ending: &str, final_newline: bool) -> String {
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.push_str(ending);
        }
        out.push_str(line.as_ref());
    }
    if final_newline && !lines.is_empty() {
        out.push_str(ending);
    }
    out
}

/// A line plus whether a line break follows it; only the last line of a
/// text can lack one.
#[derive(Debug, PartialEq)]
struct Line<'a> {
    text: &'a str,
    terminated: bool,
}

fn lines_of(text: &str) -> Vec<Line<'_>> {
    let lines = split_lines(text);
    let last = lines.len().saturating_sub(1);
    let final_newline = ends_with_newline(text);
    lines
        .into_iter()
        .enumerate()
        .map(|(i, text)| Line {
            text,
            terminated: i < last || final_newline,
        })
        .collect()
}

/// Diff with [`DEFAULT_CONTEXT`] lines of context.
pub fn diff(base: &str, patched: &str) -> Vec<DiffHunk> {
    diff_with_context(base, patched, DEFAULT_CONTEXT)
}

/// Diff with `context` lines around each change. Changes separated by no
/// more than twice the context share a hunk.
///
/// A last line that gains or loses its line break counts as changed.
pub fn diff_with_context(base: &str, patched: &str, context: usize) -> Vec<DiffHunk> {
    let base_lines = lines_of(base);
    let patched_lines = lines_of(patched);
    let ops = myers::edit_script(&base_lines, &patched_lines);

    let changes: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter(|(_, op)| op.kind != myers::EditKind::Equal)
        .map(|(i, _)| i)
        .collect();
    let Some((&first, rest)) = changes.split_first() else {
        return Vec::new();
    };

    let mut groups = vec![(first, first)];
    for &change in rest {
        match groups.last_mut() {
            Some(group) if change - group.1 - 1 <= 2 * context => group.1 = change,
            _ => groups.push((change, change)),
        }
    }

    groups
        .into_iter()
        .map(|(first, last)| {
            let lo = first.saturating_sub(context);
            let hi = (last + context).min(ops.len() - 1);
            let window = &ops[lo..=hi];
            let lines: Vec<DiffLine> = window
                .iter()
                .map(|op| match op.kind {
                    myers::EditKind::Equal => {
                        DiffLine::Context(base_lines[op.base].text.to_string())
                    }
                    myers::EditKind::Delete => {
                        DiffLine::Removed(base_lines[op.base].text.to_string())
                    }
                    myers::EditKind::Insert => {
                        DiffLine::Added(patched_lines[op.patched].text.to_string())
                    }
                })
                .collect();
            DiffHunk {
                base_start: window[0].base,
                base_len: lines.iter().filter(|l| l.in_base()).count(),
                patched_start: window[0].patched,
                patched_len: lines.iter().filter(|l| l.in_patched()).count(),
                lines,
                base_missing_newline: window.iter().any(|op| {
                    op.kind != myers::EditKind::Insert && !base_lines[op.base].terminated
                }),
                patched_missing_newline: window.iter().any(|op| {
                    op.kind != myers::EditKind::Delete && !patched_lines[op.patched].terminated
                }),
            }
        })
        .collect()
}
