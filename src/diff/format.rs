//! Unified patch format

use std::fmt;
use std::str::FromStr;

use super::{DiffHunk, DiffLine, PatchError};

/// A patch between two labelled files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchDocument {
    pub base_path: String,
    pub patched_path: String,
    pub hunks: Vec<DiffHunk>,
}

impl PatchDocument {
    pub fn new(
        base_path: impl Into<String>,
        patched_path: impl Into<String>,
        hunks: Vec<DiffHunk>,
    ) -> Self {
        Self {
            base_path: base_path.into(),
            patched_path: patched_path.into(),
            hunks,
        }
    }

    pub fn parse(text: &str) -> Result<Self, PatchError> {
        Parser::new(text).document()
    }
}

impl FromStr for PatchDocument {
    type Err = PatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

/// Header positions are 1-based, except that an empty range names the line
/// it follows.
fn header_start(start: usize, len: usize) -> usize {
    if len > 0 {
        start + 1
    } else {
        start
    }
}

impl fmt::Display for PatchDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- {}", self.base_path)?;
        writeln!(f, "+++ {}", self.patched_path)?;
        for hunk in &self.hunks {
            writeln!(
                f,
                "@@ -{},{} +{},{} @@",
                header_start(hunk.base_start, hunk.base_len),
                hunk.base_len,
                header_start(hunk.patched_start, hunk.patched_len),
                hunk.patched_len
            )?;
            let last_base = hunk.lines.iter().rposition(DiffLine::in_base);
            let last_patched = hunk.lines.iter().rposition(DiffLine::in_patched);
            for (i, line) in hunk.lines.iter().enumerate() {
                match line {
                    DiffLine::Context(text) => writeln!(f, " {text}")?,
                    DiffLine::Removed(text) => writeln!(f, "-{text}")?,
                    DiffLine::Added(text) => writeln!(f, "+{text}")?,
                }
                if (hunk.base_missing_newline && last_base == Some(i))
                    || (hunk.patched_missing_newline && last_patched == Some(i))
                {
                    writeln!(f, "{NO_NEWLINE_MARKER}")?;
                }
            }
        }
        Ok(())
    }
}

struct Parser<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().collect(),
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> PatchError {
        PatchError::Malformed {
            line: self.pos + 1,
            message: message.into(),
        }
    }

    fn document(mut self) -> Result<PatchDocument, PatchError> {
        // anything before the file headers (e.g. `diff` lines) is ignored
        while self.pos < self.lines.len() && !self.lines[self.pos].starts_with("--- ") {
            self.pos += 1;
        }
        let base_path = self.file_header("--- ")?;
        let patched_path = self.file_header("+++ ")?;

        let mut hunks = Vec::new();
        while self.pos < self.lines.len() {
            let line = self.lines[self.pos];
            if line.trim().is_empty() {
                self.pos += 1;
                continue;
            }
            if !line.starts_with("@@") {
                return Err(self.error(format!("expected hunk header, found {line:?}")));
            }
            hunks.push(self.hunk()?);
        }

        Ok(PatchDocument {
            base_path,
            patched_path,
            hunks,
        })
    }

    fn file_header(&mut self, marker: &str) -> Result<String, PatchError> {
        match self.lines.get(self.pos) {
            Some(line) if line.starts_with(marker) => {
                self.pos += 1;
                Ok(line[marker.len()..].trim_end().to_string())
            }
            _ => Err(self.error(format!("expected '{}' file header", marker.trim_end()))),
        }
    }

    fn range(&self, text: &str, sign: char) -> Result<(usize, usize), PatchError> {
        let body = text
            .strip_prefix(sign)
            .ok_or_else(|| self.error(format!("expected '{sign}' range, found {text:?}")))?;
        let (start, len) = match body.split_once(',') {
            Some((start, len)) => (start, len),
            None => (body, "1"),
        };
        let start: usize = start
            .parse()
            .map_err(|_| self.error(format!("bad line number {start:?}")))?;
        let len: usize = len
            .parse()
            .map_err(|_| self.error(format!("bad line count {len:?}")))?;
        let start = if len > 0 {
            start
                .checked_sub(1)
                .ok_or_else(|| self.error("line numbers start at 1"))?
        } else {
            start
        };
        Ok((start, len))
    }

    fn hunk(&mut self) -> Result<DiffHunk, PatchError> {
        let header = self.lines[self.pos];
        let inner = header
            .strip_prefix("@@ ")
            .and_then(|rest| rest.split(" @@").next())
            .ok_or_else(|| self.error(format!("bad hunk header {header:?}")))?;
        let mut ranges = inner.split_whitespace();
        let (Some(base), Some(patched)) = (ranges.next(), ranges.next()) else {
            return Err(self.error(format!("bad hunk header {header:?}")));
        };
        let (base_start, base_len) = self.range(base, '-')?;
        let (patched_start, patched_len) = self.range(patched, '+')?;
        self.pos += 1;

        let mut lines = Vec::new();
        let mut base_missing_newline = false;
        let mut patched_missing_newline = false;
        let mut base_left = base_len;
        let mut patched_left = patched_len;
        while base_left > 0 || patched_left > 0 {
            let Some(&line) = self.lines.get(self.pos) else {
                return Err(self.error("hunk ends early"));
            };
            let mut chars = line.chars();
            let parsed = match chars.next() {
                // some tools strip the space of empty context lines
                None => DiffLine::Context(String::new()),
                Some(' ') => DiffLine::Context(chars.as_str().to_string()),
                Some('-') => DiffLine::Removed(chars.as_str().to_string()),
                Some('+') => DiffLine::Added(chars.as_str().to_string()),
                Some('\\') => {
                    missing_newline(&lines, &mut base_missing_newline, &mut patched_missing_newline);
                    self.pos += 1;
                    continue;
                }
                Some(_) => return Err(self.error(format!("unexpected hunk line {line:?}"))),
            };
            if parsed.in_base() {
                base_left = base_left
                    .checked_sub(1)
                    .ok_or_else(|| self.error("more base lines than the header says"))?;
            }
            if parsed.in_patched() {
                patched_left = patched_left
                    .checked_sub(1)
                    .ok_or_else(|| self.error("more patched lines than the header says"))?;
            }
            lines.push(parsed);
            self.pos += 1;
        }
        while matches!(self.lines.get(self.pos), Some(line) if line.starts_with('\\')) {
            missing_newline(&lines, &mut base_missing_newline, &mut patched_missing_newline);
            self.pos += 1;
        }

        Ok(DiffHunk {
            base_start,
            base_len,
            patched_start,
            patched_len,
            lines,
            base_missing_newline,
            patched_missing_newline,
        })
    }
}

/// A `\` marker applies to the line before it, on the sides that line is in.
fn missing_newline(lines: &[DiffLine], base: &mut bool, patched: &mut bool) {
    if let Some(line) = lines.last() {
        *base |= line.in_base();
        *patched |= line.in_patched();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;
    use pretty_assertions::assert_eq;

    const BASE: &str = "class Foo
{
    int Bar()
    {
        return 1;
    }
}
";

    const PATCHED: &str = "class Foo
{
    int Bar()
    {
        return 42;
    }
}
";

    #[test]
    fn test_patch_text() {
        let doc = PatchDocument::new(
            "__core__/Foo.cs",
            "UserCode/Foo.override.cs",
            diff(BASE, PATCHED),
        );
        insta::assert_snapshot!(doc.to_string(), @r###"
        --- __core__/Foo.cs
        +++ UserCode/Foo.override.cs
        @@ -2,6 +2,6 @@
         {
             int Bar()
             {
        -        return 1;
        +        return 42;
             }
         }
        "###);
    }

    #[test]
    fn test_round_trip() {
        let doc = PatchDocument::new("a", "b", diff(BASE, PATCHED));
        let parsed: PatchDocument = doc.to_string().parse().unwrap();
        assert_eq!(parsed, doc);
    }

    #[test]
    fn test_round_trip_with_pure_insertion() {
        let doc = PatchDocument::new(
            "a",
            "b",
            crate::diff::diff_with_context("x\ny\n", "x\nnew\ny\n", 0),
        );
        assert!(doc.to_string().contains("@@ -1,0 +2,1 @@"));
        assert_eq!(PatchDocument::parse(&doc.to_string()).unwrap(), doc);
    }

    #[test]
    fn test_tolerates_stripped_context_and_markers() {
        let text = "diff --git a/x b/x
--- x
+++ x
@@ -1,3 +1,3 @@
 a

-b
+c
\\ No newline at end of file
";
        let doc = PatchDocument::parse(text).unwrap();
        assert_eq!(doc.hunks.len(), 1);
        assert_eq!(doc.hunks[0].base_lines(), vec!["a", "", "b"]);
        assert_eq!(doc.hunks[0].added_lines(), vec!["c"]);
        assert!(!doc.hunks[0].base_missing_newline);
        assert!(doc.hunks[0].patched_missing_newline);
    }

    fn patch(base: &str, patched: &str) -> String {
        PatchDocument::new("a/f", "b/f", diff(base, patched)).to_string()
    }

    #[test]
    fn test_line_appended_at_end_of_file() {
        assert_eq!(
            patch("a\nb\nc\n", "a\nb\nc\nd\n"),
            "--- a/f\n+++ b/f\n@@ -1,3 +1,4 @@\n a\n b\n c\n+d\n"
        );
    }

    #[test]
    fn test_last_line_changed() {
        assert_eq!(
            patch("1\n2\n3\n4\n5\n6\n7\n", "1\n2\n3\n4\n5\n6\nseven\n"),
            "--- a/f\n+++ b/f\n@@ -4,4 +4,4 @@\n 4\n 5\n 6\n-7\n+seven\n"
        );
    }

    #[test]
    fn test_missing_final_newline_is_marked() {
        let text = patch("a\nb\nc\n", "a\nb\nc");
        assert_eq!(
            text,
            "--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n a\n b\n-c\n+c\n\\ No newline at end of file\n"
        );
        let parsed = PatchDocument::parse(&text).unwrap();
        assert_eq!(parsed, PatchDocument::new("a/f", "b/f", diff("a\nb\nc\n", "a\nb\nc")));

        let unchanged_tail = patch("a\nb", "A\nb");
        assert!(unchanged_tail.ends_with(" b\n\\ No newline at end of file\n"));
        assert!(PatchDocument::parse(&unchanged_tail).unwrap().hunks[0].base_missing_newline);
    }

    #[test]
    fn test_short_hunk_is_malformed() {
        let text = "--- x\n+++ x\n@@ -1,3 +1,3 @@\n a\n";
        assert!(matches!(
            PatchDocument::parse(text),
            Err(PatchError::Malformed { .. })
        ));
    }

    #[test]
    fn test_missing_header_is_malformed() {
        assert!(matches!(
            PatchDocument::parse("@@ -1 +1 @@\n-a\n+b\n"),
            Err(PatchError::Malformed { .. })
        ));
    }
}
