//! Regex helpers exposed to templates

use std::collections::BTreeMap;

use regex::{Captures, Regex, RegexBuilder};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("no such capture group: {0}")]
    UnknownGroup(String),
    #[error("{given} replacements given but the pattern has {groups} capture groups")]
    TooManyReplacements { given: usize, groups: usize },
}

/// Build a regex with single-letter options: `i` ignore case, `m` multi
/// line, `s` dot matches newline, `x` ignore pattern whitespace. Other
/// letters are ignored.
pub fn build_regex(pattern: &str, options: Option<&str>) -> Result<Regex, regex::Error> {
    let mut builder = RegexBuilder::new(pattern);
    for option in options.unwrap_or_default().chars() {
        match option {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            _ => &mut builder,
        };
    }
    builder.build()
}

/// New text for capture groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupReplacements {
    /// Replacements for groups 1, 2, ... in order
    Positional(Vec<String>),
    /// Replacements keyed by group name or number
    Named(BTreeMap<String, String>),
}

impl GroupReplacements {
    /// Map to group indices; every named key must exist in `regex`, and
    /// there may be no more positional values than groups.
    fn by_index(&self, regex: &Regex) -> Result<BTreeMap<usize, String>, CaptureError> {
        match self {
            GroupReplacements::Positional(values) => {
                let groups = regex.captures_len() - 1;
                if values.len() > groups {
                    return Err(CaptureError::TooManyReplacements {
                        given: values.len(),
                        groups,
                    });
                }
                Ok(values
                    .iter()
                    .enumerate()
                    .map(|(i, value)| (i + 1, value.clone()))
                    .collect())
            }
            GroupReplacements::Named(values) => values
                .iter()
                .map(|(key, value)| {
                    group_index(regex, key)
                        .map(|index| (index, value.clone()))
                        .ok_or_else(|| CaptureError::UnknownGroup(key.clone()))
                })
                .collect(),
        }
    }
}

fn group_index(regex: &Regex, key: &str) -> Option<usize> {
    if let Ok(index) = key.parse::<usize>() {
        return (index > 0 && index < regex.captures_len()).then_some(index);
    }
    regex
        .capture_names()
        .position(|name| name == Some(key))
}

/// Replace the text of capture groups in every match, keeping the parts of
/// the match that no group captured.
///
/// Groups are visited in order of position. Groups without a replacement
/// keep their text, though groups nested in them are still rewritten. A
/// group nested inside one that was already rewritten is skipped.
pub fn replace_capture(
    regex: &Regex,
    text: &str,
    replacements: &GroupReplacements,
) -> Result<String, CaptureError> {
    let replacements = replacements.by_index(regex)?;

    let result = regex.replace_all(text, |captures: &Captures<'_>| {
        let Some(whole) = captures.get(0) else {
            return String::new();
        };
        let mut groups: Vec<(usize, regex::Match<'_>)> = (1..captures.len())
            .filter_map(|index| captures.get(index).map(|m| (index, m)))
            .collect();
        groups.sort_by_key(|(index, m)| (m.start(), *index));

        let mut out = String::new();
        let mut cursor = whole.start();
        for (index, group) in groups {
            let Some(replacement) = replacements.get(&index) else {
                continue;
            };
            if group.start() < cursor {
                continue;
            }
            out.push_str(&text[cursor..group.start()]);
            out.push_str(replacement);
            cursor = group.end();
        }
        out.push_str(&text[cursor..whole.end()]);
        out
    });
    Ok(result.into_owned())
}

/// Groups of the first match; unmatched groups are empty. No match gives
/// an empty list.
pub fn first_match_groups(regex: &Regex, text: &str) -> Vec<String> {
    regex
        .captures(text)
        .map(|captures| {
            captures
                .iter()
                .map(|group| group.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options() {
        let regex = build_regex("^foo.bar$", Some("ims")).unwrap();
        assert!(regex.is_match("x\nFOO\nBAR"));
        let plain = build_regex("^foo.bar$", None).unwrap();
        assert!(!plain.is_match("x\nFOO\nBAR"));
        let spaced = build_regex("a b c", Some("x")).unwrap();
        assert!(spaced.is_match("abc"));
    }

    #[test]
    fn test_replace_positional_groups() {
        let regex = build_regex(r"(\w+) = (\d+);", None).unwrap();
        let replaced = replace_capture(
            &regex,
            "int a = 1; int b = 2;",
            &GroupReplacements::Positional(vec!["x".into(), "9".into()]),
        )
        .unwrap();
        assert_eq!(replaced, "int x = 9; int x = 9;");
    }

    #[test]
    fn test_missing_positional_keeps_text() {
        let regex = build_regex(r"(\w+)\((\d+)\)", None).unwrap();
        let replaced = replace_capture(
            &regex,
            "Damage(10)",
            &GroupReplacements::Positional(vec!["Heal".into()]),
        )
        .unwrap();
        assert_eq!(replaced, "Heal(10)");
    }

    #[test]
    fn test_named_groups() {
        let regex = build_regex(r"(?P<name>\w+): (?P<value>\d+)", None).unwrap();
        let named = GroupReplacements::Named(
            [("value".to_string(), "42".to_string())].into_iter().collect(),
        );
        assert_eq!(replace_capture(&regex, "weight: 3", &named).unwrap(), "weight: 42");

        let by_number =
            GroupReplacements::Named([("1".to_string(), "mass".to_string())].into_iter().collect());
        assert_eq!(
            replace_capture(&regex, "weight: 3", &by_number).unwrap(),
            "mass: 3"
        );

        let unknown =
            GroupReplacements::Named([("nope".to_string(), "x".to_string())].into_iter().collect());
        assert_eq!(
            replace_capture(&regex, "weight: 3", &unknown),
            Err(CaptureError::UnknownGroup("nope".into()))
        );
    }

    #[test]
    fn test_nested_group_skipped() {
        let regex = build_regex(r"((a)b)c", None).unwrap();
        let replaced = replace_capture(
            &regex,
            "abc",
            &GroupReplacements::Positional(vec!["X".into(), "Y".into()]),
        )
        .unwrap();
        assert_eq!(replaced, "Xc");
    }

    #[test]
    fn test_group_inside_kept_group_is_replaced() {
        let regex = build_regex(r"((a)b)c", None).unwrap();
        let inner =
            GroupReplacements::Named([("2".to_string(), "Y".to_string())].into_iter().collect());
        assert_eq!(replace_capture(&regex, "abc abc", &inner).unwrap(), "Ybc Ybc");

        let regex = build_regex(r"(?P<call>(?P<name>\w+)\((?P<arg>\d+)\))", None).unwrap();
        let named = GroupReplacements::Named(
            [
                ("name".to_string(), "Heal".to_string()),
                ("arg".to_string(), "5".to_string()),
            ]
            .into_iter()
            .collect(),
        );
        assert_eq!(replace_capture(&regex, "x = Damage(10);", &named).unwrap(), "x = Heal(5);");
    }

    #[test]
    fn test_too_many_positional_replacements() {
        let regex = build_regex(r"(a)b", None).unwrap();
        assert_eq!(
            replace_capture(
                &regex,
                "ab",
                &GroupReplacements::Positional(vec!["X".into(), "Y".into()])
            ),
            Err(CaptureError::TooManyReplacements {
                given: 2,
                groups: 1
            })
        );
    }

    #[test]
    fn test_first_match_groups() {
        let regex = build_regex(r"(\d+)(x)?", None).unwrap();
        assert_eq!(first_match_groups(&regex, "ab 12 34"), vec!["12", "12", ""]);
        assert!(first_match_groups(&regex, "none").is_empty());
    }
}
