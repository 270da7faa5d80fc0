//! Error types for lexing and parsing source files

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unrecognized input {found:?} at {span:?}")]
    Lex { span: Span, found: String },

    #[error("Parse error at {span:?}: {message}")]
    Syntax {
        span: Span,
        message: String,
        expected: Vec<String>,
    },
}

impl ParseError {
    pub fn span(&self) -> &Span {
        match self {
            ParseError::Lex { span, .. } | ParseError::Syntax { span, .. } => span,
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let (message, label) = match self {
            ParseError::Lex { found, .. } => (
                "Unrecognized input".to_string(),
                format!("no token starts with {found:?}"),
            ),
            ParseError::Syntax {
                message, expected, ..
            } => {
                let expected_str = if expected.is_empty() {
                    String::new()
                } else {
                    format!("\nExpected: {}", expected.join(", "))
                };
                (message.clone(), format!("{}{}", message, expected_str))
            }
        };

        let span = self.span().clone();
        let mut buf = Vec::new();
        let written = Report::build(ReportKind::Error, filename, span.start)
            .with_message(&message)
            .with_label(
                Label::new((filename, span))
                    .with_message(label)
                    .with_color(Color::Red),
            )
            .finish()
            .write((filename, Source::from(source)), &mut buf);

        match written {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_mentions_message_and_file() {
        let source = "class A { int x = ; }";
        let err = crate::syntax::parse(source).expect_err("Should fail");
        let report = err.format(source, "A.cs");
        assert!(report.contains("A.cs"));
        assert!(report.contains("Unexpected"));
    }

    #[test]
    fn test_span_accessor() {
        let err = ParseError::Lex {
            span: 3..4,
            found: "\"".to_string(),
        };
        assert_eq!(err.span(), &(3..4));
    }
}
