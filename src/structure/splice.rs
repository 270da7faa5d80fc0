//! Trivia-preserving replace and insert
//!
//! The edited node keeps the spacing around it and its indentation. Only
//! its content changes, plus any comments the new content brings along.
//! Multi-line content is shifted to the indentation of the spot it lands in.

use std::sync::Arc;

use super::resolve::resolve_node;
use super::StructureError;
use crate::syntax::{
    parse_fragment, FragmentKind, GreenElement, GreenNode, GreenToken, SyntaxKind, SyntaxNode,
    SyntaxTree, Token, Trivia, TriviaKind,
};

const DEFAULT_INDENT_UNIT: &str = "    ";

/// New content for a replace or insert.
#[derive(Debug, Clone)]
pub enum Replacement {
    /// An already parsed node, possibly from another tree
    Node(SyntaxNode),
    /// Source text, parsed according to where it goes
    Text(String),
}

impl From<SyntaxNode> for Replacement {
    fn from(node: SyntaxNode) -> Self {
        Replacement::Node(node)
    }
}

impl From<String> for Replacement {
    fn from(text: String) -> Self {
        Replacement::Text(text)
    }
}

impl From<&str> for Replacement {
    fn from(text: &str) -> Self {
        Replacement::Text(text.to_string())
    }
}

impl Replacement {
    fn into_green(self, kind: FragmentKind) -> Result<GreenNode, StructureError> {
        match self {
            Replacement::Node(node) => Ok(node.green().as_ref().clone()),
            Replacement::Text(text) => {
                let node = parse_fragment(&text, kind)?;
                Ok(node.green().as_ref().clone())
            }
        }
    }
}

/// Split leading trivia into the run of pure spacing that starts it and
/// everything from the first comment on.
fn split_leading(trivia: &[Trivia]) -> (Vec<Trivia>, Vec<Trivia>) {
    let at = trivia
        .iter()
        .position(|t| !t.is_spacing())
        .unwrap_or(trivia.len());
    (trivia[..at].to_vec(), trivia[at..].to_vec())
}

/// Split trailing trivia into everything up to the last comment and the
/// run of pure spacing that ends it.
fn split_trailing(trivia: &[Trivia]) -> (Vec<Trivia>, Vec<Trivia>) {
    let at = trivia
        .iter()
        .rposition(|t| !t.is_spacing())
        .map_or(0, |i| i + 1);
    (trivia[..at].to_vec(), trivia[at..].to_vec())
}

/// Whitespace following the last line break of a leading trivia list.
fn indentation_of(trivia: &[Trivia]) -> String {
    let start = trivia
        .iter()
        .rposition(|t| t.kind == TriviaKind::Newline)
        .map_or(0, |i| i + 1);
    match trivia.get(start) {
        Some(t) if t.kind == TriviaKind::Whitespace => t.text.clone(),
        _ => String::new(),
    }
}

/// Put `indent` in front of every line started within `trivia`, and at the
/// end when the token that follows starts a line. Empty lines stay empty.
fn indent_trivia(trivia: &[Trivia], at_line_start: bool, indent: &str) -> Vec<Trivia> {
    if indent.is_empty() {
        return trivia.to_vec();
    }
    let mut out = Vec::with_capacity(trivia.len() + 1);
    let mut line_start = at_line_start;
    for t in trivia {
        match t.kind {
            TriviaKind::Newline => out.push(t.clone()),
            TriviaKind::Whitespace if line_start => {
                out.push(Trivia::whitespace(format!("{indent}{}", t.text)))
            }
            _ => {
                if line_start {
                    out.push(Trivia::whitespace(indent));
                }
                out.push(t.clone());
            }
        }
        line_start = t.kind == TriviaKind::Newline;
    }
    if line_start {
        out.push(Trivia::whitespace(indent));
    }
    out
}

/// Indent every token of `node` that starts a line, except the first.
fn reindent(node: &GreenNode, indent: &str) -> GreenNode {
    if indent.is_empty() {
        return node.clone();
    }
    let mut previous_ends_line = false;
    node.map_tokens(&mut |index, token: &GreenToken| {
        let at_line_start = previous_ends_line;
        previous_ends_line = token.ends_line();
        if index == 0 {
            return token.clone();
        }
        token.with_leading(indent_trivia(token.leading(), at_line_start, indent))
    })
}

/// The line break the file uses first, or `\n` for a single-line file.
fn newline_of(root: &GreenNode) -> Trivia {
    root.tokens()
        .into_iter()
        .flat_map(|token| token.leading().iter().chain(token.trailing()))
        .find(|t| t.kind == TriviaKind::Newline)
        .cloned()
        .unwrap_or_else(Trivia::newline)
}

/// The shortest indentation of any non-blank line, or four spaces when no
/// line is indented.
fn indent_unit_of(root: &GreenNode) -> String {
    let mut unit: Option<&str> = None;
    let mut line_start = true;
    for token in root.tokens() {
        let mut trivia = token.leading().iter().peekable();
        while let Some(t) = trivia.next() {
            let blank = match trivia.peek() {
                Some(next) => next.kind == TriviaKind::Newline,
                None => token.is_end_of_file(),
            };
            if line_start
                && t.kind == TriviaKind::Whitespace
                && !blank
                && unit.map_or(true, |u| t.text.len() < u.len())
            {
                unit = Some(&t.text);
            }
            line_start = t.kind == TriviaKind::Newline;
        }
        if !token.text().is_empty() {
            line_start = false;
        }
        if token.ends_line() {
            line_start = true;
        }
    }
    unit.unwrap_or(DEFAULT_INDENT_UNIT).to_string()
}

/// Rewrite every line break in `node` to `newline`.
fn with_line_breaks(node: &GreenNode, newline: &Trivia) -> GreenNode {
    let convert = |trivia: &[Trivia]| -> Vec<Trivia> {
        trivia
            .iter()
            .map(|t| match t.kind {
                TriviaKind::Newline => newline.clone(),
                _ => t.clone(),
            })
            .collect()
    };
    node.map_tokens(&mut |_, token: &GreenToken| {
        token
            .with_leading(convert(token.leading()))
            .with_trailing(convert(token.trailing()))
    })
}

/// Comments that come after the last line break are the content's own
/// indentation, which gets replaced.
fn drop_line_indent(mut comments: Vec<Trivia>) -> Vec<Trivia> {
    let len = comments.len();
    if len >= 2
        && comments[len - 1].kind == TriviaKind::Whitespace
        && comments[len - 2].kind == TriviaKind::Newline
    {
        comments.pop();
    }
    comments
}

/// Build the node that takes `old`'s place: `new`'s content, reindented to
/// `old`'s column, wrapped in `old`'s spacing.
pub fn splice(old: &GreenNode, new: &GreenNode) -> GreenNode {
    let old_leading = old.leading_trivia();
    let old_trailing = old.trailing_trivia();
    let indent = indentation_of(old_leading);

    let (old_spacing_before, _) = split_leading(old_leading);
    let (_, old_spacing_after) = split_trailing(old_trailing);
    let (_, new_comments_before) = split_leading(new.leading_trivia());
    let (new_comments_after, _) = split_trailing(new.trailing_trivia());

    let leading = if new_comments_before.is_empty() {
        old_leading.to_vec()
    } else {
        let mut leading = old_spacing_before;
        leading.extend(indent_trivia(
            &drop_line_indent(new_comments_before),
            false,
            &indent,
        ));
        leading
    };
    let trailing = if new_comments_after.is_empty() {
        old_trailing.to_vec()
    } else {
        let mut trailing = new_comments_after;
        trailing.extend(old_spacing_after);
        trailing
    };

    reindent(new, &indent)
        .with_leading_trivia(leading)
        .with_trailing_trivia(trailing)
}

/// Replace `target` with `replacement`, returning the edited tree.
///
/// `target` may come from an earlier tree of the same text; it is resolved
/// against `tree` first. Text is parsed as a member, statement or
/// expression depending on what `target` is.
pub fn replace(
    tree: &SyntaxTree,
    target: &SyntaxNode,
    replacement: Replacement,
) -> Result<SyntaxTree, StructureError> {
    let target = resolve_node(tree, target)?;
    let new = replacement.into_green(FragmentKind::for_target(target.kind()))?;
    let new = with_line_breaks(&new, &newline_of(tree.green()));
    let spliced = splice(target.green(), &new);
    tracing::debug!(kind = %target.kind(), span = ?target.full_span(), "replaced node");
    Ok(tree.replace_at(target.path(), spliced))
}

/// Where new content goes inside a container, and what it counts as.
struct InsertionPoint {
    index: usize,
    fragment: FragmentKind,
}

fn insertion_point(container: &SyntaxNode) -> Option<InsertionPoint> {
    let kind = container.kind();
    let children = container.green().children();
    let last_brace = children
        .iter()
        .rposition(|c| matches!(c.as_token(), Some(t) if t.kind() == Some(Token::RBrace)));

    match kind {
        SyntaxKind::CompilationUnit => {
            let eof = children
                .iter()
                .rposition(|c| matches!(c.as_token(), Some(t) if t.is_end_of_file()))
                .unwrap_or(children.len());
            Some(InsertionPoint {
                index: eof,
                fragment: FragmentKind::Member,
            })
        }
        SyntaxKind::NamespaceDeclaration => Some(InsertionPoint {
            // file-scoped namespaces run to the end of the file
            index: last_brace.unwrap_or(children.len()),
            fragment: FragmentKind::Member,
        }),
        SyntaxKind::Block => last_brace.map(|index| InsertionPoint {
            index,
            fragment: FragmentKind::Statement,
        }),
        k if k.is_type_declaration() && k != SyntaxKind::EnumDeclaration => {
            last_brace.map(|index| InsertionPoint {
                index,
                fragment: FragmentKind::Member,
            })
        }
        _ => None,
    }
}

fn last_token_of(element: &GreenElement) -> Option<&GreenToken> {
    match element {
        GreenElement::Node(node) => node.last_token(),
        GreenElement::Token(token) => Some(token),
    }
}

/// Append `content` as the last member of a type, namespace or file, or as
/// the last statement of a block.
///
/// The new member is separated from a preceding one by a blank line and
/// indented like it; the first member of a container is indented one level
/// deeper than the container, by the file's own indentation step. Line
/// breaks follow the file's.
pub fn insert(
    tree: &SyntaxTree,
    container: &SyntaxNode,
    content: Replacement,
) -> Result<SyntaxTree, StructureError> {
    let container = resolve_node(tree, container)?;
    let Some(point) = insertion_point(&container) else {
        return Err(StructureError::InvalidTarget {
            kind: container.kind(),
            span: container.full_span(),
        });
    };
    let newline = newline_of(tree.green());
    let new = with_line_breaks(&content.into_green(point.fragment)?, &newline);

    let children = container.green().children();
    let before = &children[..point.index];
    let previous_member = before
        .iter()
        .rev()
        .filter_map(GreenElement::as_node)
        .find(|node| match point.fragment {
            FragmentKind::Statement => node.kind().is_statement(),
            _ => node.kind().is_member_declaration() || node.kind() == SyntaxKind::UsingDirective,
        });
    let previous_token = before.iter().rev().find_map(last_token_of);

    let indent = match previous_member {
        Some(member) => indentation_of(member.leading_trivia()),
        None if container.kind() == SyntaxKind::CompilationUnit => String::new(),
        None if container.kind() == SyntaxKind::NamespaceDeclaration && !has_brace(children) => {
            indentation_of(container.leading_trivia())
        }
        None => format!(
            "{}{}",
            indentation_of(container.leading_trivia()),
            indent_unit_of(tree.green())
        ),
    };

    let mut leading = Vec::new();
    if previous_token.is_some_and(|t| !t.ends_line()) {
        leading.push(newline.clone());
    }
    if previous_member.is_some() {
        leading.push(newline.clone());
    }
    let (_, comments_before) = split_leading(new.leading_trivia());
    let comments_before = drop_line_indent(comments_before);
    if !indent.is_empty() {
        leading.push(Trivia::whitespace(indent.as_str()));
    }
    leading.extend(indent_trivia(&comments_before, false, &indent));

    let (mut trailing, _) = split_trailing(new.trailing_trivia());
    trailing.push(newline);

    let inserted = reindent(&new, &indent)
        .with_leading_trivia(leading)
        .with_trailing_trivia(trailing);
    let updated = container
        .green()
        .with_inserted_child(point.index, GreenElement::Node(Arc::new(inserted)));
    tracing::debug!(kind = %container.kind(), span = ?container.full_span(), "inserted node");
    Ok(tree.replace_at(container.path(), updated))
}

fn has_brace(children: &[GreenElement]) -> bool {
    children
        .iter()
        .any(|c| matches!(c.as_token(), Some(t) if t.kind() == Some(Token::LBrace)))
}
