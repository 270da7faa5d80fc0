//! Mapping nodes found in one tree onto another tree of the same text

use std::borrow::Cow;

use super::query::NodeLike;
use super::StructureError;
use crate::error::Span;
use crate::syntax::{SyntaxKind, SyntaxNode, SyntaxTree};

/// A node detached from its tree: enough to find it again after the text
/// has been printed and re-parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAnchor {
    pub kind: SyntaxKind,
    /// Full span, trivia included
    pub span: Span,
    /// Full text, trivia included
    pub text: String,
}

impl NodeAnchor {
    pub fn of(node: &SyntaxNode) -> Self {
        Self {
            kind: node.kind(),
            span: node.full_span(),
            text: node.full_text(),
        }
    }
}

impl NodeLike for NodeAnchor {
    fn kind(&self) -> SyntaxKind {
        self.kind
    }

    fn full_span(&self) -> Span {
        self.span.clone()
    }

    fn full_text(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.text)
    }
}

/// Find `node` in `tree`.
///
/// A node of the same tree is returned as is. Otherwise the innermost node
/// covering the same span is taken and its ancestors searched for the
/// closest one with identical content.
pub fn resolve_node(tree: &SyntaxTree, node: &SyntaxNode) -> Result<SyntaxNode, StructureError> {
    if node.tree().id() == tree.id() {
        return Ok(node.clone());
    }
    resolve_by(tree, node.kind(), node.full_span(), |candidate| {
        candidate.green() == node.green()
    })
}

pub fn resolve_anchor(tree: &SyntaxTree, anchor: &NodeAnchor) -> Result<SyntaxNode, StructureError> {
    resolve_by(tree, anchor.kind, anchor.span.clone(), |candidate| {
        candidate.kind() == anchor.kind && candidate.full_text() == anchor.text
    })
}

fn resolve_by<F>(
    tree: &SyntaxTree,
    kind: SyntaxKind,
    span: Span,
    equivalent: F,
) -> Result<SyntaxNode, StructureError>
where
    F: Fn(&SyntaxNode) -> bool,
{
    let found = tree
        .root()
        .innermost_covering(&span)
        .and_then(|covering| {
            covering
                .ancestors_and_self()
                .into_iter()
                .find(|candidate| equivalent(candidate))
        });
    match found {
        Some(node) => {
            tracing::trace!(%kind, ?span, "resolved node in tree {}", tree.id());
            Ok(node)
        }
        None => Err(StructureError::StaleNodeReference { kind, span }),
    }
}
