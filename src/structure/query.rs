//! Finding nodes: by declared name, by kind filter and text, and picking the
//! outermost or innermost of a nested selection

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use regex::Regex;

use super::StructureError;
use crate::error::Span;
use crate::syntax::{SyntaxKind, SyntaxNode};

/// Declaration kinds that can be looked up by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    /// Classes, structs, interfaces, records and enums
    Class,
    /// Methods, constructors, operators and local functions
    Method,
    /// Field declarations, matched by any of their declarators
    Field,
    Property,
    Namespace,
    Exact(SyntaxKind),
}

impl DeclKind {
    pub fn matches(&self, kind: SyntaxKind) -> bool {
        match self {
            DeclKind::Class => kind.is_type_declaration(),
            DeclKind::Method => matches!(
                kind,
                SyntaxKind::MethodDeclaration
                    | SyntaxKind::ConstructorDeclaration
                    | SyntaxKind::OperatorDeclaration
                    | SyntaxKind::LocalFunctionStatement
            ),
            DeclKind::Field => kind == SyntaxKind::FieldDeclaration,
            DeclKind::Property => kind == SyntaxKind::PropertyDeclaration,
            DeclKind::Namespace => kind == SyntaxKind::NamespaceDeclaration,
            DeclKind::Exact(exact) => kind == *exact,
        }
    }
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeclKind::Class => f.write_str("class"),
            DeclKind::Method => f.write_str("method"),
            DeclKind::Field => f.write_str("field"),
            DeclKind::Property => f.write_str("property"),
            DeclKind::Namespace => f.write_str("namespace"),
            DeclKind::Exact(kind) => kind.fmt(f),
        }
    }
}

fn named<'a>(
    root: &SyntaxNode,
    kind: &'a DeclKind,
    name: &'a str,
) -> impl Iterator<Item = SyntaxNode> + 'a {
    root.descendants().into_iter().filter(move |node| {
        kind.matches(node.kind()) && node.declared_names().iter().any(|n| n == name)
    })
}

/// First declaration of `kind` named `name` in document order.
pub fn find_by_kind_and_name(
    root: &SyntaxNode,
    kind: DeclKind,
    name: &str,
) -> Result<SyntaxNode, StructureError> {
    named(root, &kind, name)
        .next()
        .ok_or_else(|| StructureError::NotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        })
}

/// Like [`find_by_kind_and_name`], but more than one match is an error.
pub fn find_unique_by_kind_and_name(
    root: &SyntaxNode,
    kind: DeclKind,
    name: &str,
) -> Result<SyntaxNode, StructureError> {
    let mut matches: Vec<SyntaxNode> = named(root, &kind, name).collect();
    match matches.len() {
        0 => Err(StructureError::NotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        }),
        1 => Ok(matches.remove(0)),
        count => Err(StructureError::AmbiguousMatch {
            kind: kind.to_string(),
            name: name.to_string(),
            count,
            spans: matches.iter().map(SyntaxNode::full_span).collect(),
        }),
    }
}

/// Kind filters accepted by node searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeFilter {
    Class,
    Field,
    Member,
    Method,
    Property,
    Statement,
    Expression,
    Argument,
    Exact(SyntaxKind),
}

impl NodeFilter {
    pub fn matches(&self, kind: SyntaxKind) -> bool {
        match self {
            NodeFilter::Class => DeclKind::Class.matches(kind),
            NodeFilter::Field => DeclKind::Field.matches(kind),
            NodeFilter::Member => kind.is_member_declaration(),
            NodeFilter::Method => DeclKind::Method.matches(kind),
            NodeFilter::Property => DeclKind::Property.matches(kind),
            NodeFilter::Statement => kind.is_statement(),
            NodeFilter::Expression => kind.is_expression(),
            NodeFilter::Argument => kind == SyntaxKind::Argument,
            NodeFilter::Exact(exact) => kind == *exact,
        }
    }
}

impl FromStr for NodeFilter {
    type Err = StructureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "class" => Ok(NodeFilter::Class),
            "field" => Ok(NodeFilter::Field),
            "member" => Ok(NodeFilter::Member),
            "method" => Ok(NodeFilter::Method),
            "property" => Ok(NodeFilter::Property),
            "statement" => Ok(NodeFilter::Statement),
            "expression" => Ok(NodeFilter::Expression),
            "argument" => Ok(NodeFilter::Argument),
            other => SyntaxKind::from_name(other)
                .map(NodeFilter::Exact)
                .ok_or_else(|| StructureError::InvalidFilter(other.to_string())),
        }
    }
}

/// Anything that looks like a node: a live [`SyntaxNode`] or a detached
/// anchor handed through a template.
pub trait NodeLike {
    fn kind(&self) -> SyntaxKind;
    fn full_span(&self) -> Span;
    fn full_text(&self) -> Cow<'_, str>;
}

impl NodeLike for SyntaxNode {
    fn kind(&self) -> SyntaxKind {
        SyntaxNode::kind(self)
    }

    fn full_span(&self) -> Span {
        SyntaxNode::full_span(self)
    }

    fn full_text(&self) -> Cow<'_, str> {
        Cow::Owned(SyntaxNode::full_text(self))
    }
}

/// Kind filter, substring and regex tests combined; unset parts match
/// everything. Text tests run over the full text, trivia included.
#[derive(Debug, Clone, Default)]
pub struct NodePredicate {
    filter: Option<NodeFilter>,
    contains: Option<String>,
    pattern: Option<Regex>,
}

impl NodePredicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: NodeFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.contains = Some(text.into());
        self
    }

    pub fn with_regex(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    pub fn matches<N: NodeLike>(&self, node: &N) -> bool {
        if let Some(filter) = &self.filter {
            if !filter.matches(node.kind()) {
                return false;
            }
        }
        if self.contains.is_none() && self.pattern.is_none() {
            return true;
        }
        let text = node.full_text();
        if let Some(needle) = &self.contains {
            if !text.contains(needle.as_str()) {
                return false;
            }
        }
        match &self.pattern {
            Some(pattern) => pattern.is_match(&text),
            None => true,
        }
    }
}

/// Every node below `root` that satisfies `predicate`, in document order.
pub fn find_all(root: &SyntaxNode, predicate: &NodePredicate) -> Vec<SyntaxNode> {
    root.descendants()
        .into_iter()
        .filter(|node| predicate.matches(node))
        .collect()
}

pub fn filter_text<N: NodeLike + Clone>(nodes: &[N], text: &str) -> Vec<N> {
    let predicate = NodePredicate::new().with_text(text);
    nodes.iter().filter(|n| predicate.matches(*n)).cloned().collect()
}

pub fn filter_regex<N: NodeLike + Clone>(nodes: &[N], pattern: &Regex) -> Vec<N> {
    let predicate = NodePredicate::new().with_regex(pattern.clone());
    nodes.iter().filter(|n| predicate.matches(*n)).cloned().collect()
}

fn overlaps(a: &Span, b: &Span) -> bool {
    a.start < b.end && b.start < a.end
}

/// Pick the node that spans the most (or least) text, after checking that
/// the selection is one nested chain rather than scattered matches.
fn pick<N: NodeLike + Clone>(nodes: &[N], outermost: bool) -> Result<N, StructureError> {
    let Some(first) = nodes.first() else {
        return Err(StructureError::NotFound {
            kind: "node".to_string(),
            name: "(empty selection)".to_string(),
        });
    };

    let mut largest = first;
    for node in nodes {
        if node.full_span().len() > largest.full_span().len() {
            largest = node;
        }
    }
    let largest_span = largest.full_span();
    if nodes.iter().any(|n| !overlaps(&n.full_span(), &largest_span)) {
        return Err(StructureError::DisjointNodeSet {
            largest: largest_span,
            spans: nodes.iter().map(NodeLike::full_span).collect(),
        });
    }

    if outermost {
        return Ok(largest.clone());
    }
    let mut smallest = first;
    for node in nodes {
        if node.full_span().len() < smallest.full_span().len() {
            smallest = node;
        }
    }
    Ok(smallest.clone())
}

/// The node with the largest full span.
pub fn shallowest<N: NodeLike + Clone>(nodes: &[N]) -> Result<N, StructureError> {
    pick(nodes, true)
}

/// The node with the smallest full span.
pub fn deepest<N: NodeLike + Clone>(nodes: &[N]) -> Result<N, StructureError> {
    pick(nodes, false)
}
