//! Red layer: positioned cursors over a green tree

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::green::{GreenElement, GreenNode, GreenToken, Trivia};
use super::kind::SyntaxKind;
use super::lexer::Token;
use crate::error::Span;

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

/// A parsed document. Cheap to clone; every edit produces a new tree with a
/// new identity.
#[derive(Clone)]
pub struct SyntaxTree {
    id: u64,
    root: Arc<GreenNode>,
}

impl SyntaxTree {
    pub fn new(root: GreenNode) -> Self {
        Self {
            id: NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed),
            root: Arc::new(root),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn green(&self) -> &Arc<GreenNode> {
        &self.root
    }

    pub fn root(&self) -> SyntaxNode {
        SyntaxNode {
            tree: self.clone(),
            green: self.root.clone(),
            path: Vec::new(),
            offset: 0,
        }
    }

    /// New tree with the node at `path` replaced by `node`.
    pub fn replace_at(&self, path: &[usize], node: GreenNode) -> SyntaxTree {
        SyntaxTree::new(replace_in(&self.root, path, node))
    }

    /// Node reached by following child indices from the root.
    pub fn node_at(&self, path: &[usize]) -> Option<SyntaxNode> {
        let mut node = self.root();
        for &index in path {
            node = node.child_at(index)?;
        }
        Some(node)
    }
}

fn replace_in(node: &GreenNode, path: &[usize], replacement: GreenNode) -> GreenNode {
    match path.split_first() {
        None => replacement,
        Some((&index, rest)) => match node.children().get(index) {
            Some(GreenElement::Node(child)) => node.with_child(
                index,
                GreenElement::Node(Arc::new(replace_in(child, rest, replacement))),
            ),
            _ => node.clone(),
        },
    }
}

impl fmt::Display for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.fmt(f)
    }
}

impl fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxTree")
            .field("id", &self.id)
            .field("len", &self.root.full_len())
            .finish()
    }
}

/// A node together with where it sits: which tree, the child indices leading
/// to it from the root, and its byte offset.
#[derive(Clone)]
pub struct SyntaxNode {
    tree: SyntaxTree,
    green: Arc<GreenNode>,
    path: Vec<usize>,
    offset: usize,
}

impl SyntaxNode {
    pub fn kind(&self) -> SyntaxKind {
        self.green.kind()
    }

    pub fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    pub fn green(&self) -> &Arc<GreenNode> {
        &self.green
    }

    pub fn path(&self) -> &[usize] {
        &self.path
    }

    /// Byte range including leading and trailing trivia.
    pub fn full_span(&self) -> Span {
        self.offset..self.offset + self.green.full_len()
    }

    /// Byte range of the node without its outer trivia.
    pub fn span(&self) -> Span {
        let leading = self.green.first_token().map_or(0, GreenToken::leading_len);
        let trailing = self.green.last_token().map_or(0, GreenToken::trailing_len);
        let full = self.full_span();
        let start = (full.start + leading).min(full.end);
        start..full.end.saturating_sub(trailing).max(start)
    }

    pub fn full_text(&self) -> String {
        self.green.to_string()
    }

    /// Text without the outer trivia.
    pub fn text(&self) -> String {
        let full = self.full_text();
        let span = self.span();
        let start = span.start - self.offset;
        let end = span.end - self.offset;
        full[start..end].to_string()
    }

    pub fn leading_trivia(&self) -> &[Trivia] {
        self.green.leading_trivia()
    }

    pub fn trailing_trivia(&self) -> &[Trivia] {
        self.green.trailing_trivia()
    }

    fn child_at(&self, index: usize) -> Option<SyntaxNode> {
        let children = self.green.children();
        let node = children.get(index)?.as_node()?.clone();
        let offset = self.offset
            + children[..index]
                .iter()
                .map(GreenElement::full_len)
                .sum::<usize>();
        let mut path = self.path.clone();
        path.push(index);
        Some(SyntaxNode {
            tree: self.tree.clone(),
            green: node,
            path,
            offset,
        })
    }

    /// Direct child nodes; tokens are skipped.
    pub fn children(&self) -> Vec<SyntaxNode> {
        let mut result = Vec::new();
        let mut offset = self.offset;
        for (index, child) in self.green.children().iter().enumerate() {
            if let GreenElement::Node(node) = child {
                let mut path = self.path.clone();
                path.push(index);
                result.push(SyntaxNode {
                    tree: self.tree.clone(),
                    green: node.clone(),
                    path,
                    offset,
                });
            }
            offset += child.full_len();
        }
        result
    }

    /// Direct child tokens with their kinds.
    pub fn child_tokens(&self) -> impl Iterator<Item = &GreenToken> + '_ {
        self.green
            .children()
            .iter()
            .filter_map(|child| child.as_token().map(|t| t.as_ref()))
    }

    /// All nodes below this one in document order, excluding itself.
    pub fn descendants(&self) -> Vec<SyntaxNode> {
        let mut result = Vec::new();
        self.collect_descendants(&mut result);
        result
    }

    fn collect_descendants(&self, out: &mut Vec<SyntaxNode>) {
        for child in self.children() {
            out.push(child.clone());
            child.collect_descendants(out);
        }
    }

    pub fn parent(&self) -> Option<SyntaxNode> {
        let (_, parent_path) = self.path.split_last()?;
        self.tree.node_at(parent_path)
    }

    /// This node followed by each enclosing node up to the root.
    pub fn ancestors_and_self(&self) -> Vec<SyntaxNode> {
        let mut result = vec![self.clone()];
        let mut current = self.parent();
        while let Some(node) = current {
            current = node.parent();
            result.push(node);
        }
        result
    }

    /// Deepest node (possibly this one) whose full span contains `span`.
    pub fn innermost_covering(&self, span: &Span) -> Option<SyntaxNode> {
        let full = self.full_span();
        if span.start < full.start || span.end > full.end {
            return None;
        }
        let mut current = self.clone();
        loop {
            let next = current.children().into_iter().find(|child| {
                let child_span = child.full_span();
                child_span.start <= span.start && span.end <= child_span.end
            });
            match next {
                Some(child) => current = child,
                None => return Some(current),
            }
        }
    }

    /// Same position in the same tree.
    pub fn is_same_node(&self, other: &SyntaxNode) -> bool {
        self.tree.id() == other.tree.id() && self.path == other.path
    }

    /// Same kind and the same content, trivia included.
    pub fn is_equivalent_to(&self, other: &SyntaxNode) -> bool {
        self.green == other.green
    }

    /// Declared name of a declaration node.
    ///
    /// Namespaces report their full dotted name; explicit interface
    /// implementations report the final segment.
    pub fn name(&self) -> Option<String> {
        if self.kind() == SyntaxKind::NamespaceDeclaration {
            return self
                .children()
                .into_iter()
                .find(|c| c.kind() == SyntaxKind::QualifiedName)
                .map(|q| squeeze(&q.text()));
        }
        if self.kind() == SyntaxKind::VariableDeclarator {
            return self
                .child_tokens()
                .find(|t| t.kind() == Some(Token::Ident))
                .map(|t| t.text().to_string());
        }
        let name = self
            .children()
            .into_iter()
            .find(|c| c.kind() == SyntaxKind::Name)?;
        let text = squeeze(&name.text());
        let last = text.rsplit('.').next().unwrap_or_default();
        Some(last.to_string())
    }

    /// Every name this node declares. Field and local declarations may
    /// declare several.
    pub fn declared_names(&self) -> Vec<String> {
        match self.kind() {
            SyntaxKind::FieldDeclaration | SyntaxKind::LocalDeclarationStatement => self
                .children()
                .into_iter()
                .filter(|c| c.kind() == SyntaxKind::VariableDeclarator)
                .filter_map(|c| c.name())
                .collect(),
            _ => self.name().into_iter().collect(),
        }
    }
}

fn squeeze(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

impl fmt::Display for SyntaxNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.green.fmt(f)
    }
}

impl fmt::Debug for SyntaxNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:?}", self.kind(), self.full_span())
    }
}
