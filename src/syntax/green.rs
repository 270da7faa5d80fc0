//! Immutable green tree: tokens with their trivia, and nodes over them
//!
//! Green elements carry no positions, so unchanged subtrees are shared
//! between a tree and every tree edited from it.

use std::fmt;
use std::sync::Arc;

use super::kind::SyntaxKind;
use super::lexer::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriviaKind {
    Whitespace,
    Newline,
    LineComment,
    BlockComment,
    Directive,
}

impl TriviaKind {
    pub(crate) fn from_token(token: Token) -> Option<TriviaKind> {
        match token {
            Token::Whitespace => Some(TriviaKind::Whitespace),
            Token::Newline => Some(TriviaKind::Newline),
            Token::LineComment => Some(TriviaKind::LineComment),
            Token::BlockComment => Some(TriviaKind::BlockComment),
            Token::Directive => Some(TriviaKind::Directive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Trivia {
    pub kind: TriviaKind,
    pub text: String,
}

impl Trivia {
    pub fn new(kind: TriviaKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn whitespace(text: impl Into<String>) -> Self {
        Self::new(TriviaKind::Whitespace, text)
    }

    pub fn newline() -> Self {
        Self::new(TriviaKind::Newline, "\n")
    }

    /// Whitespace and line breaks; everything else counts as a comment.
    pub fn is_spacing(&self) -> bool {
        matches!(self.kind, TriviaKind::Whitespace | TriviaKind::Newline)
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// A significant token with the trivia attached to it.
///
/// `kind` is `None` only for the end-of-file token, which has no text and
/// holds whatever trivia follows the last real token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GreenToken {
    kind: Option<Token>,
    text: String,
    leading: Vec<Trivia>,
    trailing: Vec<Trivia>,
}

impl GreenToken {
    pub fn new(
        kind: Option<Token>,
        text: impl Into<String>,
        leading: Vec<Trivia>,
        trailing: Vec<Trivia>,
    ) -> Self {
        Self {
            kind,
            text: text.into(),
            leading,
            trailing,
        }
    }

    pub fn kind(&self) -> Option<Token> {
        self.kind
    }

    pub fn is_end_of_file(&self) -> bool {
        self.kind.is_none()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn leading(&self) -> &[Trivia] {
        &self.leading
    }

    pub fn trailing(&self) -> &[Trivia] {
        &self.trailing
    }

    pub fn leading_len(&self) -> usize {
        self.leading.iter().map(Trivia::len).sum()
    }

    pub fn trailing_len(&self) -> usize {
        self.trailing.iter().map(Trivia::len).sum()
    }

    /// Length including trivia.
    pub fn full_len(&self) -> usize {
        self.leading_len() + self.text.len() + self.trailing_len()
    }

    pub fn with_leading(&self, leading: Vec<Trivia>) -> GreenToken {
        GreenToken {
            leading,
            ..self.clone()
        }
    }

    pub fn with_trailing(&self, trailing: Vec<Trivia>) -> GreenToken {
        GreenToken {
            trailing,
            ..self.clone()
        }
    }

    /// Whether the trailing trivia ends the line.
    pub fn ends_line(&self) -> bool {
        self.trailing
            .iter()
            .any(|t| t.kind == TriviaKind::Newline)
    }

    pub(crate) fn write_to(&self, out: &mut String) {
        for trivia in &self.leading {
            out.push_str(&trivia.text);
        }
        out.push_str(&self.text);
        for trivia in &self.trailing {
            out.push_str(&trivia.text);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GreenElement {
    Node(Arc<GreenNode>),
    Token(Arc<GreenToken>),
}

impl GreenElement {
    pub fn full_len(&self) -> usize {
        match self {
            GreenElement::Node(node) => node.full_len(),
            GreenElement::Token(token) => token.full_len(),
        }
    }

    pub fn as_node(&self) -> Option<&Arc<GreenNode>> {
        match self {
            GreenElement::Node(node) => Some(node),
            GreenElement::Token(_) => None,
        }
    }

    pub fn as_token(&self) -> Option<&Arc<GreenToken>> {
        match self {
            GreenElement::Node(_) => None,
            GreenElement::Token(token) => Some(token),
        }
    }

    fn last_token(&self) -> Option<&GreenToken> {
        match self {
            GreenElement::Node(node) => node.last_token(),
            GreenElement::Token(token) => Some(token),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GreenNode {
    kind: SyntaxKind,
    children: Vec<GreenElement>,
    full_len: usize,
}

impl GreenNode {
    pub fn new(kind: SyntaxKind, children: Vec<GreenElement>) -> Self {
        let full_len = children.iter().map(GreenElement::full_len).sum();
        Self {
            kind,
            children,
            full_len,
        }
    }

    pub fn kind(&self) -> SyntaxKind {
        self.kind
    }

    pub fn children(&self) -> &[GreenElement] {
        &self.children
    }

    pub fn full_len(&self) -> usize {
        self.full_len
    }

    pub fn first_token(&self) -> Option<&GreenToken> {
        self.children.iter().find_map(|child| match child {
            GreenElement::Node(node) => node.first_token(),
            GreenElement::Token(token) => Some(token.as_ref()),
        })
    }

    pub fn last_token(&self) -> Option<&GreenToken> {
        self.children.iter().rev().find_map(GreenElement::last_token)
    }

    pub fn leading_trivia(&self) -> &[Trivia] {
        self.first_token().map(GreenToken::leading).unwrap_or(&[])
    }

    pub fn trailing_trivia(&self) -> &[Trivia] {
        self.last_token().map(GreenToken::trailing).unwrap_or(&[])
    }

    /// Rebuild every token in document order. The callback receives the
    /// token's position among all tokens of this node.
    pub fn map_tokens<F>(&self, f: &mut F) -> GreenNode
    where
        F: FnMut(usize, &GreenToken) -> GreenToken,
    {
        let mut index = 0;
        self.map_tokens_from(&mut index, f)
    }

    fn map_tokens_from<F>(&self, index: &mut usize, f: &mut F) -> GreenNode
    where
        F: FnMut(usize, &GreenToken) -> GreenToken,
    {
        let children = self
            .children
            .iter()
            .map(|child| match child {
                GreenElement::Node(node) => {
                    GreenElement::Node(Arc::new(node.map_tokens_from(index, f)))
                }
                GreenElement::Token(token) => {
                    let mapped = f(*index, token);
                    *index += 1;
                    GreenElement::Token(Arc::new(mapped))
                }
            })
            .collect();
        GreenNode::new(self.kind, children)
    }

    pub fn with_leading_trivia(&self, leading: Vec<Trivia>) -> GreenNode {
        let mut leading = Some(leading);
        self.map_tokens(&mut |index, token| match (index, leading.take()) {
            (0, Some(trivia)) => token.with_leading(trivia),
            _ => token.clone(),
        })
    }

    pub fn with_trailing_trivia(&self, trailing: Vec<Trivia>) -> GreenNode {
        let last = self.token_count().saturating_sub(1);
        let mut trailing = Some(trailing);
        self.map_tokens(&mut |index, token| {
            if index == last {
                if let Some(trivia) = trailing.take() {
                    return token.with_trailing(trivia);
                }
            }
            token.clone()
        })
    }

    /// Every token in document order.
    pub fn tokens(&self) -> Vec<&GreenToken> {
        let mut tokens = Vec::new();
        self.collect_tokens(&mut tokens);
        tokens
    }

    fn collect_tokens<'a>(&'a self, out: &mut Vec<&'a GreenToken>) {
        for child in &self.children {
            match child {
                GreenElement::Node(node) => node.collect_tokens(out),
                GreenElement::Token(token) => out.push(token),
            }
        }
    }

    pub fn token_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| match child {
                GreenElement::Node(node) => node.token_count(),
                GreenElement::Token(_) => 1,
            })
            .sum()
    }

    /// Copy of this node with the child at `index` swapped out.
    pub fn with_child(&self, index: usize, child: GreenElement) -> GreenNode {
        let mut children = self.children.clone();
        children[index] = child;
        GreenNode::new(self.kind, children)
    }

    /// Copy of this node with `child` inserted before position `index`.
    pub fn with_inserted_child(&self, index: usize, child: GreenElement) -> GreenNode {
        let mut children = self.children.clone();
        children.insert(index.min(children.len()), child);
        GreenNode::new(self.kind, children)
    }

    pub(crate) fn write_to(&self, out: &mut String) {
        for child in &self.children {
            match child {
                GreenElement::Node(node) => node.write_to(out),
                GreenElement::Token(token) => token.write_to(out),
            }
        }
    }
}

impl fmt::Display for GreenNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::with_capacity(self.full_len);
        self.write_to(&mut out);
        f.write_str(&out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(text: &str, leading: Vec<Trivia>, trailing: Vec<Trivia>) -> GreenElement {
        GreenElement::Token(Arc::new(GreenToken::new(
            Some(Token::Ident),
            text,
            leading,
            trailing,
        )))
    }

    fn sample() -> GreenNode {
        GreenNode::new(
            SyntaxKind::Expression,
            vec![
                token("a", vec![Trivia::whitespace("  ")], vec![Trivia::whitespace(" ")]),
                token("b", vec![], vec![Trivia::newline()]),
            ],
        )
    }

    #[test]
    fn test_full_len_and_text() {
        let node = sample();
        assert_eq!(node.to_string(), "  a b\n");
        assert_eq!(node.full_len(), 6);
    }

    #[test]
    fn test_replace_outer_trivia() {
        let node = sample()
            .with_leading_trivia(vec![])
            .with_trailing_trivia(vec![Trivia::whitespace(" ")]);
        assert_eq!(node.to_string(), "a b ");
    }

    #[test]
    fn test_equality_is_structural() {
        assert_eq!(sample(), sample());
        assert_ne!(sample(), sample().with_leading_trivia(vec![]));
    }
}
