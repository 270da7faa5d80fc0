//! Lossless structural syntax layer for C#-style sources
//!
//! A logos lexer keeps every byte (trivia included), a chumsky grammar picks
//! out declarations, statements and expressions, and the result is an
//! immutable green tree with positioned red cursors on top.

pub mod green;
pub mod grammar;
pub mod kind;
pub mod lexer;
pub mod tree;

pub use grammar::{parse, parse_expression, parse_fragment, parse_member, parse_statement};
pub use green::{GreenElement, GreenNode, GreenToken, Trivia, TriviaKind};
pub use kind::{FragmentKind, SyntaxKind};
pub use lexer::Token;
pub use tree::{SyntaxNode, SyntaxTree};
