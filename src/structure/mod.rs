//! Structural patch engine
//!
//! Locates named declarations and arbitrary nodes in a parsed tree, and
//! replaces or inserts code while keeping the surrounding formatting intact.
//! Every edit returns a new tree; nodes from an older tree are mapped onto
//! the newer one by span and structural equivalence.

pub mod query;
pub mod resolve;
pub mod splice;

use thiserror::Error;

use crate::error::{ParseError, Span};
use crate::syntax::SyntaxKind;

pub use query::{
    deepest, filter_regex, filter_text, find_all, find_by_kind_and_name,
    find_unique_by_kind_and_name, shallowest, DeclKind, NodeFilter, NodeLike, NodePredicate,
};
pub use resolve::{resolve_anchor, resolve_node, NodeAnchor};
pub use splice::{insert, replace, Replacement};

#[derive(Error, Debug)]
pub enum StructureError {
    #[error("Could not find {kind} named '{name}'")]
    NotFound { kind: String, name: String },

    #[error("{count} nodes match {kind} '{name}' (at {spans:?}); expected exactly one")]
    AmbiguousMatch {
        kind: String,
        name: String,
        count: usize,
        spans: Vec<Span>,
    },

    #[error("Nodes do not all overlap the largest node at {largest:?}: {spans:?}")]
    DisjointNodeSet { largest: Span, spans: Vec<Span> },

    #[error(
        "{kind} at {span:?} is not part of this tree; pass the same source the node was found in"
    )]
    StaleNodeReference { kind: SyntaxKind, span: Span },

    #[error("Could not parse replacement: {0}")]
    Parse(#[from] ParseError),

    #[error("Cannot insert into {kind} at {span:?}")]
    InvalidTarget { kind: SyntaxKind, span: Span },

    #[error("Unknown node filter '{0}'")]
    InvalidFilter(String),

    #[error("Invalid regex '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
