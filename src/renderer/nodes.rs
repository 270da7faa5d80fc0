//! Syntax nodes as template values
//!
//! Nodes leave the renderer as plain JSON objects
//! `{kind, start, end, text, name?}` where the span and text include trivia.
//! When one comes back as a helper argument it is turned into an anchor and
//! found again in a fresh parse of the source it was taken from.

use std::borrow::Cow;

use serde_json::{json, Map, Value};

use crate::error::Span;
use crate::structure::{NodeAnchor, NodeLike};
use crate::syntax::{SyntaxKind, SyntaxNode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateNode {
    pub anchor: NodeAnchor,
    pub name: Option<String>,
}

impl TemplateNode {
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("kind".into(), json!(self.anchor.kind.name()));
        object.insert("start".into(), json!(self.anchor.span.start));
        object.insert("end".into(), json!(self.anchor.span.end));
        object.insert("text".into(), json!(self.anchor.text));
        if let Some(name) = &self.name {
            object.insert("name".into(), json!(name));
        }
        Value::Object(object)
    }

    pub fn from_value(value: &Value) -> Result<Self, String> {
        let object = value
            .as_object()
            .ok_or_else(|| format!("expected a syntax node, got {}", describe(value)))?;
        let field = |key: &str| {
            object
                .get(key)
                .ok_or_else(|| format!("syntax node is missing '{key}'"))
        };

        let kind_name = field("kind")?
            .as_str()
            .ok_or("syntax node 'kind' must be a string")?;
        let kind = SyntaxKind::from_name(kind_name)
            .ok_or_else(|| format!("unknown syntax kind '{kind_name}'"))?;
        let start = offset(field("start")?, "start")?;
        let end = offset(field("end")?, "end")?;
        let text = field("text")?
            .as_str()
            .ok_or("syntax node 'text' must be a string")?;

        Ok(Self {
            anchor: NodeAnchor {
                kind,
                span: start..end,
                text: text.to_string(),
            },
            name: object.get("name").and_then(Value::as_str).map(String::from),
        })
    }

    /// A single node or an array of nodes.
    pub fn list_from_value(value: &Value) -> Result<Vec<Self>, String> {
        match value {
            Value::Array(items) => items.iter().map(Self::from_value).collect(),
            other => Ok(vec![Self::from_value(other)?]),
        }
    }

    pub fn list_to_value(nodes: &[Self]) -> Value {
        Value::Array(nodes.iter().map(Self::to_value).collect())
    }
}

impl From<&SyntaxNode> for TemplateNode {
    fn from(node: &SyntaxNode) -> Self {
        Self {
            anchor: NodeAnchor::of(node),
            name: node.declared_names().into_iter().next(),
        }
    }
}

impl NodeLike for TemplateNode {
    fn kind(&self) -> SyntaxKind {
        self.anchor.kind
    }

    fn full_span(&self) -> Span {
        self.anchor.span.clone()
    }

    fn full_text(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.anchor.text)
    }
}

fn offset(value: &Value, key: &str) -> Result<usize, String> {
    value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| format!("syntax node '{key}' must be a non-negative integer"))
}

/// Short description of a value for error messages.
pub fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Source text passed to a structure helper: either the text itself or a
/// node, in which case its full text is parsed on its own.
pub fn source_text(value: &Value) -> Result<Cow<'_, str>, String> {
    match value {
        Value::String(text) => Ok(Cow::Borrowed(text.as_str())),
        Value::Object(_) => Ok(Cow::Owned(TemplateNode::from_value(value)?.anchor.text)),
        other => Err(format!("expected source text or a node, got {}", describe(other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::parse;

    #[test]
    fn test_node_value_shape() {
        let tree = parse("class Foo { }\n").unwrap();
        let class = tree.root().children()[0].clone();
        let value = TemplateNode::from(&class).to_value();
        assert_eq!(
            value,
            json!({
                "kind": "ClassDeclaration",
                "start": 0,
                "end": 14,
                "text": "class Foo { }\n",
                "name": "Foo",
            })
        );
        let back = TemplateNode::from_value(&value).unwrap();
        assert_eq!(back.anchor, NodeAnchor::of(&class));
    }

    #[test]
    fn test_bad_values() {
        assert!(TemplateNode::from_value(&json!("text")).is_err());
        assert!(TemplateNode::from_value(&json!({"kind": "Nope", "start": 0, "end": 1, "text": ""}))
            .unwrap_err()
            .contains("unknown syntax kind"));
        assert!(TemplateNode::from_value(&json!({"kind": "Block", "start": -1, "end": 1, "text": ""}))
            .is_err());
        assert!(source_text(&json!(3)).is_err());
        assert_eq!(source_text(&json!("class A {}")).unwrap(), "class A {}");
    }
}
