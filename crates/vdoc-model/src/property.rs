//! The property store: typed values attached to nodes.
//!
//! A property is polymorphic over {name, exists, owner, isDefault,
//! dynamicType}; exactly one payload variant is populated at a time.
//! Lookup by name returns a tagged [`PropertyLookup`], never a panic and
//! never runtime type inspection.

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A literal value carried by a variant property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VariantValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    /// Scope-qualified enumeration literal, e.g. `Text.AlignHCenter`.
    Enumeration(String),
}

impl VariantValue {
    /// Render as VDL source text.
    pub fn to_source(&self) -> String {
        match self {
            VariantValue::Bool(b) => b.to_string(),
            VariantValue::Int(i) => i.to_string(),
            VariantValue::Double(d) => format_double(*d),
            VariantValue::Str(s) => format!("\"{}\"", escape_str(s)),
            VariantValue::Enumeration(e) => e.clone(),
        }
    }

    /// Whether two values compare equal as document text.
    pub fn source_eq(&self, other: &VariantValue) -> bool {
        self.to_source() == other.to_source()
    }
}

impl fmt::Display for VariantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_source())
    }
}

/// Format a double without a trailing `.0` when it is integral.
pub fn format_double(d: f64) -> String {
    if d.fract() == 0.0 && d.abs() < 1e15 {
        format!("{}", d as i64)
    } else {
        format!("{d}")
    }
}

fn escape_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

/// The payload of a stored property. Exactly one variant at a time; writing a
/// different variant kind replaces payload and tag.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Literal value, with an optional declared dynamic type
    /// (`property int clicks: 0` stores `dynamic_type: Some("int")`).
    Variant {
        value: VariantValue,
        dynamic_type: Option<String>,
    },
    /// A binding expression, kept as source text.
    Binding(String),
    /// A singular owned child node.
    Node(NodeIndex),
    /// Ordered owned child nodes.
    NodeList(Vec<NodeIndex>),
    /// Signal handler body source (`onClicked: { … }`).
    SignalHandler(String),
    /// Signal declaration signature (`signal pressed(int x)`).
    SignalDeclaration(String),
}

impl PropertyValue {
    pub fn variant(value: VariantValue) -> Self {
        PropertyValue::Variant {
            value,
            dynamic_type: None,
        }
    }

    /// True for payloads that own child nodes.
    pub fn holds_nodes(&self) -> bool {
        matches!(self, PropertyValue::Node(_) | PropertyValue::NodeList(_))
    }

    /// The owned child nodes, in order. Empty for non-node payloads.
    pub fn owned_nodes(&self) -> Vec<NodeIndex> {
        match self {
            PropertyValue::Node(n) => vec![*n],
            PropertyValue::NodeList(list) => list.clone(),
            _ => Vec::new(),
        }
    }
}

/// A named property stored on a node. Names are unique within the owning
/// node's direct property set; dot-path names (`border.width`) address
/// grouped sub-properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub value: PropertyValue,
    /// Whether this is the type's default property (un-named children land here).
    pub is_default: bool,
}

impl Property {
    pub fn new(name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            name: name.into(),
            value,
            is_default: false,
        }
    }

    pub fn dynamic_type(&self) -> Option<&str> {
        match &self.value {
            PropertyValue::Variant { dynamic_type, .. } => dynamic_type.as_deref(),
            _ => None,
        }
    }
}

/// Tagged result of a property lookup. `NotFound` is a value, not an error:
/// `exists()` is a predicate on this.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyLookup<'a> {
    Variant {
        value: &'a VariantValue,
        dynamic_type: Option<&'a str>,
    },
    Binding(&'a str),
    NodeRef(NodeIndex),
    NodeList(&'a [NodeIndex]),
    SignalHandler(&'a str),
    SignalDeclaration(&'a str),
    NotFound,
}

impl<'a> PropertyLookup<'a> {
    /// Whether the lookup found anything.
    pub fn exists(&self) -> bool {
        !matches!(self, PropertyLookup::NotFound)
    }

    pub fn as_variant(&self) -> Option<&'a VariantValue> {
        match self {
            PropertyLookup::Variant { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn as_binding(&self) -> Option<&'a str> {
        match self {
            PropertyLookup::Binding(expr) => Some(expr),
            _ => None,
        }
    }

    /// The nodes a container property holds, empty for anything else.
    pub fn as_nodes(&self) -> Vec<NodeIndex> {
        match self {
            PropertyLookup::NodeRef(n) => vec![*n],
            PropertyLookup::NodeList(list) => list.to_vec(),
            _ => Vec::new(),
        }
    }
}

impl<'a> From<&'a PropertyValue> for PropertyLookup<'a> {
    fn from(value: &'a PropertyValue) -> Self {
        match value {
            PropertyValue::Variant {
                value,
                dynamic_type,
            } => PropertyLookup::Variant {
                value,
                dynamic_type: dynamic_type.as_deref(),
            },
            PropertyValue::Binding(expr) => PropertyLookup::Binding(expr),
            PropertyValue::Node(n) => PropertyLookup::NodeRef(*n),
            PropertyValue::NodeList(list) => PropertyLookup::NodeList(list),
            PropertyValue::SignalHandler(src) => PropertyLookup::SignalHandler(src),
            PropertyValue::SignalDeclaration(sig) => PropertyLookup::SignalDeclaration(sig),
        }
    }
}

/// Whether a binding expression is a bare literal: no alphabetic character at
/// all (e.g. `0`, `-12.5`, `0 + 4`). Such bindings can be safely overwritten
/// by a literal value during merge.
pub fn binding_is_literal(expr: &str) -> bool {
    !expr.chars().any(|c| c.is_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_source_text() {
        assert_eq!(VariantValue::Bool(true).to_source(), "true");
        assert_eq!(VariantValue::Int(-4).to_source(), "-4");
        assert_eq!(VariantValue::Double(2.5).to_source(), "2.5");
        assert_eq!(VariantValue::Double(3.0).to_source(), "3");
        assert_eq!(
            VariantValue::Str("a \"b\"".into()).to_source(),
            "\"a \\\"b\\\"\""
        );
        assert_eq!(
            VariantValue::Enumeration("Text.AlignHCenter".into()).to_source(),
            "Text.AlignHCenter"
        );
    }

    #[test]
    fn lookup_tags() {
        let p = PropertyValue::Binding("parent.width".into());
        let l = PropertyLookup::from(&p);
        assert!(l.exists());
        assert_eq!(l.as_binding(), Some("parent.width"));
        assert!(l.as_variant().is_none());
        assert!(!PropertyLookup::NotFound.exists());
    }

    #[test]
    fn literal_binding_heuristic() {
        assert!(binding_is_literal("0"));
        assert!(binding_is_literal("-12.5"));
        assert!(binding_is_literal("10 + 4"));
        assert!(!binding_is_literal("parent.width"));
        assert!(!binding_is_literal("true"));
        assert!(!binding_is_literal("width / 2"));
    }
}
