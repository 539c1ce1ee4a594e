//! Model construction from a parsed document.
//!
//! Building is lenient: structural problems were already rejected by the
//! parser, and the remaining issues (duplicate or invalid ids) degrade to
//! diagnostics so callers can decide whether to fail or continue. The
//! returned span table maps every created node to its source range, which
//! the rewriter uses to compute minimal text edits.

use crate::diagnostics::{Diagnostic, line_column};
use crate::model::{ContainerKind, Model};
use crate::parser::{DocumentAst, MemberAst, ObjectAst, Span, ValueAst};
use crate::property::VariantValue;
use petgraph::stable_graph::NodeIndex;
use std::collections::HashMap;

/// Name of the implicit default property that un-named children land in.
pub const DEFAULT_PROPERTY: &str = "data";

#[derive(Debug)]
pub struct BuiltDocument {
    pub model: Model,
    /// Source span of each node, in document order.
    pub spans: HashMap<NodeIndex, Span>,
    /// Non-fatal problems found while building (duplicate ids and the like).
    pub diagnostics: Vec<Diagnostic>,
}

/// Instantiate a model from a document AST.
pub fn build_document(doc: &DocumentAst, source: &str) -> BuiltDocument {
    let version = doc
        .imports
        .iter()
        .find_map(|i| i.version)
        .unwrap_or((1, 0));
    let mut model = Model::new(&doc.root.type_name, version);
    let mut ctx = BuildContext {
        source,
        version,
        spans: HashMap::new(),
        diagnostics: Vec::new(),
    };
    let root = model.root();
    ctx.spans.insert(root, doc.root.span);
    ctx.apply_members(&mut model, root, &doc.root);
    model.take_events();
    BuiltDocument {
        model,
        spans: ctx.spans,
        diagnostics: ctx.diagnostics,
    }
}

/// Instantiate a single object subtree into an existing model. The node is
/// created detached; the caller reparents it. Id collisions degrade to
/// diagnostics, as in [`build_document`].
pub fn instantiate_object(
    model: &mut Model,
    object: &ObjectAst,
    version: (i32, i32),
    source: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> (NodeIndex, HashMap<NodeIndex, Span>) {
    let mut ctx = BuildContext {
        source,
        version,
        spans: HashMap::new(),
        diagnostics: Vec::new(),
    };
    let node = ctx.instantiate(model, object);
    diagnostics.append(&mut ctx.diagnostics);
    (node, ctx.spans)
}

struct BuildContext<'a> {
    source: &'a str,
    version: (i32, i32),
    spans: HashMap<NodeIndex, Span>,
    diagnostics: Vec<Diagnostic>,
}

impl BuildContext<'_> {
    fn apply_members(&mut self, model: &mut Model, node: NodeIndex, object: &ObjectAst) {
        for member in &object.members {
            match member {
                MemberAst::Id { value, span } => {
                    if let Err(err) = model.set_id(node, value) {
                        self.warn(span.start, format!("ignoring id `{value}`: {err}"));
                    }
                }
                MemberAst::Property { name, value, span } => {
                    self.apply_value(model, node, name, value, span);
                }
                MemberAst::PropertyDeclaration {
                    name,
                    type_name,
                    value,
                    span,
                } => match value {
                    Some(ValueAst::Variant(v)) => {
                        self.check(
                            model.set_dynamic_variant(node, name, type_name, v.clone()),
                            span,
                        );
                    }
                    Some(ValueAst::Script(expr)) => {
                        // The declared type is not kept for bound dynamic
                        // properties. TODO: carry it once bindings learn a
                        // dynamic type, as declared variants already do.
                        self.check(model.set_binding(node, name, expr), span);
                    }
                    None => {
                        self.check(
                            model.set_dynamic_variant(
                                node,
                                name,
                                type_name,
                                default_for_type(type_name),
                            ),
                            span,
                        );
                    }
                },
                MemberAst::SignalDeclaration {
                    name,
                    signature,
                    span,
                } => {
                    self.check(model.declare_signal(node, name, signature), span);
                }
                MemberAst::SignalHandler { name, source, span } => {
                    self.check(model.set_signal_handler(node, name, source), span);
                }
                MemberAst::Group { properties, .. } => {
                    for (name, value, span) in properties {
                        self.apply_value(model, node, name, value, span);
                    }
                }
                MemberAst::ObjectProperty { name, object, span } => {
                    let child = self.instantiate(model, object);
                    self.check(
                        model.reparent(child, node, name, ContainerKind::Singular, None),
                        span,
                    );
                }
                MemberAst::ArrayProperty {
                    name,
                    objects,
                    span,
                } => {
                    for object in objects {
                        let child = self.instantiate(model, object);
                        self.check(
                            model.reparent(child, node, name, ContainerKind::List, None),
                            span,
                        );
                    }
                }
                MemberAst::Child(object) => {
                    let child = self.instantiate(model, object);
                    self.check(
                        model.reparent(child, node, DEFAULT_PROPERTY, ContainerKind::List, None),
                        &object.span,
                    );
                    model.mark_default_property(node, DEFAULT_PROPERTY);
                }
            }
        }
    }

    fn apply_value(
        &mut self,
        model: &mut Model,
        node: NodeIndex,
        name: &str,
        value: &ValueAst,
        span: &Span,
    ) {
        let result = match value {
            ValueAst::Variant(v) => model.set_variant(node, name, v.clone()),
            ValueAst::Script(expr) => model.set_binding(node, name, expr),
        };
        self.check(result, span);
    }

    fn instantiate(&mut self, model: &mut Model, object: &ObjectAst) -> NodeIndex {
        let node = model.create_node(
            &object.type_name,
            self.version,
            Vec::new(),
            object.node_source.clone(),
        );
        self.spans.insert(node, object.span);
        self.apply_members(model, node, object);
        node
    }

    fn check<E: std::fmt::Display>(&mut self, result: Result<(), E>, span: &Span) {
        if let Err(err) = result {
            self.warn(span.start, err.to_string());
        }
    }

    fn warn(&mut self, offset: usize, message: String) {
        let (line, column) = line_column(self.source, offset);
        log::warn!("document build: {line}:{column}: {message}");
        self.diagnostics.push(Diagnostic::warning(line, column, message));
    }
}

/// Default value for a declared property without an initializer.
pub fn default_for_type(type_name: &str) -> VariantValue {
    match type_name {
        "bool" => VariantValue::Bool(false),
        "int" => VariantValue::Int(0),
        "real" | "double" => VariantValue::Double(0.0),
        _ => VariantValue::Str(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;
    use crate::property::PropertyLookup;
    use pretty_assertions::assert_eq;

    fn build(source: &str) -> BuiltDocument {
        build_document(&parse_document(source).unwrap(), source)
    }

    #[test]
    fn builds_nested_structure() {
        let built = build(
            "Item {\n  id: top\n  Rectangle {\n    id: a\n    x: 1\n  }\n  Rectangle { id: b }\n}",
        );
        assert!(built.diagnostics.is_empty());
        let model = &built.model;
        let root = model.root();
        assert_eq!(model.id_of(root), Some("top"));
        let children = model.direct_sub_nodes(root);
        assert_eq!(children.len(), 2);
        assert_eq!(model.id_of(children[0]), Some("a"));
        assert_eq!(model.id_of(children[1]), Some("b"));
        assert_eq!(
            model.property(children[0], "x"),
            PropertyLookup::Variant {
                value: &VariantValue::Int(1),
                dynamic_type: None
            }
        );
    }

    #[test]
    fn duplicate_id_degrades_to_diagnostic() {
        let built = build("Item {\n  id: x\n  Rectangle { id: x }\n}");
        assert_eq!(built.diagnostics.len(), 1);
        let child = built.model.direct_sub_nodes(built.model.root())[0];
        assert_eq!(built.model.id_of(child), None);
    }

    #[test]
    fn spans_recorded_per_node() {
        let source = "Item {\n    Rectangle { x: 1 }\n}";
        let built = build(source);
        let child = built.model.direct_sub_nodes(built.model.root())[0];
        let span = built.spans[&child];
        assert_eq!(&source[span.start..span.end], "Rectangle { x: 1 }");
    }

    #[test]
    fn version_comes_from_imports() {
        let built = build("import Shapes 2.3\nItem { }");
        assert_eq!(built.model.node(built.model.root()).unwrap().version, (2, 3));
    }

    #[test]
    fn array_members_build_in_order() {
        let built = build(
            "Item { states: [ State { name: \"on\" }, State { name: \"off\" } ] }",
        );
        let model = &built.model;
        let states = match model.property(model.root(), "states") {
            PropertyLookup::NodeList(list) => list.to_vec(),
            other => panic!("expected a node list, got {other:?}"),
        };
        assert_eq!(states.len(), 2);
        assert_eq!(
            model.property(states[0], "name"),
            PropertyLookup::Variant {
                value: &VariantValue::Str("on".into()),
                dynamic_type: None
            }
        );
    }
}
