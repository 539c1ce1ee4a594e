//! Canonical text generation from a model.
//!
//! The emitter produces deterministic output: 4-space indentation, `id`
//! first, then variant properties, bindings, declarations, handlers,
//! object-valued properties and finally default children. Two models with
//! equal content emit byte-identical text, which the rewriter relies on
//! when it regenerates a subtree in place.

use crate::model::{Model, NodeData};
use crate::parser::ImportAst;
use crate::property::{Property, PropertyValue};
use petgraph::stable_graph::NodeIndex;
use std::fmt::Write;

const INDENT: &str = "    ";

/// Emit a whole document: import lines, a blank separator, the root object.
#[must_use]
pub fn emit_document(model: &Model, imports: &[ImportAst]) -> String {
    let mut out = String::new();
    for import in imports {
        out.push_str(&emit_import(import));
        out.push('\n');
    }
    if !imports.is_empty() {
        out.push('\n');
    }
    out.push_str(&emit_node(model, model.root(), 0));
    out.push('\n');
    out
}

#[must_use]
pub fn emit_import(import: &ImportAst) -> String {
    let mut line = String::from("import ");
    if import.module.contains('/') || import.module.contains(' ') {
        let _ = write!(line, "\"{}\"", import.module);
    } else {
        line.push_str(&import.module);
    }
    if let Some((maj, min)) = import.version {
        let _ = write!(line, " {maj}.{min}");
    }
    if let Some(alias) = &import.alias {
        let _ = write!(line, " as {alias}");
    }
    line
}

/// Emit one node and its subtree at the given indent depth. The result has
/// no trailing newline; the first line is not indented (callers splice it
/// after existing leading whitespace).
#[must_use]
pub fn emit_node(model: &Model, node: NodeIndex, depth: usize) -> String {
    let Some(data) = model.node(node) else {
        return String::new();
    };
    let pad = INDENT.repeat(depth + 1);
    let close_pad = INDENT.repeat(depth);
    let mut out = format!("{} {{\n", data.type_name.as_str());

    if let Some(source) = data.node_source() {
        for line in source.lines() {
            if line.trim().is_empty() {
                out.push('\n');
            } else {
                let _ = writeln!(out, "{pad}{}", line.trim_end());
            }
        }
        let _ = write!(out, "{close_pad}}}");
        return out;
    }

    if let Some(id) = data.id() {
        let _ = writeln!(out, "{pad}id: {id}");
    }

    for bucket in property_buckets(data) {
        for property in bucket {
            emit_property(model, property, &mut out, depth);
        }
    }

    for (child, is_default) in ordered_children(data) {
        if !is_default {
            continue;
        }
        let _ = writeln!(out, "{pad}{}", emit_node(model, child, depth + 1));
    }

    let _ = write!(out, "{close_pad}}}");
    out
}

fn emit_property(model: &Model, property: &Property, out: &mut String, depth: usize) {
    let pad = INDENT.repeat(depth + 1);
    let name = &property.name;
    match &property.value {
        PropertyValue::Variant {
            value,
            dynamic_type: Some(ty),
        } => {
            let _ = writeln!(out, "{pad}property {ty} {name}: {}", value.to_source());
        }
        PropertyValue::Variant { value, .. } => {
            let _ = writeln!(out, "{pad}{name}: {}", value.to_source());
        }
        PropertyValue::Binding(expr) => {
            let _ = writeln!(out, "{pad}{name}: {expr}");
        }
        PropertyValue::SignalDeclaration(signature) => {
            if signature.is_empty() {
                let _ = writeln!(out, "{pad}signal {name}");
            } else {
                let _ = writeln!(out, "{pad}signal {name}({signature})");
            }
        }
        PropertyValue::SignalHandler(source) => {
            let mut lines = source.lines();
            match (lines.next(), lines.next()) {
                (Some(first), None) => {
                    let _ = writeln!(out, "{pad}{name}: {}", first.trim());
                }
                _ => {
                    let _ = writeln!(out, "{pad}{name}: {}", reindent(source, depth + 1));
                }
            }
        }
        PropertyValue::Node(child) => {
            if property.is_default {
                return; // emitted with the default children
            }
            let _ = writeln!(out, "{pad}{name}: {}", emit_node(model, *child, depth + 1));
        }
        PropertyValue::NodeList(children) => {
            if property.is_default {
                return;
            }
            let _ = writeln!(out, "{pad}{name}: [");
            for (i, child) in children.iter().enumerate() {
                let comma = if i + 1 < children.len() { "," } else { "" };
                let _ = writeln!(
                    out,
                    "{pad}{INDENT}{}{comma}",
                    emit_node(model, *child, depth + 2)
                );
            }
            let _ = writeln!(out, "{pad}]");
        }
    }
}

/// Stable emission order: variants, bindings, declared properties, signal
/// declarations, handlers, then node-valued properties. Relative order
/// within each bucket follows the model's property order.
fn property_buckets(data: &NodeData) -> [Vec<&Property>; 6] {
    let mut buckets: [Vec<&Property>; 6] = Default::default();
    for property in data.properties() {
        let slot = match &property.value {
            PropertyValue::Variant {
                dynamic_type: Some(_),
                ..
            } => 2,
            PropertyValue::Variant { .. } => 0,
            PropertyValue::Binding(_) => 1,
            PropertyValue::SignalDeclaration(_) => 3,
            PropertyValue::SignalHandler(_) => 4,
            PropertyValue::Node(_) | PropertyValue::NodeList(_) => 5,
        };
        buckets[slot].push(property);
    }
    buckets
}

/// Children of the default property, paired with the default flag of their
/// owning property.
fn ordered_children(data: &NodeData) -> Vec<(NodeIndex, bool)> {
    let mut out = Vec::new();
    for property in data.properties() {
        match &property.value {
            PropertyValue::Node(child) => out.push((*child, property.is_default)),
            PropertyValue::NodeList(children) => {
                out.extend(children.iter().map(|c| (*c, property.is_default)));
            }
            _ => {}
        }
    }
    out
}

/// Re-anchor a multi-line script body at the given depth. The first line is
/// left as-is (it follows `name: ` on the same line), continuation lines are
/// stripped of their old indent and re-padded.
fn reindent(source: &str, depth: usize) -> String {
    let pad = INDENT.repeat(depth);
    let mut lines = source.lines();
    let mut out = String::new();
    if let Some(first) = lines.next() {
        out.push_str(first.trim());
    }
    let rest: Vec<&str> = lines.collect();
    let common = rest
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    for line in rest {
        out.push('\n');
        if line.trim().is_empty() {
            continue;
        }
        let stripped = if line.len() >= common { &line[common..] } else { line.trim_start() };
        out.push_str(&pad);
        out.push_str(stripped);
    }
    out
}
