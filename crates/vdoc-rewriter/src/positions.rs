//! Node → source-span side table.
//!
//! The map holds plain node indices, never node data: entries go stale the
//! moment the text changes and are rebuilt from the next good parse. A
//! missing entry is an answerable state (the node was created in the model
//! and not yet written out), not an error.

use std::collections::HashMap;
use vdoc_model::{NodeIndex, Span};

#[derive(Debug, Clone, Default)]
pub struct PositionMap {
    spans: HashMap<NodeIndex, Span>,
}

impl PositionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_spans(spans: HashMap<NodeIndex, Span>) -> Self {
        Self { spans }
    }

    pub fn get(&self, node: NodeIndex) -> Option<Span> {
        self.spans.get(&node).copied()
    }

    pub fn insert(&mut self, node: NodeIndex, span: Span) {
        self.spans.insert(node, span);
    }

    pub fn remove(&mut self, node: NodeIndex) {
        self.spans.remove(&node);
    }

    pub fn clear(&mut self) {
        self.spans.clear();
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// The node with the smallest span containing `offset`, if any.
    pub fn node_at(&self, offset: usize) -> Option<NodeIndex> {
        self.spans
            .iter()
            .filter(|(_, span)| span.start <= offset && offset < span.end)
            .min_by_key(|(_, span)| span.len())
            .map(|(&node, _)| node)
    }
}
