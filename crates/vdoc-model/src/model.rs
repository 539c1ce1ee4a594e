//! The node graph: a tree of typed nodes with parent/child and
//! named-property edges.
//!
//! Nodes live in a `StableDiGraph`; every parent→child edge carries the name
//! of the owning property, so the parent edge and the parent's property
//! collection can always be checked against each other. An id index maps
//! non-empty ids to node indices and is kept synchronized on every mutation.
//!
//! Every structural mutation pushes a [`ChangeEvent`] into the model's event
//! journal unless a [`NotificationBlocker`] scope is active; the synchronizer
//! and other observers drain the journal with [`Model::take_events`].

use crate::error::ModelError;
use crate::id::{TypeName, validate_id};
use crate::property::{Property, PropertyLookup, PropertyValue, VariantValue};
use petgraph::Direction;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

pub use petgraph::graph::NodeIndex;

// ─── Node data ───────────────────────────────────────────────────────────

/// Payload stored per node.
#[derive(Debug, Clone)]
pub struct NodeData {
    pub type_name: TypeName,
    pub version: (i32, i32),
    id: Option<String>,
    /// Most nodes carry only a handful of properties; spill past 8.
    properties: SmallVec<[Property; 8]>,
    /// Editor-only key/value state, never persisted to text.
    aux: HashMap<String, serde_json::Value>,
    /// Raw text blob for nodes with custom/component parsing.
    node_source: Option<String>,
}

impl NodeData {
    fn new(type_name: TypeName, version: (i32, i32), node_source: Option<String>) -> Self {
        Self {
            type_name,
            version,
            id: None,
            properties: SmallVec::new(),
            aux: HashMap::new(),
            node_source,
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn node_source(&self) -> Option<&str> {
        self.node_source.as_deref()
    }

    pub fn auxiliary_data(&self) -> &HashMap<String, serde_json::Value> {
        &self.aux
    }

    fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    fn property_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties.iter_mut().find(|p| p.name == name)
    }
}

/// Edge weight on parent→child edges: the name of the owning property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentEdge {
    pub property: String,
}

/// Whether a node-holding property stores one node or an ordered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Singular,
    List,
}

// ─── Change notifications ────────────────────────────────────────────────

/// Structured notification emitted on every model mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    NodeCreated(NodeIndex),
    NodeRemoved {
        node: NodeIndex,
        parent: Option<NodeIndex>,
        property: Option<String>,
    },
    NodeReparented {
        node: NodeIndex,
        old_parent: Option<NodeIndex>,
        new_parent: NodeIndex,
        property: String,
    },
    PropertyChanged {
        node: NodeIndex,
        name: String,
    },
    PropertyRemoved {
        node: NodeIndex,
        name: String,
    },
    IdChanged {
        node: NodeIndex,
        old: Option<String>,
        new: Option<String>,
    },
    AuxiliaryChanged {
        node: NodeIndex,
        key: String,
    },
    NodeSourceChanged {
        node: NodeIndex,
    },
}

// ─── Model ───────────────────────────────────────────────────────────────

/// The node graph. Owns its nodes and their property payloads exclusively.
#[derive(Debug, Clone)]
pub struct Model {
    graph: StableDiGraph<NodeData, ParentEdge>,
    root: NodeIndex,
    id_index: HashMap<String, NodeIndex>,
    events: Vec<ChangeEvent>,
    blocked: u32,
}

impl Model {
    /// Create a model whose root has the given type.
    pub fn new(root_type: &str, version: (i32, i32)) -> Self {
        let mut graph = StableDiGraph::new();
        let root = graph.add_node(NodeData::new(TypeName::intern(root_type), version, None));
        Self {
            graph,
            root,
            id_index: HashMap::new(),
            events: Vec::new(),
            blocked: 0,
        }
    }

    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn contains(&self, node: NodeIndex) -> bool {
        self.graph.contains_node(node)
    }

    pub fn node(&self, node: NodeIndex) -> Option<&NodeData> {
        self.graph.node_weight(node)
    }

    fn node_ok(&self, node: NodeIndex) -> Result<&NodeData, ModelError> {
        self.graph.node_weight(node).ok_or(ModelError::UnknownNode)
    }

    fn node_mut_ok(&mut self, node: NodeIndex) -> Result<&mut NodeData, ModelError> {
        self.graph
            .node_weight_mut(node)
            .ok_or(ModelError::UnknownNode)
    }

    /// All node indices, root included, in storage order.
    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    fn emit(&mut self, event: ChangeEvent) {
        if self.blocked == 0 {
            self.events.push(event);
        }
    }

    /// Drain the event journal.
    pub fn take_events(&mut self) -> Vec<ChangeEvent> {
        std::mem::take(&mut self.events)
    }

    /// Suppress notifications until the returned guard drops. Used for bulk
    /// edits where only a single final notification is wanted.
    pub fn block_notifications(&mut self) -> NotificationBlocker<'_> {
        self.blocked += 1;
        NotificationBlocker { model: self }
    }

    // ─── Node lifecycle ──────────────────────────────────────────────────

    /// Create a detached node. Attach it with [`Model::reparent`].
    ///
    /// `initial_properties` may not hold node payloads; children are attached
    /// through reparenting so parent edges stay consistent.
    pub fn create_node(
        &mut self,
        type_name: &str,
        version: (i32, i32),
        initial_properties: Vec<Property>,
        node_source: Option<String>,
    ) -> NodeIndex {
        debug_assert!(
            initial_properties.iter().all(|p| !p.value.holds_nodes()),
            "node payloads must be attached via reparent"
        );
        let mut data = NodeData::new(TypeName::intern(type_name), version, node_source);
        data.properties = SmallVec::from_vec(initial_properties);
        let idx = self.graph.add_node(data);
        self.emit(ChangeEvent::NodeCreated(idx));
        idx
    }

    /// Destroy a node and all of its Node/NodeList-owned descendants.
    /// Nodes reachable only through Binding properties survive.
    pub fn destroy(&mut self, node: NodeIndex) -> Result<(), ModelError> {
        if node == self.root {
            return Err(ModelError::RootNode);
        }
        self.node_ok(node)?;

        let parent = self.parent_of(node);
        if let Some((pidx, pname)) = &parent {
            self.remove_child_entry(*pidx, pname.clone(), node);
        }
        self.destroy_subtree(node);
        self.emit(ChangeEvent::NodeRemoved {
            node,
            parent: parent.as_ref().map(|(p, _)| *p),
            property: parent.map(|(_, n)| n),
        });
        Ok(())
    }

    fn destroy_subtree(&mut self, node: NodeIndex) {
        for child in self.direct_sub_nodes(node) {
            self.destroy_subtree(child);
            self.emit(ChangeEvent::NodeRemoved {
                node: child,
                parent: Some(node),
                property: None,
            });
        }
        if let Some(data) = self.graph.node_weight(node)
            && let Some(id) = data.id.clone()
        {
            self.id_index.remove(&id);
        }
        self.graph.remove_node(node);
    }

    // ─── Ids ─────────────────────────────────────────────────────────────

    pub fn id_of(&self, node: NodeIndex) -> Option<&str> {
        self.node(node).and_then(|d| d.id())
    }

    pub fn node_for_id(&self, id: &str) -> Option<NodeIndex> {
        self.id_index.get(id).copied()
    }

    /// Whether `id` would be accepted by [`Model::set_id`] for `node`.
    pub fn valid_id(&self, node: NodeIndex, id: &str) -> bool {
        if validate_id(id).is_err() {
            return false;
        }
        id.is_empty() || self.id_index.get(id).is_none_or(|&taken| taken == node)
    }

    /// Assign or clear (`""`) a node's id. Uniqueness and syntax are enforced
    /// at write time.
    pub fn set_id(&mut self, node: NodeIndex, id: &str) -> Result<(), ModelError> {
        self.node_ok(node)?;
        validate_id(id)?;
        if !id.is_empty()
            && let Some(&taken) = self.id_index.get(id)
            && taken != node
        {
            return Err(ModelError::DuplicateId(id.to_string()));
        }

        let old = self.graph[node].id.clone();
        if old.as_deref() == Some(id) || (old.is_none() && id.is_empty()) {
            return Ok(());
        }
        if let Some(old_id) = &old {
            self.id_index.remove(old_id);
        }
        let new = if id.is_empty() {
            None
        } else {
            self.id_index.insert(id.to_string(), node);
            Some(id.to_string())
        };
        self.graph[node].id = new.clone();
        self.emit(ChangeEvent::IdChanged { node, old, new });
        Ok(())
    }

    // ─── Property store ──────────────────────────────────────────────────

    /// Direct (non-dot-resolved) lookup of a property on `node`.
    pub fn property<'a>(&'a self, node: NodeIndex, name: &str) -> PropertyLookup<'a> {
        match self.node(node).and_then(|d| d.property(name)) {
            Some(p) => PropertyLookup::from(&p.value),
            None => PropertyLookup::NotFound,
        }
    }

    /// Names of the direct properties of `node`, in document order.
    pub fn property_names(&self, node: NodeIndex) -> Vec<String> {
        self.node(node)
            .map(|d| d.properties.iter().map(|p| p.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Resolve a dot-path such as `border.width` or `contentItem.width`.
    ///
    /// A direct property with the full dotted name wins; otherwise the head
    /// segment must be a singular Node property and the tail is resolved
    /// recursively on the referenced node.
    pub fn resolve_path<'a>(&'a self, node: NodeIndex, path: &str) -> PropertyLookup<'a> {
        let direct = self.property(node, path);
        if direct.exists() {
            return direct;
        }
        if let Some((head, tail)) = path.split_once('.')
            && let PropertyLookup::NodeRef(target) = self.property(node, head)
        {
            return self.resolve_path(target, tail);
        }
        PropertyLookup::NotFound
    }

    fn set_property_value(
        &mut self,
        node: NodeIndex,
        name: &str,
        value: PropertyValue,
    ) -> Result<(), ModelError> {
        debug_assert!(!value.holds_nodes());
        let data = self.node_mut_ok(node)?;
        let mut orphaned = Vec::new();
        match data.property_mut(name) {
            Some(existing) => {
                // Overwriting a node-holding property destroys its nodes first.
                orphaned = existing.value.owned_nodes();
                existing.value = value;
            }
            None => data.properties.push(Property::new(name, value)),
        }
        for child in orphaned {
            self.destroy_subtree(child);
        }
        self.emit(ChangeEvent::PropertyChanged {
            node,
            name: name.to_string(),
        });
        Ok(())
    }

    /// Store a literal value under `name`.
    pub fn set_variant(
        &mut self,
        node: NodeIndex,
        name: &str,
        value: VariantValue,
    ) -> Result<(), ModelError> {
        self.set_property_value(node, name, PropertyValue::variant(value))
    }

    /// Store a scope-qualified enumeration literal.
    pub fn set_enumeration(
        &mut self,
        node: NodeIndex,
        name: &str,
        literal: &str,
    ) -> Result<(), ModelError> {
        self.set_property_value(
            node,
            name,
            PropertyValue::variant(VariantValue::Enumeration(literal.to_string())),
        )
    }

    /// Store a declared property carrying an explicit type annotation.
    pub fn set_dynamic_variant(
        &mut self,
        node: NodeIndex,
        name: &str,
        dynamic_type: &str,
        value: VariantValue,
    ) -> Result<(), ModelError> {
        self.set_property_value(
            node,
            name,
            PropertyValue::Variant {
                value,
                dynamic_type: Some(dynamic_type.to_string()),
            },
        )
    }

    /// Store a binding expression.
    pub fn set_binding(
        &mut self,
        node: NodeIndex,
        name: &str,
        expression: &str,
    ) -> Result<(), ModelError> {
        self.set_property_value(node, name, PropertyValue::Binding(expression.to_string()))
    }

    pub fn set_signal_handler(
        &mut self,
        node: NodeIndex,
        name: &str,
        source: &str,
    ) -> Result<(), ModelError> {
        self.set_property_value(node, name, PropertyValue::SignalHandler(source.to_string()))
    }

    pub fn declare_signal(
        &mut self,
        node: NodeIndex,
        name: &str,
        signature: &str,
    ) -> Result<(), ModelError> {
        self.set_property_value(
            node,
            name,
            PropertyValue::SignalDeclaration(signature.to_string()),
        )
    }

    /// Remove a property atomically. Node-holding payloads destroy their
    /// owned nodes. Removing a property that does not exist is a no-op.
    pub fn remove_property(&mut self, node: NodeIndex, name: &str) -> Result<(), ModelError> {
        let data = self.node_mut_ok(node)?;
        let Some(pos) = data.properties.iter().position(|p| p.name == name) else {
            return Ok(());
        };
        let removed = data.properties.remove(pos);
        for child in removed.value.owned_nodes() {
            self.destroy_subtree(child);
        }
        self.emit(ChangeEvent::PropertyRemoved {
            node,
            name: name.to_string(),
        });
        Ok(())
    }

    /// Replace the raw source blob of a component-like node.
    pub fn set_node_source(&mut self, node: NodeIndex, source: &str) -> Result<(), ModelError> {
        let data = self.node_mut_ok(node)?;
        if data.node_source.as_deref() == Some(source) {
            return Ok(());
        }
        data.node_source = Some(source.to_string());
        self.emit(ChangeEvent::NodeSourceChanged { node });
        Ok(())
    }

    /// Mark a property as the type's default property (parser use).
    pub fn mark_default_property(&mut self, node: NodeIndex, name: &str) {
        if let Some(data) = self.graph.node_weight_mut(node)
            && let Some(p) = data.property_mut(name)
        {
            p.is_default = true;
        }
    }

    /// Resolve a binding property to the node whose id it names.
    pub fn resolve_binding(&self, node: NodeIndex, name: &str) -> Result<NodeIndex, ModelError> {
        match self.property(node, name) {
            PropertyLookup::Binding(expr) => {
                let id = expr.trim();
                self.node_for_id(id)
                    .ok_or_else(|| ModelError::UnresolvedReference(id.to_string()))
            }
            PropertyLookup::NotFound => Err(ModelError::WrongPropertyKind {
                name: name.to_string(),
                expected: "binding",
            }),
            _ => Err(ModelError::WrongPropertyKind {
                name: name.to_string(),
                expected: "binding",
            }),
        }
    }

    // ─── Structure ───────────────────────────────────────────────────────

    /// The parent edge: owning node and owning property name.
    pub fn parent_of(&self, node: NodeIndex) -> Option<(NodeIndex, String)> {
        let edge = self
            .graph
            .edges_directed(node, Direction::Incoming)
            .next()?;
        Some((edge.source(), edge.weight().property.clone()))
    }

    /// The node's position among the siblings of its owning property.
    pub fn index_in_parent(&self, node: NodeIndex) -> Option<usize> {
        let (parent, property) = self.parent_of(node)?;
        match self.property(parent, &property) {
            PropertyLookup::NodeList(list) => list.iter().position(|&n| n == node),
            PropertyLookup::NodeRef(_) => Some(0),
            _ => None,
        }
    }

    pub fn is_ancestor_of(&self, ancestor: NodeIndex, descendant: NodeIndex) -> bool {
        if ancestor == descendant {
            return false;
        }
        let mut current = descendant;
        while let Some((parent, _)) = self.parent_of(current) {
            if parent == ancestor {
                return true;
            }
            current = parent;
        }
        false
    }

    /// Move `node` into `parent`'s `property_name`. For list containers,
    /// `index` picks the insertion slot (append when `None`). Reparenting
    /// into an occupied singular container detaches the occupant; it
    /// becomes parentless, not destroyed.
    pub fn reparent(
        &mut self,
        node: NodeIndex,
        parent: NodeIndex,
        property_name: &str,
        kind: ContainerKind,
        index: Option<usize>,
    ) -> Result<(), ModelError> {
        if node == self.root {
            return Err(ModelError::RootNode);
        }
        self.node_ok(node)?;
        self.node_ok(parent)?;
        if node == parent || self.is_ancestor_of(node, parent) {
            return Err(ModelError::WouldCreateCycle {
                child: self.describe(node),
                parent: self.describe(parent),
            });
        }

        let old_parent = self.parent_of(node);
        if let Some((old_idx, old_name)) = &old_parent {
            self.remove_child_entry(*old_idx, old_name.clone(), node);
        }

        // Attach into the parent's property collection.
        let data = self.node_mut_ok(parent)?;
        let mut evicted = None;
        match data.property_mut(property_name) {
            Some(existing) => match &mut existing.value {
                PropertyValue::NodeList(list) => {
                    let at = index.unwrap_or(list.len()).min(list.len());
                    list.insert(at, node);
                }
                PropertyValue::Node(occupant) => {
                    evicted = Some(*occupant);
                    *occupant = node;
                }
                other => {
                    // Non-node payload replaced wholesale, like any other overwrite.
                    *other = match kind {
                        ContainerKind::Singular => PropertyValue::Node(node),
                        ContainerKind::List => PropertyValue::NodeList(vec![node]),
                    };
                }
            },
            None => {
                let value = match kind {
                    ContainerKind::Singular => PropertyValue::Node(node),
                    ContainerKind::List => PropertyValue::NodeList(vec![node]),
                };
                data.properties.push(Property::new(property_name, value));
            }
        }
        if let Some(evicted) = evicted
            && let Some(edge) = self.graph.find_edge(parent, evicted)
        {
            self.graph.remove_edge(edge);
        }

        self.graph.add_edge(
            parent,
            node,
            ParentEdge {
                property: property_name.to_string(),
            },
        );
        self.emit(ChangeEvent::NodeReparented {
            node,
            old_parent: old_parent.map(|(p, _)| p),
            new_parent: parent,
            property: property_name.to_string(),
        });
        Ok(())
    }

    /// Slide `node` to `index` within its owning NodeList property.
    pub fn move_to_index(&mut self, node: NodeIndex, index: usize) -> Result<(), ModelError> {
        let (parent, property) = self.parent_of(node).ok_or(ModelError::UnknownNode)?;
        let data = self.node_mut_ok(parent)?;
        let Some(p) = data.property_mut(&property) else {
            return Err(ModelError::UnknownNode);
        };
        if let PropertyValue::NodeList(list) = &mut p.value {
            let Some(pos) = list.iter().position(|&n| n == node) else {
                return Err(ModelError::UnknownNode);
            };
            let target = index.min(list.len() - 1);
            if pos != target {
                let moved = list.remove(pos);
                list.insert(target, moved);
                self.emit(ChangeEvent::PropertyChanged {
                    node: parent,
                    name: property,
                });
            }
            Ok(())
        } else {
            Err(ModelError::WrongPropertyKind {
                name: property,
                expected: "node list",
            })
        }
    }

    /// Drop `child` from `parent`'s property collection and its edge.
    /// Empty NodeList properties are removed entirely.
    fn remove_child_entry(&mut self, parent: NodeIndex, property: String, child: NodeIndex) {
        if let Some(data) = self.graph.node_weight_mut(parent)
            && let Some(pos) = data.properties.iter().position(|p| p.name == property)
        {
            let drop_property = match &mut data.properties[pos].value {
                PropertyValue::NodeList(list) => {
                    list.retain(|&n| n != child);
                    list.is_empty()
                }
                PropertyValue::Node(n) => *n == child,
                _ => false,
            };
            if drop_property {
                data.properties.remove(pos);
            }
        }
        if let Some(edge) = self.graph.find_edge(parent, child) {
            self.graph.remove_edge(edge);
        }
    }

    // ─── Traversal ───────────────────────────────────────────────────────

    /// Direct children in document order (property order, list order).
    pub fn direct_sub_nodes(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let Some(data) = self.node(node) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for p in &data.properties {
            out.extend(p.value.owned_nodes());
        }
        out
    }

    /// All owned descendants, depth-first preorder.
    pub fn all_sub_nodes(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        self.collect_sub_nodes(node, &mut out);
        out
    }

    pub fn all_sub_nodes_and_this_node(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut out = vec![node];
        self.collect_sub_nodes(node, &mut out);
        out
    }

    fn collect_sub_nodes(&self, node: NodeIndex, out: &mut Vec<NodeIndex>) {
        for child in self.direct_sub_nodes(node) {
            out.push(child);
            self.collect_sub_nodes(child, out);
        }
    }

    // ─── Auxiliary data ──────────────────────────────────────────────────

    pub fn set_auxiliary(
        &mut self,
        node: NodeIndex,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), ModelError> {
        let data = self.node_mut_ok(node)?;
        data.aux.insert(key.to_string(), value);
        self.emit(ChangeEvent::AuxiliaryChanged {
            node,
            key: key.to_string(),
        });
        Ok(())
    }

    pub fn auxiliary(&self, node: NodeIndex, key: &str) -> Option<&serde_json::Value> {
        self.node(node).and_then(|d| d.aux.get(key))
    }

    // ─── Debug helpers ───────────────────────────────────────────────────

    fn describe(&self, node: NodeIndex) -> String {
        match self.node(node) {
            Some(d) => match d.id() {
                Some(id) => id.to_string(),
                None => format!("{}#{}", d.type_name, node.index()),
            },
            None => format!("#{}", node.index()),
        }
    }

    /// Verify the parent-edge / property-collection invariant and the id
    /// index. Intended for tests and debug assertions.
    pub fn check_consistency(&self) -> Result<(), String> {
        for node in self.graph.node_indices() {
            for child in self.direct_sub_nodes(node) {
                let Some((parent, _)) = self.parent_of(child) else {
                    return Err(format!("child {child:?} of {node:?} has no parent edge"));
                };
                if parent != node {
                    return Err(format!("child {child:?} edge points at {parent:?}, held by {node:?}"));
                }
            }
            if let Some(id) = self.id_of(node)
                && self.id_index.get(id) != Some(&node)
            {
                return Err(format!("id `{id}` not indexed to {node:?}"));
            }
        }
        for (id, &node) in &self.id_index {
            if self.id_of(node) != Some(id) {
                return Err(format!("index entry `{id}` stale"));
            }
        }
        Ok(())
    }
}

// ─── Notification blocker ────────────────────────────────────────────────

/// RAII scope that suppresses change notifications. Derefs to the model so
/// bulk edits run through the normal mutation API.
pub struct NotificationBlocker<'a> {
    model: &'a mut Model,
}

impl Deref for NotificationBlocker<'_> {
    type Target = Model;
    fn deref(&self) -> &Model {
        self.model
    }
}

impl DerefMut for NotificationBlocker<'_> {
    fn deref_mut(&mut self) -> &mut Model {
        self.model
    }
}

impl Drop for NotificationBlocker<'_> {
    fn drop(&mut self) {
        self.model.blocked -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::VariantValue;

    fn item(model: &mut Model, parent: NodeIndex, id: &str) -> NodeIndex {
        let n = model.create_node("Item", (1, 0), Vec::new(), None);
        model
            .reparent(n, parent, "data", ContainerKind::List, None)
            .unwrap();
        model.set_id(n, id).unwrap();
        n
    }

    #[test]
    fn create_reparent_destroy() {
        let mut model = Model::new("Item", (1, 0));
        let root = model.root();
        let a = item(&mut model, root, "a");
        let b = item(&mut model, a, "b");

        assert_eq!(model.direct_sub_nodes(root), vec![a]);
        assert_eq!(model.all_sub_nodes(root), vec![a, b]);
        assert_eq!(model.parent_of(b), Some((a, "data".to_string())));
        model.check_consistency().unwrap();

        model.destroy(a).unwrap();
        assert!(!model.contains(a));
        assert!(!model.contains(b));
        assert!(model.node_for_id("b").is_none());
        model.check_consistency().unwrap();
    }

    #[test]
    fn property_order_survives_inline_spill() {
        let mut model = Model::new("Item", (1, 0));
        let root = model.root();
        let names: Vec<String> = (0..12).map(|i| format!("p{i}")).collect();
        for (i, name) in names.iter().enumerate() {
            model
                .set_variant(root, name, VariantValue::Int(i as i64))
                .unwrap();
        }
        assert_eq!(model.property_names(root), names);
        assert_eq!(
            model.property(root, "p11").as_variant(),
            Some(&VariantValue::Int(11))
        );
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut model = Model::new("Item", (1, 0));
        let root = model.root();
        let _a = item(&mut model, root, "a");
        let b = model.create_node("Item", (1, 0), Vec::new(), None);
        assert_eq!(
            model.set_id(b, "a"),
            Err(ModelError::DuplicateId("a".to_string()))
        );
        assert!(model.set_id(b, "Bad").is_err());
        assert!(model.set_id(b, "").is_ok());
    }

    #[test]
    fn cycle_rejected() {
        let mut model = Model::new("Item", (1, 0));
        let root = model.root();
        let a = item(&mut model, root, "a");
        let b = item(&mut model, a, "b");
        let err = model
            .reparent(a, b, "data", ContainerKind::List, None)
            .unwrap_err();
        assert!(matches!(err, ModelError::WouldCreateCycle { .. }));
    }

    #[test]
    fn singular_property_evicts_without_destroy() {
        let mut model = Model::new("Item", (1, 0));
        let root = model.root();
        let first = model.create_node("Item", (1, 0), Vec::new(), None);
        let second = model.create_node("Item", (1, 0), Vec::new(), None);
        model
            .reparent(first, root, "contentItem", ContainerKind::Singular, None)
            .unwrap();
        model
            .reparent(second, root, "contentItem", ContainerKind::Singular, None)
            .unwrap();

        // First occupant is alive but parentless.
        assert!(model.contains(first));
        assert!(model.parent_of(first).is_none());
        assert!(matches!(
            model.property(root, "contentItem"),
            PropertyLookup::NodeRef(n) if n == second
        ));
    }

    #[test]
    fn nodelist_insert_at_index() {
        let mut model = Model::new("Item", (1, 0));
        let root = model.root();
        let a = item(&mut model, root, "a");
        let b = item(&mut model, root, "b");
        let c = model.create_node("Item", (1, 0), Vec::new(), None);
        model
            .reparent(c, root, "data", ContainerKind::List, Some(1))
            .unwrap();
        assert_eq!(model.direct_sub_nodes(root), vec![a, c, b]);
        model.move_to_index(c, 0).unwrap();
        assert_eq!(model.direct_sub_nodes(root), vec![c, a, b]);
    }

    #[test]
    fn destroy_spares_binding_referenced_nodes() {
        let mut model = Model::new("Item", (1, 0));
        let root = model.root();
        let a = item(&mut model, root, "a");
        let b = item(&mut model, root, "b");
        model.set_binding(a, "target", "b").unwrap();
        assert_eq!(model.resolve_binding(a, "target"), Ok(b));

        model.destroy(a).unwrap();
        assert!(model.contains(b), "binding-referenced node must survive");
    }

    #[test]
    fn resolve_binding_unknown_id() {
        let mut model = Model::new("Item", (1, 0));
        let root = model.root();
        let a = item(&mut model, root, "a");
        model.set_binding(a, "target", "ghost").unwrap();
        assert_eq!(
            model.resolve_binding(a, "target"),
            Err(ModelError::UnresolvedReference("ghost".to_string()))
        );
    }

    #[test]
    fn remove_property_destroys_owned_nodes() {
        let mut model = Model::new("Item", (1, 0));
        let root = model.root();
        let a = item(&mut model, root, "a");
        let s = model.create_node("State", (1, 0), Vec::new(), None);
        model
            .reparent(s, a, "states", ContainerKind::List, None)
            .unwrap();
        model.remove_property(a, "states").unwrap();
        assert!(!model.contains(s));
        assert!(!model.property(a, "states").exists());
        model.check_consistency().unwrap();
    }

    #[test]
    fn dot_path_resolution() {
        let mut model = Model::new("Item", (1, 0));
        let root = model.root();
        let a = item(&mut model, root, "a");
        model
            .set_variant(a, "border.width", VariantValue::Int(2))
            .unwrap();
        let inner = model.create_node("Item", (1, 0), Vec::new(), None);
        model
            .reparent(inner, a, "contentItem", ContainerKind::Singular, None)
            .unwrap();
        model
            .set_variant(inner, "width", VariantValue::Int(40))
            .unwrap();

        assert!(model.resolve_path(a, "border.width").exists());
        assert_eq!(
            model.resolve_path(a, "contentItem.width").as_variant(),
            Some(&VariantValue::Int(40))
        );
        assert!(!model.resolve_path(a, "contentItem.height").exists());
    }

    #[test]
    fn notifications_and_blocker() {
        let mut model = Model::new("Item", (1, 0));
        let root = model.root();
        let a = item(&mut model, root, "a");
        let events = model.take_events();
        assert!(events.contains(&ChangeEvent::NodeCreated(a)));
        assert!(
            events
                .iter()
                .any(|e| matches!(e, ChangeEvent::IdChanged { .. }))
        );

        {
            let mut blocked = model.block_notifications();
            blocked.set_variant(a, "x", VariantValue::Int(5)).unwrap();
        }
        assert!(model.take_events().is_empty());

        model.set_variant(a, "x", VariantValue::Int(6)).unwrap();
        assert_eq!(model.take_events().len(), 1);
    }

    #[test]
    fn variant_overwrite_replaces_tag() {
        let mut model = Model::new("Item", (1, 0));
        let root = model.root();
        let a = item(&mut model, root, "a");
        model.set_variant(a, "width", VariantValue::Int(10)).unwrap();
        model.set_binding(a, "width", "parent.width").unwrap();
        assert!(matches!(
            model.property(a, "width"),
            PropertyLookup::Binding("parent.width")
        ));
    }
}
