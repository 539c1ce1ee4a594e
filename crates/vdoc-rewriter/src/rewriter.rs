//! Bidirectional synchronizer: model ↔ document text.
//!
//! The rewriter owns the authoritative model and the text buffer and keeps
//! the two in sync:
//!
//! - **Model → Text**: mutations are applied to the model immediately and
//!   buffered as pending work; a flush translates them into span-local
//!   `Replace`/`Move`/`Indent` edits against the buffer, so untouched
//!   regions keep the user's formatting byte for byte.
//!
//! - **Text → Model (amend)**: a new buffer is re-parsed and diffed against
//!   the live model. Survivors are matched by id first, then by type and
//!   sibling position, and receive targeted property mutations; nodes are
//!   never wholesale-replaced, so observer-held indices survive
//!   reformat-only edits.

use crate::error::RewriterError;
use crate::positions::PositionMap;
use crate::textedit::{TextEdit, apply_edits};
use crate::transaction::UndoStack;
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};
use vdoc_model::builder::default_for_type;
use vdoc_model::parser::{MemberAst, ValueAst};
use vdoc_model::{
    ChangeEvent, ContainerKind, DEFAULT_PROPERTY, Diagnostic, DocumentAst, ImportAst, Model,
    ModelError, NodeIndex, ObjectAst, Property, PropertyLookup, PropertyValue, Span, VariantValue,
    build_document, emit_document, emit_node, instantiate_object, parse_document, validate_id,
};

const INDENT: &str = "    ";

// ─── States and policies ─────────────────────────────────────────────────

/// Lifecycle of the synchronizer. Flushing and reconciliation both run to
/// completion inside a single call, so no transient flush state is ever
/// observable from outside; callers only see these four.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriterState {
    Idle,
    CollectingChanges,
    Amending,
    Error,
}

/// How text updates that carry problems are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Any document problem aborts the update; the model stays untouched.
    Validate,
    /// Best effort: problems degrade to warning diagnostics.
    Amend,
}

// ─── Mutations ───────────────────────────────────────────────────────────

/// A model mutation routed through the rewriter so the text stays in sync.
#[derive(Debug, Clone)]
pub enum ModelMutation {
    SetVariant {
        node: NodeIndex,
        name: String,
        value: VariantValue,
    },
    SetDynamicVariant {
        node: NodeIndex,
        name: String,
        dynamic_type: String,
        value: VariantValue,
    },
    SetBinding {
        node: NodeIndex,
        name: String,
        expression: String,
    },
    SetSignalHandler {
        node: NodeIndex,
        name: String,
        source: String,
    },
    DeclareSignal {
        node: NodeIndex,
        name: String,
        signature: String,
    },
    RemoveProperty {
        node: NodeIndex,
        name: String,
    },
    SetId {
        node: NodeIndex,
        id: String,
    },
    SetNodeSource {
        node: NodeIndex,
        source: String,
    },
    CreateNode {
        type_name: String,
        parent: NodeIndex,
        property: String,
        kind: ContainerKind,
        index: Option<usize>,
        properties: Vec<Property>,
    },
    DestroyNode {
        node: NodeIndex,
    },
    Reparent {
        node: NodeIndex,
        parent: NodeIndex,
        property: String,
        kind: ContainerKind,
        index: Option<usize>,
    },
    MoveToIndex {
        node: NodeIndex,
        index: usize,
    },
    SetAuxiliary {
        node: NodeIndex,
        key: String,
        value: serde_json::Value,
    },
}

/// Buffered work between mutation and flush.
#[derive(Debug, Clone)]
enum Pending {
    /// Regenerate this node's text from the model.
    Touch(NodeIndex),
    /// Relocate this node's text verbatim (formatting-preserving move).
    MoveNode {
        node: NodeIndex,
        old_parent: NodeIndex,
        new_parent: NodeIndex,
    },
}

// ─── Rewriter ────────────────────────────────────────────────────────────

/// The synchronizer. Owns the model and the text buffer.
pub struct Rewriter {
    pub(crate) model: Model,
    pub(crate) text: String,
    imports: Vec<ImportAst>,
    version: (i32, i32),
    pub(crate) positions: PositionMap,
    pub(crate) state: RewriterState,
    policy: UpdatePolicy,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pending: Vec<Pending>,
    pub(crate) open_transactions: u32,
    pub(crate) transaction_identifier: Option<String>,
    pub(crate) snapshot_before: Option<String>,
    pub(crate) transaction_poisoned: bool,
    pub(crate) undo: UndoStack,
}

impl Rewriter {
    /// Build a rewriter from document text.
    pub fn from_text(text: &str, policy: UpdatePolicy) -> Result<Self, RewriterError> {
        let doc = parse_document(text)?;
        let issues = validate_ast(&doc, text);
        if policy == UpdatePolicy::Validate && !issues.is_empty() {
            return Err(RewriterError::InvalidDocument(issues));
        }
        let built = build_document(&doc, text);
        let version = doc.imports.iter().find_map(|i| i.version).unwrap_or((1, 0));
        let mut diagnostics = issues;
        diagnostics.extend(built.diagnostics);
        Ok(Self {
            model: built.model,
            text: text.to_string(),
            imports: doc.imports,
            version,
            positions: PositionMap::from_spans(built.spans),
            state: RewriterState::Idle,
            policy,
            diagnostics,
            pending: Vec::new(),
            open_transactions: 0,
            transaction_identifier: None,
            snapshot_before: None,
            transaction_poisoned: false,
            undo: UndoStack::new(),
        })
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn state(&self) -> RewriterState {
        self.state
    }

    pub fn policy(&self) -> UpdatePolicy {
        self.policy
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn imports(&self) -> &[ImportAst] {
        &self.imports
    }

    /// The innermost node whose source covers `offset`.
    pub fn node_at(&self, offset: usize) -> Option<NodeIndex> {
        self.positions.node_at(offset)
    }

    pub fn span_of(&self, node: NodeIndex) -> Option<Span> {
        self.positions.get(node)
    }

    /// Drain accumulated change notifications. Empty while a transaction is
    /// open: observers only see completed batches.
    pub fn take_events(&mut self) -> Vec<ChangeEvent> {
        if self.open_transactions > 0 {
            return Vec::new();
        }
        self.model.take_events()
    }

    // ─── Model → Text ────────────────────────────────────────────────────

    /// Apply a mutation. Outside a transaction the text syncs immediately
    /// and the change becomes its own undo step; inside one, work is
    /// buffered until the outermost commit.
    pub fn apply(&mut self, mutation: ModelMutation) -> Result<Option<NodeIndex>, RewriterError> {
        if self.state == RewriterState::Error {
            return Err(RewriterError::ErrorState);
        }
        let in_transaction = self.open_transactions > 0;
        let before = (!in_transaction).then(|| self.text.clone());

        let created = self.apply_to_model(mutation)?;

        if let Some(before) = before {
            self.flush_pending()?;
            if before != self.text {
                self.undo.push("change", before, self.text.clone());
            }
        } else {
            self.state = RewriterState::CollectingChanges;
        }
        Ok(created)
    }

    /// Create a node attached under `parent`. Same contract as routing
    /// [`ModelMutation::CreateNode`] through [`Rewriter::apply`], with the
    /// created index returned directly.
    pub fn create_node(
        &mut self,
        type_name: &str,
        parent: NodeIndex,
        property: &str,
        kind: ContainerKind,
        index: Option<usize>,
        properties: Vec<Property>,
    ) -> Result<NodeIndex, RewriterError> {
        if self.state == RewriterState::Error {
            return Err(RewriterError::ErrorState);
        }
        let in_transaction = self.open_transactions > 0;
        let before = (!in_transaction).then(|| self.text.clone());

        let node = self
            .model
            .create_node(type_name, self.version, properties, None);
        self.model.reparent(node, parent, property, kind, index)?;
        self.touch(parent);

        if let Some(before) = before {
            self.flush_pending()?;
            if before != self.text {
                self.undo.push("change", before, self.text.clone());
            }
        } else {
            self.state = RewriterState::CollectingChanges;
        }
        Ok(node)
    }

    fn apply_to_model(
        &mut self,
        mutation: ModelMutation,
    ) -> Result<Option<NodeIndex>, RewriterError> {
        match mutation {
            ModelMutation::SetVariant { node, name, value } => {
                self.model.set_variant(node, &name, value)?;
                self.touch(node);
            }
            ModelMutation::SetDynamicVariant {
                node,
                name,
                dynamic_type,
                value,
            } => {
                self.model
                    .set_dynamic_variant(node, &name, &dynamic_type, value)?;
                self.touch(node);
            }
            ModelMutation::SetBinding {
                node,
                name,
                expression,
            } => {
                self.model.set_binding(node, &name, &expression)?;
                self.touch(node);
            }
            ModelMutation::SetSignalHandler { node, name, source } => {
                self.model.set_signal_handler(node, &name, &source)?;
                self.touch(node);
            }
            ModelMutation::DeclareSignal {
                node,
                name,
                signature,
            } => {
                self.model.declare_signal(node, &name, &signature)?;
                self.touch(node);
            }
            ModelMutation::RemoveProperty { node, name } => {
                self.model.remove_property(node, &name)?;
                self.touch(node);
            }
            ModelMutation::SetId { node, id } => {
                self.model.set_id(node, &id)?;
                self.touch(node);
            }
            ModelMutation::SetNodeSource { node, source } => {
                self.model.set_node_source(node, &source)?;
                self.touch(node);
            }
            ModelMutation::CreateNode {
                type_name,
                parent,
                property,
                kind,
                index,
                properties,
            } => {
                let node = self
                    .model
                    .create_node(&type_name, self.version, properties, None);
                self.model.reparent(node, parent, &property, kind, index)?;
                self.touch(parent);
                return Ok(Some(node));
            }
            ModelMutation::DestroyNode { node } => {
                let parent = self.model.parent_of(node).map(|(p, _)| p);
                self.model.destroy(node)?;
                match parent {
                    Some(p) => self.touch(p),
                    None => self.positions.remove(node),
                }
            }
            ModelMutation::Reparent {
                node,
                parent,
                property,
                kind,
                index,
            } => {
                let old_parent = self.model.parent_of(node).map(|(p, _)| p);
                self.model.reparent(node, parent, &property, kind, index)?;
                // A move between default slots with known spans can be a
                // verbatim text relocation.
                let movable = property == DEFAULT_PROPERTY
                    && kind == ContainerKind::List
                    && self.positions.get(node).is_some()
                    && self.positions.get(parent).is_some();
                match (old_parent, movable) {
                    (Some(old), true) => self.pending.push(Pending::MoveNode {
                        node,
                        old_parent: old,
                        new_parent: parent,
                    }),
                    (Some(old), false) => {
                        self.touch(old);
                        self.touch(parent);
                    }
                    (None, _) => self.touch(parent),
                }
            }
            ModelMutation::MoveToIndex { node, index } => {
                let parent = self.model.parent_of(node).map(|(p, _)| p);
                self.model.move_to_index(node, index)?;
                if let Some(p) = parent {
                    self.touch(p);
                }
            }
            ModelMutation::SetAuxiliary { node, key, value } => {
                // Auxiliary data is editor-only state, nothing reaches text.
                self.model.set_auxiliary(node, &key, value)?;
            }
        }
        Ok(None)
    }

    fn touch(&mut self, node: NodeIndex) {
        self.pending.push(Pending::Touch(node));
    }

    /// Translate buffered work into text edits and apply them.
    pub(crate) fn flush_pending(&mut self) -> Result<(), RewriterError> {
        if self.pending.is_empty() {
            self.state = RewriterState::Idle;
            return Ok(());
        }
        let pending = std::mem::take(&mut self.pending);

        let all_moves = pending.iter().all(|p| matches!(p, Pending::MoveNode { .. }));
        if all_moves {
            for p in &pending {
                if let Pending::MoveNode { node, .. } = p {
                    self.apply_move(*node)?;
                }
            }
            self.state = RewriterState::Idle;
            return Ok(());
        }

        let mut touched: HashSet<NodeIndex> = HashSet::new();
        for p in pending {
            match p {
                Pending::Touch(node) => {
                    touched.insert(node);
                }
                Pending::MoveNode {
                    old_parent,
                    new_parent,
                    ..
                } => {
                    touched.insert(old_parent);
                    touched.insert(new_parent);
                }
            }
        }
        self.regenerate(touched)
    }

    /// Regenerate the text of the given nodes from the model.
    fn regenerate(&mut self, touched: HashSet<NodeIndex>) -> Result<(), RewriterError> {
        // Escalate nodes without a span to their nearest written ancestor.
        let mut tops: HashSet<NodeIndex> = HashSet::new();
        for node in touched {
            let mut current = node;
            loop {
                if !self.model.contains(current) {
                    break;
                }
                if self.positions.get(current).is_some() {
                    tops.insert(current);
                    break;
                }
                match self.model.parent_of(current) {
                    Some((parent, _)) => current = parent,
                    None => return self.full_reemit(),
                }
            }
        }
        // Drop nodes covered by a touched ancestor.
        let list: Vec<NodeIndex> = tops
            .iter()
            .copied()
            .filter(|&n| !tops.iter().any(|&a| self.model.is_ancestor_of(a, n)))
            .collect();

        let mut edits = Vec::with_capacity(list.len());
        for node in list {
            let Some(span) = self.positions.get(node) else {
                return self.full_reemit();
            };
            let depth = depth_at(&self.text, span.start);
            edits.push(TextEdit::replace(span, emit_node(&self.model, node, depth)));
        }
        apply_edits(&mut self.text, edits);
        self.refresh_spans()?;
        self.state = RewriterState::Idle;
        Ok(())
    }

    /// Relocate one node's text verbatim into its new parent.
    fn apply_move(&mut self, node: NodeIndex) -> Result<(), RewriterError> {
        let (Some(span), Some((parent, _))) =
            (self.positions.get(node), self.model.parent_of(node))
        else {
            let mut touched = HashSet::new();
            if let Some((parent, _)) = self.model.parent_of(node) {
                touched.insert(parent);
            }
            return self.regenerate(touched);
        };
        let Some(parent_span) = self.positions.get(parent) else {
            return self.full_reemit();
        };
        let depth = depth_at(&self.text, parent_span.start);
        let wide = widen_to_line(&self.text, span);

        // Place before the next sibling, or before the closing brace.
        let siblings = self.children_of(parent, DEFAULT_PROPERTY);
        let position = siblings.iter().position(|&n| n == node);
        let next_span = position
            .and_then(|i| siblings.get(i + 1))
            .and_then(|&n| self.positions.get(n));

        let edit = match next_span {
            Some(next) => TextEdit::Move {
                span: wide,
                target: next.start,
                prefix: String::new(),
                suffix: format!("\n{}", INDENT.repeat(depth + 1)),
            },
            None => TextEdit::Move {
                span: wide,
                target: parent_span.end - 1,
                prefix: INDENT.to_string(),
                suffix: format!("\n{}", INDENT.repeat(depth)),
            },
        };
        apply_edits(&mut self.text, vec![edit]);
        self.refresh_spans()?;

        // Normalize the indentation of the relocated block.
        if let Some(new_span) = self.positions.get(node) {
            let lines = line_of(&self.text, new_span.start)..line_of(&self.text, new_span.end) + 1;
            apply_edits(&mut self.text, vec![TextEdit::Indent { lines }]);
            self.refresh_spans()?;
        }
        Ok(())
    }

    fn children_of(&self, parent: NodeIndex, property: &str) -> SmallVec<[NodeIndex; 8]> {
        match self.model.property(parent, property) {
            PropertyLookup::NodeList(list) => SmallVec::from_slice(list),
            PropertyLookup::NodeRef(n) => SmallVec::from_slice(&[n]),
            _ => SmallVec::new(),
        }
    }

    /// Last resort: throw the whole buffer away and emit canonically.
    fn full_reemit(&mut self) -> Result<(), RewriterError> {
        log::debug!("falling back to full document re-emit");
        self.text = emit_document(&self.model, &self.imports);
        self.refresh_spans()?;
        self.state = RewriterState::Idle;
        Ok(())
    }

    /// Re-parse the buffer and rebuild the node → span table by walking the
    /// model and the fresh AST in lockstep.
    fn refresh_spans(&mut self) -> Result<(), RewriterError> {
        let doc = parse_document(&self.text)?;
        let mut positions = PositionMap::new();
        align_spans(&self.model, self.model.root(), &doc.root, &mut positions);
        self.positions = positions;
        Ok(())
    }

    // ─── Text → Model (amend) ────────────────────────────────────────────

    /// Take over edited document text, diffing it into the live model.
    /// Pushes an undo step on success.
    pub fn amend(&mut self, new_text: &str) -> Result<(), RewriterError> {
        let before = self.text.clone();
        self.amend_inner(new_text)?;
        if before != self.text {
            self.undo.push("amend", before, self.text.clone());
        }
        Ok(())
    }

    pub(crate) fn amend_inner(&mut self, new_text: &str) -> Result<(), RewriterError> {
        self.state = RewriterState::Amending;
        let doc = match parse_document(new_text) {
            Ok(doc) => doc,
            Err(err) => {
                self.diagnostics = err.diagnostics.clone();
                self.state = RewriterState::Error;
                return Err(err.into());
            }
        };
        let issues = validate_ast(&doc, new_text);
        if self.policy == UpdatePolicy::Validate && !issues.is_empty() {
            self.diagnostics = issues.clone();
            self.state = RewriterState::Error;
            return Err(RewriterError::InvalidDocument(issues));
        }

        let root = self.model.root();
        let root_type = self
            .model
            .node(root)
            .map(|d| d.type_name.as_str().to_string())
            .unwrap_or_default();
        let version = doc.imports.iter().find_map(|i| i.version).unwrap_or((1, 0));

        if doc.root.type_name != root_type {
            // The root changed type: everything below it is a new document.
            let built = build_document(&doc, new_text);
            self.model = built.model;
            self.positions = PositionMap::from_spans(built.spans);
            self.diagnostics = issues;
            self.diagnostics.extend(built.diagnostics);
        } else {
            let mut ctx = AmendContext {
                model: &mut self.model,
                positions: PositionMap::new(),
                diagnostics: issues,
                version,
                source: new_text,
                paired: HashSet::new(),
                document_ids: collect_ids(&doc.root),
            };
            ctx.diff_node(root, &doc.root);
            self.positions = ctx.positions;
            self.diagnostics = ctx.diagnostics;
        }

        self.imports = doc.imports;
        self.version = version;
        self.text = new_text.to_string();
        self.state = RewriterState::Idle;
        Ok(())
    }

    pub(crate) fn discard_pending(&mut self) {
        self.pending.clear();
    }

    /// Rebuild the model wholesale from the current buffer. Used by
    /// transaction rollback, where handle stability is not promised.
    pub(crate) fn rebuild_from_text(&mut self) -> Result<(), RewriterError> {
        let doc = parse_document(&self.text)?;
        let built = build_document(&doc, &self.text);
        self.model = built.model;
        self.positions = PositionMap::from_spans(built.spans);
        self.diagnostics = built.diagnostics;
        self.state = RewriterState::Idle;
        Ok(())
    }

    /// Leave the error state; the last good text stays ground truth.
    pub fn reset_to_last_correct(&mut self) {
        self.diagnostics.clear();
        self.pending.clear();
        self.state = RewriterState::Idle;
    }
}

// ─── Amend diffing ───────────────────────────────────────────────────────

struct AmendContext<'a> {
    model: &'a mut Model,
    positions: PositionMap,
    diagnostics: Vec<Diagnostic>,
    version: (i32, i32),
    source: &'a str,
    /// Nodes already claimed by a match in this pass.
    paired: HashSet<NodeIndex>,
    /// Every id appearing anywhere in the new document, with its declared
    /// type. A node matching an entry is a survivor even when it has left
    /// its old container: the container carrying it now claims it later in
    /// the walk.
    document_ids: HashMap<String, String>,
}

impl AmendContext<'_> {
    fn diff_node(&mut self, node: NodeIndex, object: &ObjectAst) {
        self.positions.insert(node, object.span);
        self.paired.insert(node);

        if let Some(src) = &object.node_source {
            let current = self
                .model
                .node(node)
                .and_then(|d| d.node_source().map(str::to_string));
            if current.as_deref() != Some(src.as_str()) {
                let res = self.model.set_node_source(node, src);
                self.check(res, object.span);
            }
            return;
        }

        // Id.
        let ast_id = object.id().unwrap_or("");
        if self.model.id_of(node).unwrap_or("") != ast_id {
            let res = self.model.set_id(node, ast_id);
            self.check(res, object.span);
        }

        // Plain properties.
        let desired = desired_properties(object);
        for (name, value) in &desired {
            if PropertyLookup::from(value) != self.model.property(node, name) {
                let res = set_property(self.model, node, name, value.clone());
                self.check(res, object.span);
            }
        }
        let stale: Vec<String> = self
            .model
            .node(node)
            .map(|d| {
                d.properties()
                    .iter()
                    .filter(|p| !p.value.holds_nodes())
                    .filter(|p| !desired.iter().any(|(n, _)| n == &p.name))
                    .map(|p| p.name.clone())
                    .collect()
            })
            .unwrap_or_default();
        for name in stale {
            let res = self.model.remove_property(node, &name);
            self.check(res, object.span);
        }

        // Containers.
        let containers = collect_containers(object);
        let mut recurse: Vec<(NodeIndex, &ObjectAst)> = Vec::new();
        for (name, kind, objects) in &containers {
            let current: Vec<NodeIndex> = match self.model.property(node, name) {
                PropertyLookup::NodeList(list) => list.to_vec(),
                PropertyLookup::NodeRef(n) => vec![n],
                _ => Vec::new(),
            };

            // Match survivors: ids first, then type + sibling position.
            let mut matched: Vec<Option<NodeIndex>> = objects
                .iter()
                .map(|obj| {
                    obj.id()
                        .and_then(|id| self.model.node_for_id(id))
                        .filter(|&n| !self.paired.contains(&n))
                        .filter(|&n| self.type_of(n) == obj.type_name)
                })
                .collect();
            let mut claimed: HashSet<NodeIndex> =
                matched.iter().flatten().copied().collect();
            let mut free: Vec<NodeIndex> = current
                .iter()
                .copied()
                .filter(|n| !claimed.contains(n) && !self.paired.contains(n))
                .collect();
            for (slot, obj) in matched.iter_mut().zip(objects.iter()) {
                if slot.is_some() {
                    continue;
                }
                if let Some(pos) = free.iter().position(|&n| self.type_of(n) == obj.type_name)
                {
                    let n = free.remove(pos);
                    claimed.insert(n);
                    *slot = Some(n);
                }
            }

            // Build the final ordered list, creating what has no match.
            let mut result: Vec<NodeIndex> = Vec::with_capacity(objects.len());
            for (i, (slot, obj)) in matched.iter().zip(objects.iter()).enumerate() {
                let idx = match slot {
                    Some(n) => {
                        recurse.push((*n, obj));
                        *n
                    }
                    None => {
                        let (created, spans) = instantiate_object(
                            self.model,
                            obj,
                            self.version,
                            self.source,
                            &mut self.diagnostics,
                        );
                        for (n, s) in spans {
                            self.positions.insert(n, s);
                            self.paired.insert(n);
                        }
                        created
                    }
                };
                self.paired.insert(idx);
                let in_place = self.model.parent_of(idx) == Some((node, name.clone()));
                if !in_place {
                    let res = self.model.reparent(idx, node, name, *kind, Some(i));
                    self.check(res, obj.span);
                }
                result.push(idx);
            }

            // Vanished nodes. Nodes whose id still appears in the document
            // have merely moved; their new container claims them.
            for gone in current {
                if !result.contains(&gone)
                    && self.model.contains(gone)
                    && !self.survives_elsewhere(gone)
                {
                    let res = self.model.destroy(gone);
                    self.check(res, object.span);
                }
            }

            // Order pass.
            if *kind == ContainerKind::List {
                for (i, idx) in result.iter().enumerate() {
                    if self.model.index_in_parent(*idx) != Some(i) {
                        let res = self.model.move_to_index(*idx, i);
                        self.check(res, object.span);
                    }
                }
            }
        }

        // Container properties with no counterpart in the text.
        let gone_containers: Vec<String> = self
            .model
            .node(node)
            .map(|d| {
                d.properties()
                    .iter()
                    .filter(|p| p.value.holds_nodes())
                    .filter(|p| !containers.iter().any(|(n, ..)| n == &p.name))
                    .map(|p| p.name.clone())
                    .collect()
            })
            .unwrap_or_default();
        for name in gone_containers {
            // Destroy the leftovers one by one: a child whose id survives
            // elsewhere in the document is in transit, not deleted.
            let children: Vec<NodeIndex> = self
                .model
                .property(node, &name)
                .as_nodes();
            let mut any_survivor = false;
            for child in children {
                if self.survives_elsewhere(child) {
                    any_survivor = true;
                } else {
                    let res = self.model.destroy(child);
                    self.check(res, object.span);
                }
            }
            if !any_survivor {
                let res = self.model.remove_property(node, &name);
                self.check(res, object.span);
            }
        }

        if object
            .members
            .iter()
            .any(|m| matches!(m, MemberAst::Child(_)))
        {
            self.model.mark_default_property(node, DEFAULT_PROPERTY);
        }

        for (idx, obj) in recurse {
            self.diff_node(idx, obj);
        }
    }

    /// A node that left its container is in transit, not deleted, when the
    /// new document still declares its id with the same type. Nodes another
    /// container has already claimed count too.
    fn survives_elsewhere(&self, node: NodeIndex) -> bool {
        if self.paired.contains(&node) {
            return true;
        }
        self.model.id_of(node).is_some_and(|id| {
            self.document_ids.get(id).map(String::as_str) == Some(self.type_of(node))
        })
    }

    fn type_of(&self, node: NodeIndex) -> &str {
        self.model
            .node(node)
            .map(|d| d.type_name.as_str())
            .unwrap_or("")
    }

    fn check(&mut self, result: Result<(), ModelError>, span: Span) {
        if let Err(err) = result {
            let (line, column) = vdoc_model::diagnostics::line_column(self.source, span.start);
            log::warn!("amend: {line}:{column}: {err}");
            self.diagnostics
                .push(Diagnostic::warning(line, column, err.to_string()));
        }
    }
}

/// The non-container properties an AST object describes, flattened.
fn desired_properties(object: &ObjectAst) -> Vec<(String, PropertyValue)> {
    let mut out = Vec::new();
    for member in &object.members {
        match member {
            MemberAst::Property { name, value, .. } => {
                out.push((name.clone(), value_to_property(value)));
            }
            MemberAst::PropertyDeclaration {
                name,
                type_name,
                value,
                ..
            } => {
                let value = match value {
                    Some(ValueAst::Variant(v)) => PropertyValue::Variant {
                        value: v.clone(),
                        dynamic_type: Some(type_name.clone()),
                    },
                    Some(ValueAst::Script(expr)) => PropertyValue::Binding(expr.clone()),
                    None => PropertyValue::Variant {
                        value: default_for_type(type_name),
                        dynamic_type: Some(type_name.clone()),
                    },
                };
                out.push((name.clone(), value));
            }
            MemberAst::SignalDeclaration {
                name, signature, ..
            } => {
                out.push((name.clone(), PropertyValue::SignalDeclaration(signature.clone())));
            }
            MemberAst::SignalHandler { name, source, .. } => {
                out.push((name.clone(), PropertyValue::SignalHandler(source.clone())));
            }
            MemberAst::Group { properties, .. } => {
                for (name, value, _) in properties {
                    out.push((name.clone(), value_to_property(value)));
                }
            }
            _ => {}
        }
    }
    out
}

fn value_to_property(value: &ValueAst) -> PropertyValue {
    match value {
        ValueAst::Variant(v) => PropertyValue::variant(v.clone()),
        ValueAst::Script(expr) => PropertyValue::Binding(expr.clone()),
    }
}

fn set_property(
    model: &mut Model,
    node: NodeIndex,
    name: &str,
    value: PropertyValue,
) -> Result<(), ModelError> {
    match value {
        PropertyValue::Variant {
            value,
            dynamic_type: None,
        } => model.set_variant(node, name, value),
        PropertyValue::Variant {
            value,
            dynamic_type: Some(ty),
        } => model.set_dynamic_variant(node, name, &ty, value),
        PropertyValue::Binding(expr) => model.set_binding(node, name, &expr),
        PropertyValue::SignalHandler(src) => model.set_signal_handler(node, name, &src),
        PropertyValue::SignalDeclaration(sig) => model.declare_signal(node, name, &sig),
        PropertyValue::Node(_) | PropertyValue::NodeList(_) => Ok(()),
    }
}

/// Container-valued members of an object: property name, kind, objects in
/// document order. Bare children collapse into the default property.
pub(crate) fn collect_containers(object: &ObjectAst) -> Vec<(String, ContainerKind, Vec<&ObjectAst>)> {
    let mut out: Vec<(String, ContainerKind, Vec<&ObjectAst>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for member in &object.members {
        let (name, kind, objs): (&str, ContainerKind, Vec<&ObjectAst>) = match member {
            MemberAst::ObjectProperty { name, object, .. } => {
                (name, ContainerKind::Singular, vec![object])
            }
            MemberAst::ArrayProperty { name, objects, .. } => {
                (name, ContainerKind::List, objects.iter().collect())
            }
            MemberAst::Child(child) => (DEFAULT_PROPERTY, ContainerKind::List, vec![child]),
            _ => continue,
        };
        match index.get(name) {
            Some(&i) => out[i].2.extend(objs),
            None => {
                index.insert(name.to_string(), out.len());
                out.push((name.to_string(), kind, objs));
            }
        }
    }
    out
}

/// Pair model nodes with AST objects container by container and record the
/// spans. Used after the rewriter's own edits, where both sides are known to
/// correspond.
fn align_spans(model: &Model, node: NodeIndex, object: &ObjectAst, positions: &mut PositionMap) {
    positions.insert(node, object.span);
    let containers = collect_containers(object);
    for (name, _, objects) in containers {
        let current: Vec<NodeIndex> = match model.property(node, &name) {
            PropertyLookup::NodeList(list) => list.to_vec(),
            PropertyLookup::NodeRef(n) => vec![n],
            _ => continue,
        };
        for (idx, obj) in current.iter().zip(objects.iter()) {
            align_spans(model, *idx, obj, positions);
        }
    }
}

/// Structural document checks shared by load and amend: id validity and
/// uniqueness.
fn validate_ast(doc: &DocumentAst, source: &str) -> Vec<Diagnostic> {
    let mut seen: HashMap<&str, u32> = HashMap::new();
    let mut diagnostics = Vec::new();
    let mut stack: Vec<&ObjectAst> = vec![&doc.root];
    while let Some(object) = stack.pop() {
        for member in &object.members {
            match member {
                MemberAst::Id { value, span } => {
                    let (line, column) =
                        vdoc_model::diagnostics::line_column(source, span.start);
                    if let Err(err) = validate_id(value) {
                        diagnostics.push(Diagnostic::error(line, column, err.to_string()));
                    }
                    let count = seen.entry(value).or_insert(0);
                    *count += 1;
                    if *count == 2 {
                        diagnostics.push(Diagnostic::error(
                            line,
                            column,
                            format!("duplicate id `{value}`"),
                        ));
                    }
                }
                MemberAst::ObjectProperty { object, .. } => stack.push(object),
                MemberAst::ArrayProperty { objects, .. } => stack.extend(objects.iter()),
                MemberAst::Child(child) => stack.push(child),
                _ => {}
            }
        }
    }
    diagnostics
}

/// Every id the document declares, with the type it is declared on.
fn collect_ids(root: &ObjectAst) -> HashMap<String, String> {
    let mut out = HashMap::new();
    let mut stack: Vec<&ObjectAst> = vec![root];
    while let Some(object) = stack.pop() {
        if let Some(id) = object.id() {
            out.insert(id.to_string(), object.type_name.clone());
        }
        for member in &object.members {
            match member {
                MemberAst::ObjectProperty { object, .. } => stack.push(object),
                MemberAst::ArrayProperty { objects, .. } => stack.extend(objects.iter()),
                MemberAst::Child(child) => stack.push(child),
                _ => {}
            }
        }
    }
    out
}

// ─── Text helpers ────────────────────────────────────────────────────────

/// Indent depth of the line holding `offset`, in units of four spaces.
fn depth_at(text: &str, offset: usize) -> usize {
    let line_start = text[..offset].rfind('\n').map(|p| p + 1).unwrap_or(0);
    let ws = text[line_start..offset]
        .chars()
        .take_while(|&c| c == ' ')
        .count();
    ws / INDENT.len()
}

/// 0-based line number of `offset`.
fn line_of(text: &str, offset: usize) -> usize {
    text[..offset.min(text.len())]
        .bytes()
        .filter(|&b| b == b'\n')
        .count()
}

/// Widen a span backwards over the indentation and the preceding newline,
/// so deleting it removes the whole line slot.
fn widen_to_line(text: &str, span: Span) -> Span {
    let bytes = text.as_bytes();
    let mut start = span.start;
    while start > 0 && (bytes[start - 1] == b' ' || bytes[start - 1] == b'\t') {
        start -= 1;
    }
    if start > 0 && bytes[start - 1] == b'\n' {
        start -= 1;
    }
    Span::new(start, span.end)
}

// ─── Amend scheduling ────────────────────────────────────────────────────

/// Coalescing debounce for text updates, driven by the host loop: each
/// schedule supersedes the previous one and restarts the countdown; `fire`
/// applies the latest text once the countdown reaches zero.
#[derive(Debug)]
pub struct AmendScheduler {
    delay: u32,
    countdown: u32,
    pending: Option<String>,
}

impl AmendScheduler {
    pub fn new(delay: u32) -> Self {
        Self {
            delay,
            countdown: 0,
            pending: None,
        }
    }

    pub fn schedule(&mut self, text: impl Into<String>) {
        self.pending = Some(text.into());
        self.countdown = self.delay;
    }

    /// Advance one host tick.
    pub fn tick(&mut self) {
        if self.pending.is_some() {
            self.countdown = self.countdown.saturating_sub(1);
        }
    }

    pub fn due(&self) -> bool {
        self.pending.is_some() && self.countdown == 0
    }

    /// Apply the pending text if due. Returns whether an amend ran.
    pub fn fire(&mut self, rewriter: &mut Rewriter) -> Result<bool, RewriterError> {
        if !self.due() {
            return Ok(false);
        }
        if let Some(text) = self.pending.take() {
            rewriter.amend(&text)?;
            return Ok(true);
        }
        Ok(false)
    }
}
