//! The stylesheet merger.
//!
//! Layers a style document onto a template document. Nodes are matched by
//! shared id: for every style node whose id also exists in the template, a
//! replacement node is built from the style side and swapped into the
//! template node's slot, then the style's properties are synchronized onto
//! it. The template wins wherever it already expresses intent (expressive
//! bindings, explicit positions, state entries) and the style fills in the
//! rest.
//!
//! All template writes go through the template's [`Rewriter`], so the merged
//! document text stays in sync and every step lands on the undo stack. Each
//! per-node step runs in its own transaction: a failing step rolls itself
//! back, the node is skipped and the queue moves on.

use crate::error::MergeStepError;
use std::collections::{HashMap, HashSet};
use vdoc_model::metadata::NodeMetadata;
use vdoc_model::{
    ContainerKind, DEFAULT_PROPERTY, Model, NodeIndex, Property, PropertyLookup, PropertyValue,
    TypeName, VariantValue, binding_is_literal, fresh_id,
};
use vdoc_rewriter::{ModelMutation, Rewriter};

/// Id of the optional options node inside the template. Read for flags, then
/// deleted before merging starts.
pub const OPTIONS_NODE_ID: &str = "stylesheet_merge_options";

/// Base prefix for ids generated by the rename step.
const RENAME_PREFIX: &str = "stylesheet_auto_merge_";

/// Properties dropped from style nodes unless explicitly preserved: a style
/// import must not override a template's text layout.
const TEXT_ALIGNMENT_PROPERTIES: &[&str] = &["horizontalAlignment", "verticalAlignment", "elide"];

// ─── Options and report ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOptions {
    /// Keep `horizontalAlignment`/`verticalAlignment`/`elide` from the style.
    pub preserve_text_alignment: bool,
    /// Let the style's absolute `x`/`y` override the template's layout.
    pub use_stylesheet_positions: bool,
}

/// What a merge run did.
#[derive(Debug, Default)]
pub struct MergeReport {
    /// Ids replaced and synchronized, in processing order.
    pub merged: Vec<String>,
    /// Ids whose replacement failed partway. The committed steps stand.
    pub skipped: Vec<SkippedNode>,
    /// The style replaced the whole template (shared root id).
    pub root_takeover: bool,
}

#[derive(Debug)]
pub struct SkippedNode {
    pub id: String,
    pub error: MergeStepError,
}

// ─── Merger ──────────────────────────────────────────────────────────────

/// Drives a merge of `style` into `template`. Both documents are owned by
/// their rewriters; the style side is only written during preprocessing,
/// everything else reads style and writes template.
pub struct StylesheetMerger<'a, M: NodeMetadata> {
    template: &'a mut Rewriter,
    style: &'a mut Rewriter,
    metadata: &'a M,
    options: MergeOptions,
    /// Template id → generated id freeing the original for its replacement.
    rename: HashMap<String, String>,
    /// Every id claimed in either tree plus every generated id.
    taken: HashSet<String>,
    /// Ids of style nodes eligible for merging.
    style_ids: HashSet<String>,
}

impl<'a, M: NodeMetadata> StylesheetMerger<'a, M> {
    pub fn new(template: &'a mut Rewriter, style: &'a mut Rewriter, metadata: &'a M) -> Self {
        Self {
            template,
            style,
            metadata,
            options: MergeOptions::default(),
            rename: HashMap::new(),
            taken: HashSet::new(),
            style_ids: HashSet::new(),
        }
    }

    /// Override the defaults. An options node in the template still wins.
    pub fn set_options(&mut self, options: MergeOptions) {
        self.options = options;
    }

    pub fn options(&self) -> MergeOptions {
        self.options
    }

    /// The rename table computed by [`StylesheetMerger::setup_id_renaming`].
    pub fn rename_table(&self) -> &HashMap<String, String> {
        &self.rename
    }

    /// Run the full merge.
    pub fn merge(mut self) -> Result<MergeReport, MergeStepError> {
        self.parse_template_options()?;
        self.preprocess_style_sheet()?;
        self.setup_id_renaming();

        let mut report = MergeReport::default();
        if self.try_root_takeover()? {
            report.root_takeover = true;
            return Ok(report);
        }
        self.merge_root_states()?;

        self.style_ids = style_candidates(self.style.model())
            .iter()
            .filter_map(|&n| self.style.model().id_of(n))
            .map(str::to_string)
            .collect();
        for id in self.collect_queue() {
            match self.merge_node(&id) {
                Ok(()) => report.merged.push(id),
                Err(error) => {
                    log::warn!("stylesheet merge: skipping `{id}`: {error}");
                    report.skipped.push(SkippedNode { id, error });
                }
            }
        }
        Ok(report)
    }

    // ─── Step 1: options node ────────────────────────────────────────────

    fn parse_template_options(&mut self) -> Result<(), MergeStepError> {
        let Some(node) = self.template.model().node_for_id(OPTIONS_NODE_ID) else {
            return Ok(());
        };
        if let Some(v) = bool_property(self.template.model(), node, "preserveTextAlignment") {
            self.options.preserve_text_alignment = v;
        }
        if let Some(v) = bool_property(self.template.model(), node, "useStyleSheetPositions") {
            self.options.use_stylesheet_positions = v;
        }
        let mut txn = self.template.begin_transaction("stylesheetMergeOptions");
        txn.apply(ModelMutation::DestroyNode { node })?;
        txn.commit()?;
        Ok(())
    }

    // ─── Step 2: style-tree preprocessing ────────────────────────────────

    /// Rebuild template-equivalent hierarchy inside the flat style document:
    /// a direct style child whose template counterpart sits under another
    /// shared-id node is reparented under the style-side parent, with its
    /// position converted into that parent's local frame and its sibling
    /// index matched to the template.
    fn preprocess_style_sheet(&mut self) -> Result<(), MergeStepError> {
        let roots: Vec<String> = {
            let style = self.style.model();
            style
                .direct_sub_nodes(style.root())
                .iter()
                .filter_map(|&n| style.id_of(n))
                .map(str::to_string)
                .collect()
        };
        if roots.is_empty() {
            return Ok(());
        }

        let mut txn = self.style.begin_transaction("stylesheetMergePreprocess");
        for id in roots {
            let Some(style_node) = txn.model().node_for_id(&id) else {
                continue;
            };
            let tpl = self.template.model();
            let Some(template_node) = tpl.node_for_id(&id) else {
                continue;
            };
            let Some((template_parent, _)) = tpl.parent_of(template_node) else {
                continue;
            };
            if template_parent == tpl.root() {
                continue;
            }
            let Some(parent_id) = tpl.id_of(template_parent) else {
                continue;
            };
            let Some(new_parent) = txn.model().node_for_id(parent_id) else {
                continue;
            };
            let index = tpl.index_in_parent(template_node);

            let old_x = numeric(txn.model().property(style_node, "x"));
            let old_y = numeric(txn.model().property(style_node, "y"));
            let (dx, dy) = accumulated_position(txn.model(), new_parent);
            txn.apply(ModelMutation::Reparent {
                node: style_node,
                parent: new_parent,
                property: DEFAULT_PROPERTY.to_string(),
                kind: ContainerKind::List,
                index,
            })?;
            if let Some(x) = old_x {
                txn.apply(ModelMutation::SetVariant {
                    node: style_node,
                    name: "x".to_string(),
                    value: numeric_value(x - dx),
                })?;
            }
            if let Some(y) = old_y {
                txn.apply(ModelMutation::SetVariant {
                    node: style_node,
                    name: "y".to_string(),
                    value: numeric_value(y - dy),
                })?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    // ─── Step 3: id-renaming table ───────────────────────────────────────

    /// Assign every template id a fresh `stylesheet_auto_merge_<id><n>` id,
    /// colliding against both trees and all prior assignments. The table is
    /// consulted when a replacement claims an original id: the surviving
    /// original is renamed, not destroyed in place.
    pub fn setup_id_renaming(&mut self) {
        let template = self.template.model();
        let style = self.style.model();
        self.taken = template
            .node_indices()
            .filter_map(|n| template.id_of(n))
            .chain(style.node_indices().filter_map(|n| style.id_of(n)))
            .map(str::to_string)
            .collect();
        let ids: Vec<String> = template
            .node_indices()
            .filter_map(|n| template.id_of(n))
            .map(str::to_string)
            .collect();
        for id in ids {
            let fresh = fresh_id(&format!("{RENAME_PREFIX}{id}"), &self.taken);
            self.taken.insert(fresh.clone());
            self.rename.insert(id, fresh);
        }
    }

    // ─── Step 4: root takeover ───────────────────────────────────────────

    /// When the style defines the template root's id, the style document
    /// replaces the template wholesale. The resulting root keeps the
    /// template root's id.
    fn try_root_takeover(&mut self) -> Result<bool, MergeStepError> {
        let root_id = {
            let tpl = self.template.model();
            match tpl.id_of(tpl.root()) {
                Some(id) => id.to_string(),
                None => return Ok(false),
            }
        };
        if self.style.model().node_for_id(&root_id).is_none() {
            return Ok(false);
        }

        let style_text = self.style.text().to_string();
        self.template.amend(&style_text)?;

        let root = self.template.model().root();
        if self.template.model().id_of(root) != Some(root_id.as_str()) {
            if let Some(holder) = self.template.model().node_for_id(&root_id) {
                let fresh = fresh_id(&format!("{RENAME_PREFIX}{root_id}"), &self.taken);
                self.taken.insert(fresh.clone());
                self.template.apply(ModelMutation::SetId {
                    node: holder,
                    id: fresh,
                })?;
            }
            self.template.apply(ModelMutation::SetId {
                node: root,
                id: root_id,
            })?;
        }
        Ok(true)
    }

    // ─── Step 5: root state merging ──────────────────────────────────────

    fn merge_root_states(&mut self) -> Result<(), MergeStepError> {
        let style_root = self.style.model().root();
        if self
            .style
            .model()
            .property(style_root, "states")
            .as_nodes()
            .is_empty()
        {
            return Ok(());
        }
        let template_root = self.template.model().root();
        let kept = HashSet::new();
        let mut txn = self.template.begin_transaction("stylesheetMergeStates");
        let mut ctx = CopyCtx {
            style: self.style.model(),
            metadata: self.metadata,
            options: self.options,
            kept_alignment: &kept,
            rename: &mut self.rename,
            taken: &mut self.taken,
            skip_duplicates: false,
        };
        merge_states(&mut txn, &mut ctx, template_root, style_root)?;
        txn.commit()?;
        Ok(())
    }

    // ─── Step 6: per-node replacement queue ──────────────────────────────

    /// Ids merged per node, in template traversal order. The style root only
    /// qualifies when it has no children of its own.
    fn collect_queue(&self) -> Vec<String> {
        let tpl = self.template.model();
        tpl.all_sub_nodes(tpl.root())
            .iter()
            .filter_map(|&n| tpl.id_of(n))
            .filter(|id| self.style_ids.contains(*id))
            .map(str::to_string)
            .collect()
    }

    fn merge_node(&mut self, id: &str) -> Result<(), MergeStepError> {
        let style_node = self
            .style
            .model()
            .node_for_id(id)
            .ok_or_else(|| MergeStepError::MissingStyleNode(id.to_string()))?;

        let (template_node, info, original_x, original_y, kept_alignment, original_bindings, top_level) = {
            let tpl = self.template.model();
            let template_node = tpl
                .node_for_id(id)
                .ok_or_else(|| MergeStepError::MissingTemplateNode(id.to_string()))?;
            let (parent, property) = tpl
                .parent_of(template_node)
                .ok_or_else(|| MergeStepError::Detached(id.to_string()))?;
            let kind = match tpl.property(parent, &property) {
                PropertyLookup::NodeRef(_) => ContainerKind::Singular,
                _ => ContainerKind::List,
            };
            let index = match kind {
                ContainerKind::List => tpl.index_in_parent(template_node),
                ContainerKind::Singular => None,
            };
            let kept: HashSet<String> = TEXT_ALIGNMENT_PROPERTIES
                .iter()
                .filter(|&&name| tpl.property(template_node, name).exists())
                .map(|&name| name.to_string())
                .collect();
            let bindings: HashMap<String, String> = tpl
                .property_names(template_node)
                .into_iter()
                .filter_map(|name| match tpl.property(template_node, &name) {
                    PropertyLookup::Binding(expr) => Some((name, expr.to_string())),
                    _ => None,
                })
                .collect();
            let top_level = tpl
                .id_of(parent)
                .is_none_or(|pid| !self.style_ids.contains(pid));
            (
                template_node,
                ReparentInfo {
                    parent,
                    property,
                    kind,
                    index,
                },
                position_of(tpl, template_node, "x"),
                position_of(tpl, template_node, "y"),
                kept,
                bindings,
                top_level,
            )
        };

        // Build the replacement in the slot ahead of the node it replaces.
        let replacement = {
            let mut txn = self.template.begin_transaction("stylesheetMergeBuild");
            let mut ctx = CopyCtx {
                style: self.style.model(),
                metadata: self.metadata,
                options: self.options,
                kept_alignment: &kept_alignment,
                rename: &mut self.rename,
                taken: &mut self.taken,
                skip_duplicates: false,
            };
            let node = copy_node(
                &mut txn,
                &mut ctx,
                style_node,
                info.parent,
                &info.property,
                info.kind,
                info.index,
            )?;
            txn.commit()?;
            node
        };

        // Swap out the old node.
        {
            let mut txn = self.template.begin_transaction("stylesheetMergeReplace");
            txn.apply(ModelMutation::DestroyNode {
                node: template_node,
            })?;
            txn.commit()?;
        }

        // Synchronize style properties onto the node now holding the id.
        {
            let mut txn = self.template.begin_transaction("stylesheetMergeSync");
            let mut ctx = CopyCtx {
                style: self.style.model(),
                metadata: self.metadata,
                options: self.options,
                kept_alignment: &kept_alignment,
                rename: &mut self.rename,
                taken: &mut self.taken,
                skip_duplicates: true,
            };
            sync_properties(&mut txn, &mut ctx, replacement, style_node, &original_bindings)?;
            txn.commit()?;
        }

        // Restore the original sibling slot.
        if let Some(index) = info.index {
            let mut txn = self.template.begin_transaction("stylesheetMergeOrder");
            if txn.model().index_in_parent(replacement) != Some(index) {
                txn.apply(ModelMutation::MoveToIndex {
                    node: replacement,
                    index,
                })?;
            }
            txn.commit()?;
        }

        // Position cleanup: a top-level styled node must not carry the style
        // document's absolute coordinates into a layout-driven template.
        if top_level && !self.options.use_stylesheet_positions {
            let mut txn = self.template.begin_transaction("stylesheetMergePositions");
            for (name, original) in [("x", original_x), ("y", original_y)] {
                match original {
                    Some(PositionValue::Literal(value)) => {
                        txn.apply(ModelMutation::SetVariant {
                            node: replacement,
                            name: name.to_string(),
                            value,
                        })?;
                    }
                    Some(PositionValue::Expression(expression)) => {
                        txn.apply(ModelMutation::SetBinding {
                            node: replacement,
                            name: name.to_string(),
                            expression,
                        })?;
                    }
                    None => {
                        if txn.model().property(replacement, name).exists() {
                            txn.apply(ModelMutation::RemoveProperty {
                                node: replacement,
                                name: name.to_string(),
                            })?;
                        }
                    }
                }
            }
            txn.commit()?;
        }
        Ok(())
    }
}

/// Where a replaced node hangs in the template.
struct ReparentInfo {
    parent: NodeIndex,
    property: String,
    kind: ContainerKind,
    /// Sibling slot within a NodeList container. `None` for singular slots.
    index: Option<usize>,
}

// ─── Node copying ────────────────────────────────────────────────────────

/// Shared state for the recursive copy routines. The style model is read
/// only; all writes go to the template rewriter passed alongside.
struct CopyCtx<'a, M> {
    style: &'a Model,
    metadata: &'a M,
    options: MergeOptions,
    /// Alignment properties the replaced template node already defined.
    kept_alignment: &'a HashSet<String>,
    rename: &'a mut HashMap<String, String>,
    taken: &'a mut HashSet<String>,
    /// Skip style children whose id already exists in the template. Off
    /// while building a replacement, on while re-syncing an existing node.
    skip_duplicates: bool,
}

impl<M: NodeMetadata> CopyCtx<'_, M> {
    fn skips(&self, template: &Model, child: NodeIndex) -> bool {
        self.skip_duplicates
            && self
                .style
                .id_of(child)
                .is_some_and(|id| template.node_for_id(id).is_some())
    }

    fn copyable(&self, type_name: TypeName, name: &str) -> bool {
        if !self.metadata.has_property(type_name, name) {
            return false;
        }
        if TEXT_ALIGNMENT_PROPERTIES.contains(&name) {
            return self.options.preserve_text_alignment || self.kept_alignment.contains(name);
        }
        true
    }

    fn renamed(&mut self, id: &str) -> String {
        if let Some(existing) = self.rename.get(id) {
            return existing.clone();
        }
        let fresh = fresh_id(&format!("{RENAME_PREFIX}{id}"), self.taken);
        self.taken.insert(fresh.clone());
        self.rename.insert(id.to_string(), fresh.clone());
        fresh
    }
}

/// Deep-copy a style node into the template under `parent`. Variant
/// properties are filtered through the metadata service and the alignment
/// rule; auxiliary data, bindings, the id, owned children and states follow.
fn copy_node<M: NodeMetadata>(
    template: &mut Rewriter,
    ctx: &mut CopyCtx<'_, M>,
    style_node: NodeIndex,
    parent: NodeIndex,
    property: &str,
    kind: ContainerKind,
    index: Option<usize>,
) -> Result<NodeIndex, MergeStepError> {
    let style = ctx.style;
    let data = style
        .node(style_node)
        .ok_or_else(|| MergeStepError::MissingStyleNode(format!("{style_node:?}")))?;
    let type_name = data.type_name;

    let mut initial = Vec::new();
    for p in data.properties() {
        let PropertyValue::Variant {
            value,
            dynamic_type,
        } = &p.value
        else {
            continue;
        };
        if !ctx.copyable(type_name, &p.name) {
            continue;
        }
        initial.push(Property::new(
            p.name.clone(),
            PropertyValue::Variant {
                value: value.clone(),
                dynamic_type: dynamic_type.clone(),
            },
        ));
    }
    let created = template.create_node(type_name.as_str(), parent, property, kind, index, initial)?;

    if let Some(source) = data.node_source() {
        template.apply(ModelMutation::SetNodeSource {
            node: created,
            source: source.to_string(),
        })?;
    }
    for (key, value) in data.auxiliary_data() {
        template.apply(ModelMutation::SetAuxiliary {
            node: created,
            key: key.clone(),
            value: value.clone(),
        })?;
    }
    for p in data.properties() {
        match &p.value {
            PropertyValue::Binding(expression) => {
                template.apply(ModelMutation::SetBinding {
                    node: created,
                    name: p.name.clone(),
                    expression: expression.clone(),
                })?;
            }
            PropertyValue::SignalHandler(source) => {
                template.apply(ModelMutation::SetSignalHandler {
                    node: created,
                    name: p.name.clone(),
                    source: source.clone(),
                })?;
            }
            _ => {}
        }
    }
    if let Some(id) = data.id() {
        sync_id(template, ctx, created, id)?;
    }
    for p in data.properties() {
        match &p.value {
            PropertyValue::Node(child) => {
                if !ctx.skips(template.model(), *child) {
                    copy_node(
                        template,
                        ctx,
                        *child,
                        created,
                        &p.name,
                        ContainerKind::Singular,
                        None,
                    )?;
                }
            }
            PropertyValue::NodeList(children) if p.name != "states" => {
                for &child in children {
                    if !ctx.skips(template.model(), child) {
                        copy_node(
                            template,
                            ctx,
                            child,
                            created,
                            &p.name,
                            ContainerKind::List,
                            None,
                        )?;
                    }
                }
            }
            _ => {}
        }
    }
    merge_states(template, ctx, created, style_node)?;
    Ok(created)
}

/// Give `created` the style node's id. A template node currently holding it
/// is renamed first via the rename table, freeing the id; the renamed
/// original stays around only until its replacement step destroys it.
fn sync_id<M: NodeMetadata>(
    template: &mut Rewriter,
    ctx: &mut CopyCtx<'_, M>,
    created: NodeIndex,
    id: &str,
) -> Result<(), MergeStepError> {
    if let Some(holder) = template.model().node_for_id(id)
        && holder != created
    {
        let renamed = ctx.renamed(id);
        template.apply(ModelMutation::SetId {
            node: holder,
            id: renamed,
        })?;
    }
    template.apply(ModelMutation::SetId {
        node: created,
        id: id.to_string(),
    })?;
    Ok(())
}

// ─── State merging ───────────────────────────────────────────────────────

/// Merge `states` lists by state name. A style state missing from the
/// template is copied whole; a matching one only fills `when`/`extend` when
/// absent and unions its change-set entries keyed by (type, target), never
/// overwriting a template-defined entry.
fn merge_states<M: NodeMetadata>(
    template: &mut Rewriter,
    ctx: &mut CopyCtx<'_, M>,
    template_node: NodeIndex,
    style_node: NodeIndex,
) -> Result<(), MergeStepError> {
    let style = ctx.style;
    for style_state in style.property(style_node, "states").as_nodes() {
        let name = state_name(style, style_state);
        let existing = template
            .model()
            .property(template_node, "states")
            .as_nodes()
            .into_iter()
            .find(|&s| state_name(template.model(), s) == name);
        let Some(existing) = existing else {
            copy_node(
                template,
                ctx,
                style_state,
                template_node,
                "states",
                ContainerKind::List,
                None,
            )?;
            continue;
        };

        for key in ["when", "extend"] {
            if template.model().property(existing, key).exists() {
                continue;
            }
            match style.property(style_state, key) {
                PropertyLookup::Binding(expr) => {
                    let expression = expr.to_string();
                    template.apply(ModelMutation::SetBinding {
                        node: existing,
                        name: key.to_string(),
                        expression,
                    })?;
                }
                PropertyLookup::Variant { value, .. } => {
                    let value = value.clone();
                    template.apply(ModelMutation::SetVariant {
                        node: existing,
                        name: key.to_string(),
                        value,
                    })?;
                }
                _ => {}
            }
        }

        for style_change in style.property(style_state, DEFAULT_PROPERTY).as_nodes() {
            let key = change_key(style, style_change);
            let counterpart = template
                .model()
                .property(existing, DEFAULT_PROPERTY)
                .as_nodes()
                .into_iter()
                .find(|&c| change_key(template.model(), c) == key);
            let Some(counterpart) = counterpart else {
                copy_node(
                    template,
                    ctx,
                    style_change,
                    existing,
                    DEFAULT_PROPERTY,
                    ContainerKind::List,
                    None,
                )?;
                continue;
            };
            union_change_entry(template, style, counterpart, style_change)?;
        }
    }
    Ok(())
}

/// Add the style entry's properties to a matching template change-set
/// entry. Template-defined names are never overwritten.
fn union_change_entry(
    template: &mut Rewriter,
    style: &Model,
    counterpart: NodeIndex,
    style_change: NodeIndex,
) -> Result<(), MergeStepError> {
    let Some(data) = style.node(style_change) else {
        return Ok(());
    };
    for p in data.properties() {
        if template.model().property(counterpart, &p.name).exists() {
            continue;
        }
        match &p.value {
            PropertyValue::Variant { value, .. } => {
                template.apply(ModelMutation::SetVariant {
                    node: counterpart,
                    name: p.name.clone(),
                    value: value.clone(),
                })?;
            }
            PropertyValue::Binding(expression) => {
                template.apply(ModelMutation::SetBinding {
                    node: counterpart,
                    name: p.name.clone(),
                    expression: expression.clone(),
                })?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn state_name(model: &Model, state: NodeIndex) -> Option<String> {
    match model.property(state, "name") {
        PropertyLookup::Variant {
            value: VariantValue::Str(s),
            ..
        } => Some(s.clone()),
        _ => None,
    }
}

/// Change-set entries match on (type, target expression).
fn change_key(model: &Model, change: NodeIndex) -> (String, String) {
    let type_name = model
        .node(change)
        .map(|d| d.type_name.as_str().to_string())
        .unwrap_or_default();
    let target = match model.property(change, "target") {
        PropertyLookup::Binding(expr) => expr.trim().to_string(),
        PropertyLookup::Variant { value, .. } => value.to_source(),
        _ => String::new(),
    };
    (type_name, target)
}

// ─── Property synchronization (step 6c) ──────────────────────────────────

/// Re-sync a style node's properties onto the template node holding its id.
/// `original_bindings` carries the binding expressions the replaced template
/// node declared: a literal-only one yields to the style's variant value,
/// an expressive one is restored over it. Child copies skip ids that
/// already exist in the template.
fn sync_properties<M: NodeMetadata>(
    template: &mut Rewriter,
    ctx: &mut CopyCtx<'_, M>,
    template_node: NodeIndex,
    style_node: NodeIndex,
    original_bindings: &HashMap<String, String>,
) -> Result<(), MergeStepError> {
    let style = ctx.style;
    let Some(data) = style.node(style_node) else {
        return Ok(());
    };
    let type_name = data.type_name;
    for p in data.properties() {
        match &p.value {
            PropertyValue::Variant { value, .. } => {
                if !ctx.copyable(type_name, &p.name) {
                    continue;
                }
                match original_bindings.get(&p.name) {
                    Some(expression) if !binding_is_literal(expression) => {
                        template.apply(ModelMutation::SetBinding {
                            node: template_node,
                            name: p.name.clone(),
                            expression: expression.clone(),
                        })?;
                    }
                    _ => {
                        template.apply(ModelMutation::SetVariant {
                            node: template_node,
                            name: p.name.clone(),
                            value: value.clone(),
                        })?;
                    }
                }
            }
            PropertyValue::Binding(expression) => {
                template.apply(ModelMutation::SetBinding {
                    node: template_node,
                    name: p.name.clone(),
                    expression: expression.clone(),
                })?;
            }
            PropertyValue::Node(child) => {
                if !ctx.skips(template.model(), *child) {
                    copy_node(
                        template,
                        ctx,
                        *child,
                        template_node,
                        &p.name,
                        ContainerKind::Singular,
                        None,
                    )?;
                }
            }
            PropertyValue::NodeList(children) if p.name != "states" => {
                for &child in children {
                    if !ctx.skips(template.model(), child) {
                        copy_node(
                            template,
                            ctx,
                            child,
                            template_node,
                            &p.name,
                            ContainerKind::List,
                            None,
                        )?;
                    }
                }
            }
            _ => {}
        }
    }
    merge_states(template, ctx, template_node, style_node)?;
    Ok(())
}

// ─── Positions ───────────────────────────────────────────────────────────

/// A captured `x`/`y` value, restorable after replacement.
enum PositionValue {
    Literal(VariantValue),
    Expression(String),
}

fn position_of(model: &Model, node: NodeIndex, name: &str) -> Option<PositionValue> {
    match model.property(node, name) {
        PropertyLookup::Variant { value, .. } => Some(PositionValue::Literal(value.clone())),
        PropertyLookup::Binding(expr) => Some(PositionValue::Expression(expr.to_string())),
        _ => None,
    }
}

fn numeric(lookup: PropertyLookup<'_>) -> Option<f64> {
    match lookup.as_variant()? {
        VariantValue::Int(i) => Some(*i as f64),
        VariantValue::Double(d) => Some(*d),
        _ => None,
    }
}

fn numeric_value(v: f64) -> VariantValue {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        VariantValue::Int(v as i64)
    } else {
        VariantValue::Double(v)
    }
}

/// Sum of `x`/`y` along the ownership chain from `node` up to the root,
/// root excluded.
fn accumulated_position(model: &Model, node: NodeIndex) -> (f64, f64) {
    let mut x = 0.0;
    let mut y = 0.0;
    let mut current = Some(node);
    while let Some(n) = current {
        if n == model.root() {
            break;
        }
        x += numeric(model.property(n, "x")).unwrap_or(0.0);
        y += numeric(model.property(n, "y")).unwrap_or(0.0);
        current = model.parent_of(n).map(|(p, _)| p);
    }
    (x, y)
}

fn bool_property(model: &Model, node: NodeIndex, name: &str) -> Option<bool> {
    match model.property(node, name) {
        PropertyLookup::Variant {
            value: VariantValue::Bool(b),
            ..
        } => Some(*b),
        _ => None,
    }
}

/// The style nodes eligible for merging: everything below the root, or the
/// root itself when it is childless.
fn style_candidates(style: &Model) -> Vec<NodeIndex> {
    let subs = style.all_sub_nodes(style.root());
    if subs.is_empty() {
        vec![style.root()]
    } else {
        subs
    }
}
