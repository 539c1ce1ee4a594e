//! Integration tests: snapshot undo/redo.
//!
//! Undo and redo replace the buffer with a recorded snapshot and re-amend,
//! so surviving nodes keep their indices across the round trip.

use vdoc_model::{ContainerKind, VariantValue};
use vdoc_rewriter::{ModelMutation, Rewriter, RewriterError, UpdatePolicy};

fn make_rewriter() -> Rewriter {
    let input = include_str!("fixtures/minimal.vdl");
    Rewriter::from_text(input, UpdatePolicy::Validate).unwrap()
}

#[test]
fn undo_restores_previous_state() {
    let mut rewriter = make_rewriter();
    let node = rewriter.model().node_for_id("box").unwrap();
    let original = rewriter.text().to_string();

    rewriter
        .apply(ModelMutation::SetVariant {
            node,
            name: "width".into(),
            value: VariantValue::Int(250),
        })
        .unwrap();
    assert!(rewriter.text().contains("width: 250"));

    rewriter.undo().unwrap();
    assert_eq!(rewriter.text(), original);
    let node = rewriter.model().node_for_id("box").unwrap();
    assert_eq!(
        rewriter.model().property(node, "width").as_variant(),
        Some(&VariantValue::Int(100))
    );
}

#[test]
fn redo_reapplies_the_change() {
    let mut rewriter = make_rewriter();
    let node = rewriter.model().node_for_id("box").unwrap();

    rewriter
        .apply(ModelMutation::SetVariant {
            node,
            name: "width".into(),
            value: VariantValue::Int(250),
        })
        .unwrap();
    rewriter.undo().unwrap();
    assert!(rewriter.can_redo());

    rewriter.redo().unwrap();
    assert!(rewriter.text().contains("width: 250"));
    assert!(!rewriter.can_redo());
    assert!(rewriter.can_undo());
}

#[test]
fn new_action_clears_redo() {
    let mut rewriter = make_rewriter();
    let node = rewriter.model().node_for_id("box").unwrap();

    rewriter
        .apply(ModelMutation::SetVariant {
            node,
            name: "width".into(),
            value: VariantValue::Int(250),
        })
        .unwrap();
    rewriter.undo().unwrap();

    let node = rewriter.model().node_for_id("box").unwrap();
    rewriter
        .apply(ModelMutation::SetVariant {
            node,
            name: "height".into(),
            value: VariantValue::Int(75),
        })
        .unwrap();

    assert!(!rewriter.can_redo());
    assert!(matches!(
        rewriter.redo(),
        Err(RewriterError::NothingToRedo)
    ));
}

#[test]
fn undo_keeps_surviving_node_indices() {
    let mut rewriter = make_rewriter();
    let root = rewriter.model().root();
    let box_node = rewriter.model().node_for_id("box").unwrap();

    rewriter
        .apply(ModelMutation::CreateNode {
            type_name: "Text".into(),
            parent: root,
            property: "data".into(),
            kind: ContainerKind::List,
            index: None,
            properties: vec![],
        })
        .unwrap();
    rewriter.undo().unwrap();

    // The untouched sibling kept its handle through the round trip.
    assert_eq!(rewriter.model().node_for_id("box"), Some(box_node));
    assert_eq!(rewriter.model().direct_sub_nodes(root).len(), 1);
}

#[test]
fn undo_with_empty_stack_errors() {
    let mut rewriter = make_rewriter();
    assert!(matches!(
        rewriter.undo(),
        Err(RewriterError::NothingToUndo)
    ));
}

#[test]
fn undo_chain_walks_all_the_way_back() {
    let mut rewriter = make_rewriter();
    let node = rewriter.model().node_for_id("box").unwrap();
    let original = rewriter.text().to_string();

    for width in [110, 120, 130] {
        rewriter
            .apply(ModelMutation::SetVariant {
                node,
                name: "width".into(),
                value: VariantValue::Int(width),
            })
            .unwrap();
    }
    assert_eq!(rewriter.undo_stack().depth(), 3);

    while rewriter.can_undo() {
        rewriter.undo().unwrap();
    }
    assert_eq!(rewriter.text(), original);
}
