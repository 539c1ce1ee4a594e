//! Integration tests: transaction atomicity.
//!
//! A transaction must defer text flushing and notifications until the
//! outermost commit, fold nested opens into one undo step, and leave no
//! trace when rolled back or dropped.

use vdoc_model::{ChangeEvent, ContainerKind, VariantValue};
use vdoc_rewriter::{ModelMutation, Rewriter, RewriterState, UpdatePolicy};

fn make_rewriter() -> Rewriter {
    let input = include_str!("fixtures/minimal.vdl");
    Rewriter::from_text(input, UpdatePolicy::Validate).unwrap()
}

#[test]
fn transaction_batches_edits_into_one_flush() {
    let mut rewriter = make_rewriter();
    let node = rewriter.model().node_for_id("box").unwrap();
    let before = rewriter.text().to_string();

    let mut tx = rewriter.begin_transaction("resize");
    tx.apply(ModelMutation::SetVariant {
        node,
        name: "width".into(),
        value: VariantValue::Int(300),
    })
    .unwrap();
    tx.apply(ModelMutation::SetVariant {
        node,
        name: "height".into(),
        value: VariantValue::Int(200),
    })
    .unwrap();

    // Buffer untouched and observers silent while open.
    assert_eq!(tx.text(), before);
    assert_eq!(tx.state(), RewriterState::CollectingChanges);
    assert!(tx.take_events().is_empty());

    tx.commit().unwrap();

    assert!(rewriter.text().contains("width: 300"));
    assert!(rewriter.text().contains("height: 200"));
    assert_eq!(rewriter.state(), RewriterState::Idle);
    assert_eq!(rewriter.undo_stack().depth(), 1);
    assert_eq!(rewriter.undo_stack().current_identifier(), Some("resize"));

    let events = rewriter.take_events();
    assert!(
        events
            .iter()
            .any(|e| matches!(e, ChangeEvent::PropertyChanged { name, .. } if name == "width"))
    );
}

#[test]
fn rollback_leaves_no_trace() {
    let mut rewriter = make_rewriter();
    let root = rewriter.model().root();
    let before = rewriter.text().to_string();

    let mut tx = rewriter.begin_transaction("add-child");
    tx.apply(ModelMutation::CreateNode {
        type_name: "Text".into(),
        parent: root,
        property: "data".into(),
        kind: ContainerKind::List,
        index: None,
        properties: vec![],
    })
    .unwrap();
    tx.rollback().unwrap();

    assert_eq!(rewriter.text(), before);
    assert_eq!(rewriter.state(), RewriterState::Idle);
    assert!(!rewriter.can_undo());
    let root = rewriter.model().root();
    assert_eq!(rewriter.model().direct_sub_nodes(root).len(), 1);
}

#[test]
fn drop_without_commit_rolls_back() {
    let mut rewriter = make_rewriter();
    let before = rewriter.text().to_string();
    {
        let mut tx = rewriter.begin_transaction("abandoned");
        let node = tx.model().node_for_id("box").unwrap();
        tx.apply(ModelMutation::SetVariant {
            node,
            name: "width".into(),
            value: VariantValue::Int(999),
        })
        .unwrap();
    }
    assert_eq!(rewriter.text(), before);
    assert!(!rewriter.can_undo());
}

#[test]
fn nested_same_identifier_is_one_undo_step() {
    let mut rewriter = make_rewriter();
    let node = rewriter.model().node_for_id("box").unwrap();

    let mut outer = rewriter.begin_transaction("drag");
    outer
        .apply(ModelMutation::SetVariant {
            node,
            name: "width".into(),
            value: VariantValue::Int(110),
        })
        .unwrap();
    {
        let mut inner = outer.begin_transaction("drag");
        inner
            .apply(ModelMutation::SetVariant {
                node,
                name: "width".into(),
                value: VariantValue::Int(120),
            })
            .unwrap();
        inner.commit().unwrap();
    }
    // Still open: the inner commit must not have flushed.
    assert!(!outer.text().contains("120"));
    outer.commit().unwrap();

    assert!(rewriter.text().contains("width: 120"));
    assert_eq!(rewriter.undo_stack().depth(), 1);

    rewriter.undo().unwrap();
    assert!(rewriter.text().contains("width: 100"));
}

#[test]
fn inner_rollback_poisons_the_batch() {
    let mut rewriter = make_rewriter();
    let node = rewriter.model().node_for_id("box").unwrap();
    let before = rewriter.text().to_string();

    let mut outer = rewriter.begin_transaction("combined");
    outer
        .apply(ModelMutation::SetVariant {
            node,
            name: "width".into(),
            value: VariantValue::Int(1),
        })
        .unwrap();
    {
        let mut inner = outer.begin_transaction("combined");
        inner
            .apply(ModelMutation::SetVariant {
                node,
                name: "height".into(),
                value: VariantValue::Int(2),
            })
            .unwrap();
        inner.rollback().unwrap();
    }
    outer.commit().unwrap();

    assert_eq!(rewriter.text(), before);
    assert!(!rewriter.can_undo());
}

#[test]
fn mutation_outside_transaction_is_its_own_step() {
    let mut rewriter = make_rewriter();
    let node = rewriter.model().node_for_id("box").unwrap();

    rewriter
        .apply(ModelMutation::SetVariant {
            node,
            name: "width".into(),
            value: VariantValue::Int(140),
        })
        .unwrap();
    rewriter
        .apply(ModelMutation::SetVariant {
            node,
            name: "width".into(),
            value: VariantValue::Int(150),
        })
        .unwrap();

    assert_eq!(rewriter.undo_stack().depth(), 2);
}
