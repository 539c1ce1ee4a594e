//! Integration tests: text → model amending.
//!
//! An amend re-parses edited text and diffs it into the live model with
//! targeted mutations: survivors keep their indices, new nodes produce one
//! creation event each, and problems degrade or abort per the policy.

use vdoc_model::{ChangeEvent, VariantValue};
use vdoc_rewriter::{Rewriter, RewriterError, RewriterState, UpdatePolicy};

fn make_rewriter() -> Rewriter {
    let input = include_str!("fixtures/minimal.vdl");
    Rewriter::from_text(input, UpdatePolicy::Validate).unwrap()
}

#[test]
fn edited_property_survives_as_targeted_change() {
    let mut rewriter = make_rewriter();
    let box_node = rewriter.model().node_for_id("box").unwrap();
    rewriter.take_events();

    let edited = rewriter.text().replace("width: 100", "width: 160");
    rewriter.amend(&edited).unwrap();

    // Same handle, new value.
    assert_eq!(rewriter.model().node_for_id("box"), Some(box_node));
    assert_eq!(
        rewriter.model().property(box_node, "width").as_variant(),
        Some(&VariantValue::Int(160))
    );

    let events = rewriter.take_events();
    assert!(events.iter().all(|e| !matches!(
        e,
        ChangeEvent::NodeRemoved { .. } | ChangeEvent::NodeCreated(_)
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        ChangeEvent::PropertyChanged { node, name } if *node == box_node && name == "width"
    )));
}

#[test]
fn reformat_only_edit_changes_nothing_in_the_model() {
    let mut rewriter = make_rewriter();
    let box_node = rewriter.model().node_for_id("box").unwrap();
    rewriter.take_events();

    let edited = rewriter.text().replace("width: 100", "width:     100");
    rewriter.amend(&edited).unwrap();

    assert!(rewriter.take_events().is_empty());
    assert_eq!(rewriter.model().node_for_id("box"), Some(box_node));
    assert!(rewriter.text().contains("width:     100"));
}

#[test]
fn typed_node_creates_exactly_one_node() {
    let mut rewriter = make_rewriter();
    rewriter.take_events();

    let edited = rewriter.text().replace(
        "    Rectangle {",
        "    Text {\n        text: \"new\"\n    }\n\n    Rectangle {",
    );
    rewriter.amend(&edited).unwrap();

    let events = rewriter.take_events();
    let created: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ChangeEvent::NodeCreated(n) => Some(*n),
            _ => None,
        })
        .collect();
    assert_eq!(created.len(), 1);
    assert!(
        events
            .iter()
            .all(|e| !matches!(e, ChangeEvent::NodeRemoved { .. }))
    );
    // Untouched siblings see no property churn; only the insertion itself
    // writes properties.
    assert!(events.iter().all(|e| match e {
        ChangeEvent::PropertyChanged { node, .. } => *node == created[0],
        _ => true,
    }));
    let root = rewriter.model().root();
    assert_eq!(rewriter.model().direct_sub_nodes(root).len(), 2);
}

#[test]
fn deleted_node_is_destroyed() {
    let input = include_str!("fixtures/login_screen.vdl");
    let mut rewriter = Rewriter::from_text(input, UpdatePolicy::Validate).unwrap();
    let title = rewriter.model().node_for_id("title").unwrap();
    rewriter.take_events();

    let edited = input.replace(
        "        Text {\n            id: title\n            text: \"Sign in\"\n            font.pixelSize: 24\n        }\n\n",
        "",
    );
    assert_ne!(edited, input, "fixture edit failed to match");
    rewriter.amend(&edited).unwrap();

    assert!(!rewriter.model().contains(title));
    assert!(rewriter.model().node_for_id("emailField").is_some());
}

#[test]
fn moved_node_is_reparented_not_recreated() {
    let input = "\
Item {
    id: top

    Item {
        id: left
        Rectangle { id: box }
    }

    Item {
        id: right
    }
}
";
    let moved = "\
Item {
    id: top

    Item {
        id: left
    }

    Item {
        id: right
        Rectangle { id: box }
    }
}
";
    let mut rewriter = Rewriter::from_text(input, UpdatePolicy::Validate).unwrap();
    let box_node = rewriter.model().node_for_id("box").unwrap();
    let right = rewriter.model().node_for_id("right").unwrap();
    rewriter.take_events();

    rewriter.amend(moved).unwrap();

    assert_eq!(rewriter.model().node_for_id("box"), Some(box_node));
    assert_eq!(
        rewriter.model().parent_of(box_node).map(|(p, _)| p),
        Some(right)
    );
    let events = rewriter.take_events();
    assert!(
        events
            .iter()
            .all(|e| !matches!(e, ChangeEvent::NodeCreated(_)))
    );
}

#[test]
fn id_less_nodes_match_by_type_and_position() {
    let input = "Item {\n    Rectangle { width: 10 }\n    Rectangle { width: 20 }\n}\n";
    let mut rewriter = Rewriter::from_text(input, UpdatePolicy::Validate).unwrap();
    let root = rewriter.model().root();
    let children = rewriter.model().direct_sub_nodes(root);
    rewriter.take_events();

    let edited = input.replace("width: 20", "width: 25");
    rewriter.amend(&edited).unwrap();

    assert_eq!(rewriter.model().direct_sub_nodes(root), children);
    assert_eq!(
        rewriter.model().property(children[1], "width").as_variant(),
        Some(&VariantValue::Int(25))
    );
}

#[test]
fn parse_error_enters_error_state_and_keeps_the_model() {
    let mut rewriter = make_rewriter();
    let box_node = rewriter.model().node_for_id("box").unwrap();
    let good_text = rewriter.text().to_string();

    let broken = good_text.replace('}', "");
    assert!(rewriter.amend(&broken).is_err());

    assert_eq!(rewriter.state(), RewriterState::Error);
    assert!(!rewriter.diagnostics().is_empty());
    assert_eq!(rewriter.text(), good_text);
    assert!(rewriter.model().contains(box_node));

    // Mutations are refused until the error clears.
    assert!(matches!(
        rewriter.apply(vdoc_rewriter::ModelMutation::SetVariant {
            node: box_node,
            name: "width".into(),
            value: VariantValue::Int(1),
        }),
        Err(RewriterError::ErrorState)
    ));

    rewriter.reset_to_last_correct();
    assert_eq!(rewriter.state(), RewriterState::Idle);
    assert!(rewriter.diagnostics().is_empty());
}

#[test]
fn validate_policy_rejects_duplicate_ids() {
    let mut rewriter = make_rewriter();
    let edited = rewriter
        .text()
        .replace("id: box", "id: top");
    assert!(matches!(
        rewriter.amend(&edited),
        Err(RewriterError::InvalidDocument(_))
    ));
    assert_eq!(rewriter.state(), RewriterState::Error);
}

#[test]
fn amend_policy_degrades_duplicate_ids_to_warnings() {
    let input = include_str!("fixtures/minimal.vdl");
    let mut rewriter = Rewriter::from_text(input, UpdatePolicy::Amend).unwrap();
    let edited = input.replace("id: box", "id: top");

    rewriter.amend(&edited).unwrap();

    assert_eq!(rewriter.state(), RewriterState::Idle);
    assert!(!rewriter.diagnostics().is_empty());
}
