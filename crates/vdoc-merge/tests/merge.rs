//! End-to-end merge scenarios over real documents.

use pretty_assertions::assert_eq;
use vdoc_merge::{MergeOptions, MergeReport, StylesheetMerger};
use vdoc_model::{Model, PermissiveMetadata, PropertyLookup, VariantValue};
use vdoc_rewriter::{Rewriter, UpdatePolicy};

fn rewriter(text: &str) -> Rewriter {
    Rewriter::from_text(text, UpdatePolicy::Amend).unwrap()
}

fn merge(template: &mut Rewriter, style: &mut Rewriter) -> MergeReport {
    let metadata = PermissiveMetadata;
    StylesheetMerger::new(template, style, &metadata)
        .merge()
        .unwrap()
}

fn variant(model: &Model, id: &str, name: &str) -> Option<VariantValue> {
    let node = model.node_for_id(id)?;
    model.property(node, name).as_variant().cloned()
}

const BASIC_TEMPLATE: &str = "\
Item {
    id: window

    Rectangle {
        id: c1
        x: 10
        y: 20
    }
}
";

const BASIC_STYLE: &str = "\
Item {
    Rectangle {
        id: c1
        x: 99
        y: 5
        color: \"red\"
    }
}
";

#[test]
fn style_color_lands_but_template_positions_win() {
    let mut template = rewriter(BASIC_TEMPLATE);
    let mut style = rewriter(BASIC_STYLE);

    let report = merge(&mut template, &mut style);

    assert_eq!(report.merged, vec!["c1".to_string()]);
    assert!(report.skipped.is_empty());
    assert!(!report.root_takeover);

    let model = template.model();
    assert_eq!(
        variant(model, "c1", "color"),
        Some(VariantValue::Str("red".into()))
    );
    assert_eq!(variant(model, "c1", "x"), Some(VariantValue::Int(10)));
    assert_eq!(variant(model, "c1", "y"), Some(VariantValue::Int(20)));
    assert!(template.text().contains("color: \"red\""));
}

#[test]
fn style_positions_are_dropped_when_template_had_none() {
    let mut template = rewriter(
        "Item {\n    id: window\n\n    Rectangle {\n        id: c1\n    }\n}\n",
    );
    let mut style = rewriter(BASIC_STYLE);

    merge(&mut template, &mut style);

    let model = template.model();
    let c1 = model.node_for_id("c1").unwrap();
    assert!(!model.property(c1, "x").exists());
    assert!(!model.property(c1, "y").exists());
    assert_eq!(
        variant(model, "c1", "color"),
        Some(VariantValue::Str("red".into()))
    );
}

#[test]
fn stylesheet_positions_option_keeps_style_coordinates() {
    let mut template = rewriter(BASIC_TEMPLATE);
    let mut style = rewriter(BASIC_STYLE);

    let metadata = PermissiveMetadata;
    let mut merger = StylesheetMerger::new(&mut template, &mut style, &metadata);
    merger.set_options(MergeOptions {
        use_stylesheet_positions: true,
        preserve_text_alignment: false,
    });
    merger.merge().unwrap();

    assert_eq!(
        variant(template.model(), "c1", "x"),
        Some(VariantValue::Int(99))
    );
    assert_eq!(
        variant(template.model(), "c1", "y"),
        Some(VariantValue::Int(5))
    );
}

#[test]
fn collision_renaming_matches_the_generated_pattern() {
    let mut template = rewriter(
        "Item {\n    id: window\n\n    Button {\n        id: button1\n    }\n}\n",
    );
    let mut style = rewriter("Item {\n    Button {\n        id: button1\n    }\n}\n");

    let metadata = PermissiveMetadata;
    let mut merger = StylesheetMerger::new(&mut template, &mut style, &metadata);
    merger.setup_id_renaming();

    let renamed = merger.rename_table().get("button1").unwrap().clone();
    assert!(renamed.starts_with("stylesheet_auto_merge_button1"));
    assert!(renamed.ends_with(|c: char| c.is_ascii_digit()));
    assert_ne!(renamed, "button1");
    assert_ne!(renamed, "window");
}

#[test]
fn shared_root_id_takes_over_the_whole_template() {
    let mut template = rewriter(
        "Item {\n    id: scene\n\n    Rectangle {\n        id: old\n    }\n}\n",
    );
    let mut style = rewriter(
        "Column {\n    id: scene\n\n    Text {\n        id: caption\n        text: \"hi\"\n    }\n}\n",
    );

    let report = merge(&mut template, &mut style);
    assert!(report.root_takeover);

    let model = template.model();
    let root = model.root();
    assert_eq!(model.id_of(root), Some("scene"));
    assert_eq!(model.node(root).unwrap().type_name.as_str(), "Column");
    assert!(model.node_for_id("caption").is_some());
    assert!(model.node_for_id("old").is_none());
}

#[test]
fn merging_twice_converges() {
    let mut template = rewriter(BASIC_TEMPLATE);

    let mut style = rewriter(BASIC_STYLE);
    merge(&mut template, &mut style);
    let once = template.text().to_string();

    let mut style = rewriter(BASIC_STYLE);
    merge(&mut template, &mut style);

    assert_eq!(once, template.text());
}

#[test]
fn options_node_is_parsed_and_consumed() {
    let mut template = rewriter(
        "\
Item {
    id: window

    QtObject {
        id: stylesheet_merge_options
        preserveTextAlignment: true
    }

    Text {
        id: caption
    }
}
",
    );
    let mut style = rewriter(
        "Item {\n    Text {\n        id: caption\n        horizontalAlignment: Text.AlignHCenter\n    }\n}\n",
    );

    merge(&mut template, &mut style);

    let model = template.model();
    assert!(model.node_for_id("stylesheet_merge_options").is_none());
    assert!(!template.text().contains("stylesheet_merge_options"));
    assert_eq!(
        variant(model, "caption", "horizontalAlignment"),
        Some(VariantValue::Enumeration("Text.AlignHCenter".into()))
    );
}

#[test]
fn alignment_properties_drop_without_the_option() {
    let mut template = rewriter(
        "Item {\n    id: window\n\n    Text {\n        id: caption\n    }\n}\n",
    );
    let mut style = rewriter(
        "Item {\n    Text {\n        id: caption\n        horizontalAlignment: Text.AlignHCenter\n        text: \"hi\"\n    }\n}\n",
    );

    merge(&mut template, &mut style);

    let model = template.model();
    let caption = model.node_for_id("caption").unwrap();
    assert!(!model.property(caption, "horizontalAlignment").exists());
    assert_eq!(
        variant(model, "caption", "text"),
        Some(VariantValue::Str("hi".into()))
    );
}

#[test]
fn template_alignment_excuses_the_style_value() {
    // The template already aligned this text, so the style may restyle it.
    let mut template = rewriter(
        "Item {\n    id: window\n\n    Text {\n        id: caption\n        horizontalAlignment: Text.AlignLeft\n    }\n}\n",
    );
    let mut style = rewriter(
        "Item {\n    Text {\n        id: caption\n        horizontalAlignment: Text.AlignHCenter\n    }\n}\n",
    );

    merge(&mut template, &mut style);

    assert_eq!(
        variant(template.model(), "caption", "horizontalAlignment"),
        Some(VariantValue::Enumeration("Text.AlignHCenter".into()))
    );
}

#[test]
fn states_merge_by_name() {
    let mut template = rewriter(
        "\
Item {
    id: window
    states: [
        State {
            name: \"busy\"
            when: loading
        }
    ]
}
",
    );
    let mut style = rewriter(
        "\
Item {
    states: [
        State {
            name: \"busy\"
            extend: \"base\"

            PropertyChanges {
                target: caption
                opacity: 0.5
            }
        },
        State {
            name: \"hidden\"
        }
    ]
}
",
    );

    merge(&mut template, &mut style);

    let model = template.model();
    let states = model.property(model.root(), "states").as_nodes();
    assert_eq!(states.len(), 2);

    let busy = states
        .iter()
        .copied()
        .find(|&s| {
            model.property(s, "name").as_variant() == Some(&VariantValue::Str("busy".into()))
        })
        .unwrap();
    // Template-defined `when` survives; absent `extend` is filled in.
    assert_eq!(model.property(busy, "when").as_binding(), Some("loading"));
    assert_eq!(
        model.property(busy, "extend").as_variant(),
        Some(&VariantValue::Str("base".into()))
    );

    let changes = model.property(busy, "data").as_nodes();
    assert_eq!(changes.len(), 1);
    assert_eq!(
        model.node(changes[0]).unwrap().type_name.as_str(),
        "PropertyChanges"
    );
    assert_eq!(
        model.property(changes[0], "opacity").as_variant(),
        Some(&VariantValue::Double(0.5))
    );
}

#[test]
fn expressive_template_binding_wins_over_style_literal() {
    let mut template = rewriter(
        "\
Item {
    id: window

    Rectangle {
        id: panel
        width: 10 + 4
        height: parent.height
    }
}
",
    );
    let mut style = rewriter(
        "Item {\n    Rectangle {\n        id: panel\n        width: 50\n        height: 80\n    }\n}\n",
    );

    merge(&mut template, &mut style);

    let model = template.model();
    let panel = model.node_for_id("panel").unwrap();
    // Literal-only binding yields to the style's value.
    assert_eq!(
        model.property(panel, "width").as_variant(),
        Some(&VariantValue::Int(50))
    );
    // Expressive binding is restored over it.
    assert_eq!(
        model.property(panel, "height").as_binding(),
        Some("parent.height")
    );
}

#[test]
fn ids_stay_unique_after_merge() {
    let mut template = rewriter(BASIC_TEMPLATE);
    let mut style = rewriter(BASIC_STYLE);

    merge(&mut template, &mut style);

    let model = template.model();
    let mut seen = std::collections::HashSet::new();
    for node in model.node_indices() {
        if let Some(id) = model.id_of(node) {
            assert!(seen.insert(id.to_string()), "duplicate id `{id}`");
        }
    }
    model.check_consistency().unwrap();
}

#[test]
fn metadata_registry_filters_unknown_properties() {
    let mut registry = vdoc_model::MetadataRegistry::new();
    registry.register("Item", None, ["x", "y", "width", "height"]);
    registry.register("Rectangle", Some("Item"), ["color"]);

    let mut template = rewriter(
        "Item {\n    id: window\n\n    Rectangle {\n        id: c1\n    }\n}\n",
    );
    let mut style = rewriter(
        "Item {\n    Rectangle {\n        id: c1\n        color: \"red\"\n        glow: \"verymuch\"\n    }\n}\n",
    );

    StylesheetMerger::new(&mut template, &mut style, &registry)
        .merge()
        .unwrap();

    let model = template.model();
    let c1 = model.node_for_id("c1").unwrap();
    assert_eq!(
        model.property(c1, "color").as_variant(),
        Some(&VariantValue::Str("red".into()))
    );
    assert!(!model.property(c1, "glow").exists());
}
