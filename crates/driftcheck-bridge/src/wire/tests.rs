//! Unit tests for the wire marshaling layer.
#![expect(clippy::expect_used, reason = "tests use expect for clarity")]

use std::collections::BTreeMap;

use rstest::{fixture, rstest};
use serde_json::json;

use driftcheck_model::{
    AttrValue, Attribute, AttributeSchema, Block, BlockSchema, BodyContent, BodySchema, Expression,
    Pos, Range, SchemaMode, Severity,
};
use driftcheck_sdk::RuleDescriptor;

use super::Severity as WireSeverity;

fn range(line: usize, column: usize, byte: usize) -> Range {
    Range::new(
        "main.tf",
        Pos::new(line, column, byte),
        Pos::new(line, column + 4, byte + 4),
    )
}

#[fixture]
fn nested_schema() -> BodySchema {
    BodySchema {
        attributes: vec![
            AttributeSchema::required("location"),
            AttributeSchema::new("tags"),
        ],
        blocks: vec![BlockSchema {
            block_type: "timeouts".into(),
            label_names: vec!["kind".into()],
            body: Some(Box::new(BodySchema {
                attributes: vec![AttributeSchema::new("create")],
                ..BodySchema::default()
            })),
        }],
        mode: SchemaMode::JustAttributes,
    }
}

#[rstest]
fn schema_round_trips_losslessly(nested_schema: BodySchema) {
    let wire = super::BodySchema::from(&nested_schema);
    let encoded = serde_json::to_value(&wire).expect("encode schema");
    let decoded: super::BodySchema = serde_json::from_value(encoded).expect("decode schema");
    assert_eq!(BodySchema::from(decoded), nested_schema);
}

#[rstest]
fn range_round_trips_field_for_field() {
    let original = range(3, 7, 52);
    let wire = super::Range::from(&original);
    let encoded = serde_json::to_value(&wire).expect("encode range");
    let decoded: super::Range = serde_json::from_value(encoded).expect("decode range");
    assert_eq!(Range::from(decoded), original);
}

#[rstest]
fn evaluable_expression_is_snapshotted_on_send() {
    let attr = Attribute {
        name: "location".into(),
        value: AttrValue::Expression(Expression::Literal(json!("westeurope"))),
        range: range(1, 5, 30),
        name_range: range(1, 5, 30),
    };
    let wire = super::Attribute::from(&attr);
    assert_eq!(wire.value, Some(json!("westeurope")));

    let received = Attribute::from(wire);
    // The expression is gone; only the decoded value survives.
    assert_eq!(received.value, AttrValue::Value(json!("westeurope")));
}

#[rstest]
#[case::raw_reference(AttrValue::Expression(Expression::Raw("var.location".into())))]
#[case::null_literal(AttrValue::Expression(Expression::Literal(serde_json::Value::Null)))]
#[case::already_absent(AttrValue::Absent)]
fn non_evaluable_attribute_crosses_without_value(#[case] value: AttrValue) {
    let attr = Attribute {
        name: "location".into(),
        value,
        range: range(1, 5, 30),
        name_range: range(1, 5, 30),
    };
    let wire = super::Attribute::from(&attr);
    assert_eq!(wire.value, None);
    assert_eq!(Attribute::from(wire).value, AttrValue::Absent);
}

#[rstest]
fn content_round_trips_names_ranges_and_labels() {
    let mut attributes = BTreeMap::new();
    attributes.insert(
        "location".into(),
        Attribute {
            name: "location".into(),
            value: AttrValue::Value(json!("eastus")),
            range: range(2, 3, 40),
            name_range: range(2, 3, 40),
        },
    );
    let content = BodyContent {
        attributes,
        blocks: vec![Block {
            block_type: "resource".into(),
            labels: vec!["azurerm_resource_group".into(), "rg".into()],
            body: Some(BodyContent::new()),
            def_range: range(1, 1, 0),
            type_range: range(1, 1, 0),
            label_ranges: vec![range(1, 10, 9), range(1, 36, 35)],
        }],
    };

    let wire = super::BodyContent::from(&content);
    let encoded = serde_json::to_value(&wire).expect("encode content");
    let decoded: super::BodyContent = serde_json::from_value(encoded).expect("decode content");
    let received = BodyContent::from(decoded);

    assert_eq!(received.blocks[0].labels, content.blocks[0].labels);
    assert_eq!(received.blocks[0].label_ranges, content.blocks[0].label_ranges);
    assert_eq!(
        received.attributes["location"].value,
        AttrValue::Value(json!("eastus"))
    );
}

#[rstest]
#[case(Severity::Error)]
#[case(Severity::Warning)]
#[case(Severity::Notice)]
fn severity_maps_bijectively(#[case] severity: Severity) {
    let wire = WireSeverity::from(severity);
    assert_eq!(Severity::from(wire), severity);
}

#[rstest]
fn unrecognised_severity_decodes_to_error() {
    let decoded: WireSeverity = serde_json::from_value(json!("FATAL")).expect("decode severity");
    assert_eq!(Severity::from(decoded), Severity::Error);
}

#[rstest]
fn rule_descriptor_crosses_as_values_only() {
    let descriptor = RuleDescriptor {
        name: "azurerm_location_changed".into(),
        enabled: true,
        severity: Severity::Warning,
        link: "https://example.com/rules".into(),
    };
    let wire = super::Rule::from(&descriptor);
    let encoded = serde_json::to_value(&wire).expect("encode rule");
    let decoded: super::Rule = serde_json::from_value(encoded).expect("decode rule");
    assert_eq!(RuleDescriptor::from(decoded), descriptor);
}

#[rstest]
fn config_drops_opaque_rule_bodies() {
    let config = driftcheck_sdk::Config::new().with_rule(driftcheck_sdk::RuleConfig {
        name: "my_rule".into(),
        enabled: true,
        body: Some(json!({"ignore_patterns": ["tmp_*"]})),
    });
    let wire = super::Config::from(&config);
    let received = driftcheck_sdk::Config::from(wire);
    let rule = received.rules.get("my_rule").expect("rule config");
    assert!(rule.enabled);
    assert_eq!(rule.body, None);
}
