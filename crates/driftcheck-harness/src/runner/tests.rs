//! Unit tests exercising the harness the way rule authors do.
#![expect(clippy::expect_used, reason = "tests use expect for clarity")]

use std::collections::BTreeMap;

use rstest::rstest;
use serde::Deserialize;
use serde_json::json;

use driftcheck_model::{AttributeSchema, BlockSchema, Pos};
use driftcheck_sdk::{RuleError, RunnerExt};

use super::*;

/// Compares `location` across old and new resource groups, emitting one
/// issue per changed resource. New resources with no old counterpart are
/// not drift and are skipped.
struct LocationChanged;

impl Rule for LocationChanged {
    fn name(&self) -> &str {
        "azurerm_location_changed"
    }

    fn check(&self, runner: &mut dyn Runner) -> Result<(), RuleError> {
        let schema = BodySchema {
            attributes: vec![AttributeSchema::required("location")],
            ..BodySchema::default()
        };
        let old = runner.get_old_resource_content("azurerm_resource_group", &schema, None)?;
        let new = runner.get_new_resource_content("azurerm_resource_group", &schema, None)?;

        let old_locations: BTreeMap<&str, &Attribute> = old
            .blocks
            .iter()
            .filter_map(|block| {
                let name = block.labels.get(1)?;
                let attr = block.body.as_ref()?.attributes.get("location")?;
                Some((name.as_str(), attr))
            })
            .collect();

        for block in &new.blocks {
            let Some(name) = block.labels.get(1) else {
                continue;
            };
            let Some(old_attr) = old_locations.get(name.as_str()) else {
                continue;
            };
            let Some(new_attr) = block.body.as_ref().and_then(|b| b.attributes.get("location"))
            else {
                continue;
            };
            if old_attr.value() != new_attr.value() {
                runner.emit_issue(Some(self), "location changed", new_attr.range.clone())?;
            }
        }
        Ok(())
    }
}

fn expected_issue(message: &str, range: Range) -> Issue {
    Issue {
        rule: Some(RuleDescriptor {
            name: "azurerm_location_changed".into(),
            ..RuleDescriptor::default()
        }),
        message: message.into(),
        range,
    }
}

#[rstest]
fn changed_location_emits_one_issue_at_the_new_attribute() {
    let mut runner = TestRunner::new(
        &[(
            "main.tf",
            "resource \"azurerm_resource_group\" \"rg\" {\n  location = \"westeurope\"\n}\n",
        )],
        &[(
            "main.tf",
            "resource \"azurerm_resource_group\" \"rg\" {\n  location = \"eastus\"\n}\n",
        )],
    )
    .expect("parse");

    LocationChanged.check(&mut runner).expect("check");

    assert_issues(
        runner.issues(),
        &[expected_issue(
            "location changed",
            Range::new("main.tf", Pos::new(2, 3, 0), Pos::new(2, 22, 0)),
        )],
    );
}

#[rstest]
fn unchanged_location_emits_nothing() {
    let source = "resource \"azurerm_resource_group\" \"rg\" { location = \"westeurope\" }";
    let mut runner =
        TestRunner::new(&[("main.tf", source)], &[("main.tf", source)]).expect("parse");
    LocationChanged.check(&mut runner).expect("check");
    assert_no_issues(runner.issues());
}

#[rstest]
fn new_resource_without_old_counterpart_is_not_drift() {
    let mut runner = TestRunner::new(
        &[],
        &[(
            "main.tf",
            "resource \"azurerm_resource_group\" \"rg\" { location = \"eastus\" }",
        )],
    )
    .expect("parse");
    LocationChanged.check(&mut runner).expect("check");
    assert_no_issues(runner.issues());
}

#[rstest]
fn resource_content_filters_by_first_label() {
    let mut runner = TestRunner::new(
        &[(
            "main.tf",
            concat!(
                "resource \"azurerm_resource_group\" \"one\" { location = \"westeurope\" }\n",
                "resource \"azurerm_virtual_network\" \"net\" { location = \"westeurope\" }\n",
                "resource \"azurerm_resource_group\" \"two\" { location = \"northeurope\" }\n",
            ),
        )],
        &[],
    )
    .expect("parse");

    let schema = BodySchema {
        attributes: vec![AttributeSchema::required("location")],
        ..BodySchema::default()
    };
    let content = runner
        .get_old_resource_content("azurerm_resource_group", &schema, None)
        .expect("old content");

    assert_eq!(content.blocks.len(), 2);
    for block in &content.blocks {
        assert_eq!(block.labels[0], "azurerm_resource_group");
    }
    let names: Vec<&str> = content
        .blocks
        .iter()
        .map(|b| b.labels[1].as_str())
        .collect();
    assert_eq!(names, vec!["one", "two"]);
}

#[rstest]
fn just_attributes_mode_returns_everything() {
    let mut runner = TestRunner::new(
        &[],
        &[("main.tf", "location = \"eastus\"\nsku = \"Standard\"\n")],
    )
    .expect("parse");
    let content = runner
        .get_new_module_content(&BodySchema::just_attributes(), None)
        .expect("content");
    assert_eq!(content.attributes.len(), 2);
}

#[rstest]
fn schema_without_nested_body_yields_bodyless_blocks() {
    let mut runner = TestRunner::new(
        &[],
        &[(
            "main.tf",
            "resource \"azurerm_resource_group\" \"rg\" { location = \"eastus\" }",
        )],
    )
    .expect("parse");

    let schema = BodySchema {
        blocks: vec![BlockSchema {
            block_type: "resource".into(),
            label_names: vec!["type".into(), "name".into()],
            body: None,
        }],
        ..BodySchema::default()
    };
    let content = runner
        .get_new_module_content(&schema, None)
        .expect("content");
    assert_eq!(content.blocks.len(), 1);
    assert!(content.blocks[0].body.is_none());
}

#[rstest]
fn rule_config_payloads_decode_through_the_runner() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct IgnoreConfig {
        ignore_patterns: Vec<String>,
    }

    let mut runner = TestRunner::new(&[], &[])
        .expect("parse")
        .with_rule_config("azurerm_location_changed", json!({"ignore_patterns": ["tmp_*"]}));

    let decoded: Option<IgnoreConfig> = runner
        .decode_rule_config("azurerm_location_changed")
        .expect("decode");
    assert_eq!(
        decoded,
        Some(IgnoreConfig {
            ignore_patterns: vec!["tmp_*".into()]
        })
    );
    assert!(
        runner
            .decode_rule_config::<IgnoreConfig>("unknown_rule")
            .expect("absent config")
            .is_none()
    );
}

#[rstest]
fn anonymous_zero_range_issues_are_recorded_as_given() {
    let mut runner = TestRunner::new(&[], &[]).expect("parse");
    runner
        .emit_issue(None, "anonymous finding", Range::default())
        .expect("emit");

    let issue = &runner.issues()[0];
    assert!(issue.rule.is_none());
    assert_eq!(issue.range, Range::default());
    assert_issues_without_range(
        runner.issues(),
        &[Issue {
            rule: None,
            message: "anonymous finding".into(),
            range: Range::default(),
        }],
    );
}
