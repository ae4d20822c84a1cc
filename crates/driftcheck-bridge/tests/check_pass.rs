//! End-to-end check pass: a plugin-side ruleset serving over an in-memory
//! session, with the harness runner standing in for the host's
//! configuration store.
#![expect(clippy::expect_used, reason = "tests use expect for clarity")]

use std::collections::BTreeMap;
use std::thread;

use rstest::rstest;
use serde_json::json;

use driftcheck_bridge::{CancelToken, CheckError, RulesetClient, RulesetServer};
use driftcheck_bridge::broker::InMemoryBroker;
use driftcheck_harness::{Issue, TestRunner, assert_issues_without_range, assert_no_issues};
use driftcheck_model::{Attribute, AttributeSchema, BodySchema};
use driftcheck_sdk::{
    BuiltinRuleSet, Config, Rule, RuleConfig, RuleDescriptor, RuleError, Runner, RunnerExt,
};

/// Compares `location` across old and new resource groups. New resources
/// with no old counterpart are skipped; names listed in the rule's own
/// configuration are ignored entirely.
struct LocationChanged;

#[derive(serde::Deserialize, Default)]
struct LocationChangedConfig {
    #[serde(default)]
    ignore_names: Vec<String>,
}

impl Rule for LocationChanged {
    fn name(&self) -> &str {
        "azurerm_location_changed"
    }

    fn check(&self, runner: &mut dyn Runner) -> Result<(), RuleError> {
        let config: LocationChangedConfig =
            runner.decode_rule_config(self.name())?.unwrap_or_default();
        let schema = BodySchema {
            attributes: vec![AttributeSchema::required("location")],
            ..BodySchema::default()
        };
        let old = runner.get_old_resource_content("azurerm_resource_group", &schema, None)?;
        let new = runner.get_new_resource_content("azurerm_resource_group", &schema, None)?;

        let old_locations: BTreeMap<String, Attribute> = old
            .blocks
            .into_iter()
            .filter_map(|block| {
                let name = block.labels.get(1)?.clone();
                let attr = block.body?.attributes.get("location")?.clone();
                Some((name, attr))
            })
            .collect();

        for block in &new.blocks {
            let Some(name) = block.labels.get(1) else {
                continue;
            };
            if config.ignore_names.contains(name) {
                continue;
            }
            let Some(old_attr) = old_locations.get(name) else {
                continue;
            };
            let Some(new_attr) = block.body.as_ref().and_then(|b| b.attributes.get("location"))
            else {
                continue;
            };
            if old_attr.value() != new_attr.value() {
                runner.emit_issue(
                    Some(self),
                    &format!("location of {name} changed"),
                    new_attr.range.clone(),
                )?;
            }
        }
        Ok(())
    }
}

struct AlwaysFails;

impl Rule for AlwaysFails {
    fn name(&self) -> &str {
        "always_fails"
    }

    fn enabled(&self) -> bool {
        false
    }

    fn check(&self, _runner: &mut dyn Runner) -> Result<(), RuleError> {
        Err(RuleError::failed("deliberate failure"))
    }
}

fn plugin_ruleset() -> BuiltinRuleSet {
    BuiltinRuleSet::new("azurerm", "0.1.0").with_rules(vec![
        Box::new(LocationChanged),
        Box::new(AlwaysFails),
    ])
}

fn start_plugin(broker: InMemoryBroker) -> (CancelToken, thread::JoinHandle<()>) {
    let stop = CancelToken::new();
    let plugin_stop = stop.clone();
    let handle = thread::spawn(move || {
        RulesetServer::new(plugin_ruleset())
            .serve(&broker, &plugin_stop)
            .expect("plugin serve");
    });
    (stop, handle)
}

fn expected_issue(message: &str) -> Issue {
    Issue {
        rule: Some(RuleDescriptor {
            name: "azurerm_location_changed".into(),
            ..RuleDescriptor::default()
        }),
        message: message.into(),
        range: driftcheck_model::Range::default(),
    }
}

#[rstest]
fn drifted_configuration_is_reported_across_the_bridge() {
    let broker = InMemoryBroker::new();
    let (stop, plugin) = start_plugin(broker.clone());
    let client = RulesetClient::connect(broker).expect("connect");

    assert_eq!(client.name(), "azurerm");
    assert_eq!(
        client.rule_names(),
        vec!["azurerm_location_changed", "always_fails"]
    );

    let mut runner = TestRunner::new(
        &[
            (
                "groups.tf",
                "resource \"azurerm_resource_group\" \"rg\" { location = \"westeurope\" }",
            ),
            (
                "extra.tf",
                "resource \"azurerm_resource_group\" \"other\" { location = \"westeurope\" }",
            ),
        ],
        &[
            (
                "groups.tf",
                "resource \"azurerm_resource_group\" \"rg\" { location = \"eastus\" }",
            ),
            (
                "extra.tf",
                "resource \"azurerm_resource_group\" \"other\" { location = \"westeurope\" }",
            ),
        ],
    )
    .expect("parse fixtures");

    client.check(&mut runner).expect("check");
    assert_issues_without_range(
        runner.issues(),
        &[expected_issue("location of rg changed")],
    );

    stop.cancel();
    plugin.join().expect("plugin thread");
}

#[rstest]
fn clean_configuration_reports_nothing() {
    let broker = InMemoryBroker::new();
    let (stop, plugin) = start_plugin(broker.clone());
    let client = RulesetClient::connect(broker).expect("connect");

    let source = "resource \"azurerm_resource_group\" \"rg\" { location = \"westeurope\" }";
    let mut runner =
        TestRunner::new(&[("main.tf", source)], &[("main.tf", source)]).expect("parse fixtures");
    client.check(&mut runner).expect("check");
    assert_no_issues(runner.issues());

    stop.cancel();
    plugin.join().expect("plugin thread");
}

#[rstest]
fn rule_configuration_flows_back_through_the_reverse_service() {
    let broker = InMemoryBroker::new();
    let (stop, plugin) = start_plugin(broker.clone());
    let client = RulesetClient::connect(broker).expect("connect");

    let mut runner = TestRunner::new(
        &[(
            "main.tf",
            "resource \"azurerm_resource_group\" \"rg\" { location = \"westeurope\" }",
        )],
        &[(
            "main.tf",
            "resource \"azurerm_resource_group\" \"rg\" { location = \"eastus\" }",
        )],
    )
    .expect("parse fixtures")
    .with_rule_config("azurerm_location_changed", json!({"ignore_names": ["rg"]}));

    client.check(&mut runner).expect("check");
    assert_no_issues(runner.issues());

    stop.cancel();
    plugin.join().expect("plugin thread");
}

#[rstest]
fn enabling_a_failing_rule_fails_the_pass() {
    let broker = InMemoryBroker::new();
    let (stop, plugin) = start_plugin(broker.clone());
    let client = RulesetClient::connect(broker).expect("connect");

    let config = Config::new().with_rule(RuleConfig::new("always_fails", true));
    client
        .apply_global_config(Some(&config))
        .expect("apply config");

    let mut runner = TestRunner::new(&[], &[]).expect("parse fixtures");
    let err = client.check(&mut runner).expect_err("failing rule");
    match err {
        CheckError::Rules(failures) => {
            assert_eq!(failures.to_string(), "rule always_fails: deliberate failure");
        }
        other => panic!("expected rule failures, got {other:?}"),
    }

    stop.cancel();
    plugin.join().expect("plugin thread");
}
