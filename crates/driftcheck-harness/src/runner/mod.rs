//! An in-process [`Runner`] over parsed fixture sources.

use std::collections::BTreeMap;

use serde_json::Value;

use driftcheck_model::{
    AttrValue, Attribute, Block, BlockSchema, BodyContent, BodySchema, Range, SchemaMode,
};
use driftcheck_sdk::{ModuleContentOptions, Rule, RuleDescriptor, Runner, RunnerError};

use crate::parser::{ParseError, RawBody, parse};

#[cfg(test)]
mod tests;

/// One recorded finding.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    /// Identity of the emitting rule, when one was attached.
    pub rule: Option<RuleDescriptor>,
    /// The finding's message.
    pub message: String,
    /// Source range the finding points at.
    pub range: Range,
}

/// A [`Runner`] backed by parsed old and new sources.
///
/// Content retrieval walks the parsed trees per the requested schema;
/// emitted issues are recorded in order for later assertion.
pub struct TestRunner {
    old: BTreeMap<String, RawBody>,
    new: BTreeMap<String, RawBody>,
    configs: BTreeMap<String, Value>,
    issues: Vec<Issue>,
}

impl TestRunner {
    /// Parses the given `(filename, source)` pairs into a runner.
    ///
    /// # Errors
    ///
    /// Returns the first [`ParseError`] from either configuration.
    pub fn new(old: &[(&str, &str)], new: &[(&str, &str)]) -> Result<Self, ParseError> {
        Ok(Self {
            old: parse_files(old)?,
            new: parse_files(new)?,
            configs: BTreeMap::new(),
            issues: Vec::new(),
        })
    }

    /// Attaches an opaque configuration payload for a named rule.
    #[must_use]
    pub fn with_rule_config(mut self, rule_name: impl Into<String>, payload: Value) -> Self {
        self.configs.insert(rule_name.into(), payload);
        self
    }

    /// The issues emitted so far, in emission order.
    #[must_use]
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }
}

fn parse_files(files: &[(&str, &str)]) -> Result<BTreeMap<String, RawBody>, ParseError> {
    files
        .iter()
        .map(|(filename, source)| Ok(((*filename).to_owned(), parse(filename, source)?)))
        .collect()
}

/// Extracts the schema's view of one raw body.
///
/// `JustAttributes` mode returns every attribute regardless of the schema
/// list; otherwise only schema-named attributes appear. Blocks match on
/// type; a block whose schema carries no nested body yields `body: None`.
fn extract(raw: &RawBody, schema: &BodySchema) -> BodyContent {
    let mut content = BodyContent::new();

    for attr in &raw.attributes {
        let wanted = schema.mode == SchemaMode::JustAttributes
            || schema.attributes.iter().any(|a| a.name == attr.name);
        if wanted {
            content.attributes.insert(
                attr.name.clone(),
                Attribute {
                    name: attr.name.clone(),
                    value: AttrValue::Expression(attr.expr.clone()),
                    range: attr.range.clone(),
                    name_range: attr.name_range.clone(),
                },
            );
        }
    }

    for block in &raw.blocks {
        let Some(block_schema) = schema
            .blocks
            .iter()
            .find(|b| b.block_type == block.block_type)
        else {
            continue;
        };
        content.blocks.push(Block {
            block_type: block.block_type.clone(),
            labels: block.labels.clone(),
            body: block_schema
                .body
                .as_deref()
                .map(|nested| extract(&block.body, nested)),
            def_range: block.def_range.clone(),
            type_range: block.type_range.clone(),
            label_ranges: block.label_ranges.clone(),
        });
    }

    content
}

/// Merges every file's extraction into one module-level content.
fn module_content(files: &BTreeMap<String, RawBody>, schema: &BodySchema) -> BodyContent {
    let mut merged = BodyContent::new();
    for raw in files.values() {
        let mut content = extract(raw, schema);
        merged.attributes.append(&mut content.attributes);
        merged.blocks.append(&mut content.blocks);
    }
    merged
}

/// Wraps a body schema as the body of `resource` blocks with type and name
/// labels, then keeps only blocks whose first label matches.
fn resource_content(
    files: &BTreeMap<String, RawBody>,
    resource_type: &str,
    schema: &BodySchema,
) -> BodyContent {
    let wrapper = BodySchema {
        blocks: vec![BlockSchema {
            block_type: "resource".into(),
            label_names: vec!["type".into(), "name".into()],
            body: Some(Box::new(schema.clone())),
        }],
        ..BodySchema::default()
    };
    let mut content = module_content(files, &wrapper);
    content
        .blocks
        .retain(|block| block.labels.first().is_some_and(|label| label == resource_type));
    content
}

impl Runner for TestRunner {
    fn get_old_module_content(
        &mut self,
        schema: &BodySchema,
        _options: Option<&ModuleContentOptions>,
    ) -> Result<BodyContent, RunnerError> {
        Ok(module_content(&self.old, schema))
    }

    fn get_new_module_content(
        &mut self,
        schema: &BodySchema,
        _options: Option<&ModuleContentOptions>,
    ) -> Result<BodyContent, RunnerError> {
        Ok(module_content(&self.new, schema))
    }

    fn get_old_resource_content(
        &mut self,
        resource_type: &str,
        schema: &BodySchema,
        _options: Option<&ModuleContentOptions>,
    ) -> Result<BodyContent, RunnerError> {
        Ok(resource_content(&self.old, resource_type, schema))
    }

    fn get_new_resource_content(
        &mut self,
        resource_type: &str,
        schema: &BodySchema,
        _options: Option<&ModuleContentOptions>,
    ) -> Result<BodyContent, RunnerError> {
        Ok(resource_content(&self.new, resource_type, schema))
    }

    fn emit_issue(
        &mut self,
        rule: Option<&dyn Rule>,
        message: &str,
        issue_range: Range,
    ) -> Result<(), RunnerError> {
        self.issues.push(Issue {
            rule: rule.map(RuleDescriptor::of),
            message: message.to_owned(),
            range: issue_range,
        });
        Ok(())
    }

    fn rule_config(&mut self, rule_name: &str) -> Result<Option<Value>, RunnerError> {
        Ok(self.configs.get(rule_name).cloned())
    }
}

fn issue_matches(actual: &Issue, expected: &Issue, compare_ranges: bool) -> bool {
    let rules_match = match (&actual.rule, &expected.rule) {
        (None, None) => true,
        (Some(a), Some(e)) => a.name == e.name,
        _ => false,
    };
    rules_match
        && actual.message == expected.message
        && (!compare_ranges || actual.range.same_location(&expected.range))
}

fn assert_matching(actual: &[Issue], expected: &[Issue], compare_ranges: bool) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "expected {} issues, got {}: {actual:#?}",
        expected.len(),
        actual.len(),
    );
    for want in expected {
        assert!(
            actual
                .iter()
                .any(|got| issue_matches(got, want, compare_ranges)),
            "missing expected issue {want:#?} in {actual:#?}",
        );
    }
}

/// Asserts the recorded issues match the expected set, ignoring order and
/// byte offsets. Rules are compared by name only.
///
/// # Panics
///
/// Panics with a diff-friendly message when the sets differ.
#[track_caller]
pub fn assert_issues(actual: &[Issue], expected: &[Issue]) {
    assert_matching(actual, expected, true);
}

/// [`assert_issues`] without range comparison, for rules whose ranges are
/// incidental.
///
/// # Panics
///
/// Panics when the sets differ.
#[track_caller]
pub fn assert_issues_without_range(actual: &[Issue], expected: &[Issue]) {
    assert_matching(actual, expected, false);
}

/// Asserts that no issues were recorded.
///
/// # Panics
///
/// Panics listing the unexpected issues.
#[track_caller]
pub fn assert_no_issues(actual: &[Issue]) {
    assert!(actual.is_empty(), "expected no issues, got {actual:#?}");
}
