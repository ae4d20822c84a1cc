//! Wire-transmissible mirrors of the data model.
//!
//! Every type a request or response carries has a serde-derived mirror
//! here plus conversions to and from the in-process types. Schemas,
//! ranges, and positions marshal losslessly. Attribute values
//! snapshot-on-send: a live expression is evaluated once when it is
//! statically evaluable with a known, non-null result and crosses as a
//! self-describing typed value; otherwise no value crosses and the
//! attribute carries structural information only. The receiving side never
//! reconstructs an expression.
//!
//! Rules cross one-way, as value descriptors: name, enablement, severity,
//! and link, never executable behaviour.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use driftcheck_sdk::RuleDescriptor;

#[cfg(test)]
mod tests;

/// Wire form of [`driftcheck_model::Pos`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
    pub byte: usize,
}

impl From<driftcheck_model::Pos> for Pos {
    fn from(pos: driftcheck_model::Pos) -> Self {
        Self {
            line: pos.line,
            column: pos.column,
            byte: pos.byte,
        }
    }
}

impl From<Pos> for driftcheck_model::Pos {
    fn from(pos: Pos) -> Self {
        Self {
            line: pos.line,
            column: pos.column,
            byte: pos.byte,
        }
    }
}

/// Wire form of [`driftcheck_model::Range`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub filename: String,
    pub start: Pos,
    pub end: Pos,
}

impl From<&driftcheck_model::Range> for Range {
    fn from(range: &driftcheck_model::Range) -> Self {
        Self {
            filename: range.filename.clone(),
            start: range.start.into(),
            end: range.end.into(),
        }
    }
}

impl From<Range> for driftcheck_model::Range {
    fn from(range: Range) -> Self {
        Self {
            filename: range.filename,
            start: range.start.into(),
            end: range.end.into(),
        }
    }
}

/// Wire form of [`driftcheck_model::SchemaMode`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaMode {
    #[default]
    Default,
    JustAttributes,
}

impl From<driftcheck_model::SchemaMode> for SchemaMode {
    fn from(mode: driftcheck_model::SchemaMode) -> Self {
        match mode {
            driftcheck_model::SchemaMode::Default => Self::Default,
            driftcheck_model::SchemaMode::JustAttributes => Self::JustAttributes,
        }
    }
}

impl From<SchemaMode> for driftcheck_model::SchemaMode {
    fn from(mode: SchemaMode) -> Self {
        match mode {
            SchemaMode::Default => Self::Default,
            SchemaMode::JustAttributes => Self::JustAttributes,
        }
    }
}

/// Wire form of [`driftcheck_model::AttributeSchema`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSchema {
    pub name: String,
    #[serde(default)]
    pub required: bool,
}

/// Wire form of [`driftcheck_model::BlockSchema`]; recursive through
/// `body`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSchema {
    pub block_type: String,
    #[serde(default)]
    pub label_names: Vec<String>,
    #[serde(default)]
    pub body: Option<Box<BodySchema>>,
}

/// Wire form of [`driftcheck_model::BodySchema`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodySchema {
    #[serde(default)]
    pub attributes: Vec<AttributeSchema>,
    #[serde(default)]
    pub blocks: Vec<BlockSchema>,
    #[serde(default)]
    pub mode: SchemaMode,
}

impl From<&driftcheck_model::BodySchema> for BodySchema {
    fn from(schema: &driftcheck_model::BodySchema) -> Self {
        Self {
            attributes: schema
                .attributes
                .iter()
                .map(|attr| AttributeSchema {
                    name: attr.name.clone(),
                    required: attr.required,
                })
                .collect(),
            blocks: schema
                .blocks
                .iter()
                .map(|block| BlockSchema {
                    block_type: block.block_type.clone(),
                    label_names: block.label_names.clone(),
                    body: block
                        .body
                        .as_deref()
                        .map(|body| Box::new(Self::from(body))),
                })
                .collect(),
            mode: schema.mode.into(),
        }
    }
}

impl From<BodySchema> for driftcheck_model::BodySchema {
    fn from(schema: BodySchema) -> Self {
        Self {
            attributes: schema
                .attributes
                .into_iter()
                .map(|attr| driftcheck_model::AttributeSchema {
                    name: attr.name,
                    required: attr.required,
                })
                .collect(),
            blocks: schema
                .blocks
                .into_iter()
                .map(|block| driftcheck_model::BlockSchema {
                    block_type: block.block_type,
                    label_names: block.label_names,
                    body: block.body.map(|body| Box::new((*body).into())),
                })
                .collect(),
            mode: schema.mode.into(),
        }
    }
}

/// Wire form of [`driftcheck_model::Attribute`].
///
/// `value` is present only when the producing side held a snapshotted
/// value or a statically evaluable expression; live expressions never
/// cross.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(default)]
    pub value: Option<Value>,
    pub range: Range,
    pub name_range: Range,
}

impl From<&driftcheck_model::Attribute> for Attribute {
    fn from(attr: &driftcheck_model::Attribute) -> Self {
        Self {
            name: attr.name.clone(),
            value: attr.value().cloned(),
            range: (&attr.range).into(),
            name_range: (&attr.name_range).into(),
        }
    }
}

impl From<Attribute> for driftcheck_model::Attribute {
    fn from(attr: Attribute) -> Self {
        Self {
            name: attr.name,
            value: attr
                .value
                .map_or(driftcheck_model::AttrValue::Absent, |value| {
                    driftcheck_model::AttrValue::Value(value)
                }),
            range: attr.range.into(),
            name_range: attr.name_range.into(),
        }
    }
}

/// Wire form of [`driftcheck_model::Block`]; recursive through `body`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub block_type: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub body: Option<BodyContent>,
    pub def_range: Range,
    pub type_range: Range,
    #[serde(default)]
    pub label_ranges: Vec<Range>,
}

impl From<&driftcheck_model::Block> for Block {
    fn from(block: &driftcheck_model::Block) -> Self {
        Self {
            block_type: block.block_type.clone(),
            labels: block.labels.clone(),
            body: block.body.as_ref().map(BodyContent::from),
            def_range: (&block.def_range).into(),
            type_range: (&block.type_range).into(),
            label_ranges: block.label_ranges.iter().map(Range::from).collect(),
        }
    }
}

impl From<Block> for driftcheck_model::Block {
    fn from(block: Block) -> Self {
        Self {
            block_type: block.block_type,
            labels: block.labels,
            body: block.body.map(Into::into),
            def_range: block.def_range.into(),
            type_range: block.type_range.into(),
            label_ranges: block.label_ranges.into_iter().map(Into::into).collect(),
        }
    }
}

/// Wire form of [`driftcheck_model::BodyContent`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BodyContent {
    #[serde(default)]
    pub attributes: BTreeMap<String, Attribute>,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl From<&driftcheck_model::BodyContent> for BodyContent {
    fn from(content: &driftcheck_model::BodyContent) -> Self {
        Self {
            attributes: content
                .attributes
                .iter()
                .map(|(name, attr)| (name.clone(), Attribute::from(attr)))
                .collect(),
            blocks: content.blocks.iter().map(Block::from).collect(),
        }
    }
}

impl From<BodyContent> for driftcheck_model::BodyContent {
    fn from(content: BodyContent) -> Self {
        Self {
            attributes: content
                .attributes
                .into_iter()
                .map(|(name, attr)| (name, attr.into()))
                .collect(),
            blocks: content.blocks.into_iter().map(Into::into).collect(),
        }
    }
}

/// Wire form of [`driftcheck_model::Severity`].
///
/// Bijective for the three known values; anything unrecognised decodes to
/// the `Unknown` variant, which maps to `Error` on the way back into the
/// model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    #[default]
    Error,
    Warning,
    Notice,
    #[serde(other)]
    Unknown,
}

impl From<driftcheck_model::Severity> for Severity {
    fn from(severity: driftcheck_model::Severity) -> Self {
        match severity {
            driftcheck_model::Severity::Error => Self::Error,
            driftcheck_model::Severity::Warning => Self::Warning,
            driftcheck_model::Severity::Notice => Self::Notice,
        }
    }
}

impl From<Severity> for driftcheck_model::Severity {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Error | Severity::Unknown => Self::Error,
            Severity::Warning => Self::Warning,
            Severity::Notice => Self::Notice,
        }
    }
}

/// Wire form of a rule descriptor: a one-directional value snapshot that
/// never round-trips back into an executable rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub link: String,
}

impl From<&RuleDescriptor> for Rule {
    fn from(descriptor: &RuleDescriptor) -> Self {
        Self {
            name: descriptor.name.clone(),
            enabled: descriptor.enabled,
            severity: descriptor.severity.into(),
            link: descriptor.link.clone(),
        }
    }
}

impl From<Rule> for RuleDescriptor {
    fn from(rule: Rule) -> Self {
        Self {
            name: rule.name,
            enabled: rule.enabled,
            severity: rule.severity.into(),
            link: rule.link,
        }
    }
}

/// Wire form of [`driftcheck_sdk::RuleConfig`].
///
/// The opaque rule-specific body never crosses here; rules fetch it
/// through the reverse service's rule-config operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
}

/// Wire form of [`driftcheck_sdk::Config`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rules: BTreeMap<String, RuleConfig>,
    #[serde(default)]
    pub disabled_by_default: bool,
    #[serde(default)]
    pub only: Vec<String>,
    #[serde(default)]
    pub plugin_dir: Option<PathBuf>,
}

impl From<&driftcheck_sdk::Config> for Config {
    fn from(config: &driftcheck_sdk::Config) -> Self {
        Self {
            rules: config
                .rules
                .iter()
                .map(|(name, rule)| {
                    (
                        name.clone(),
                        RuleConfig {
                            name: rule.name.clone(),
                            enabled: rule.enabled,
                        },
                    )
                })
                .collect(),
            disabled_by_default: config.disabled_by_default,
            only: config.only.clone(),
            plugin_dir: config.plugin_dir.clone(),
        }
    }
}

impl From<Config> for driftcheck_sdk::Config {
    fn from(config: Config) -> Self {
        Self {
            rules: config
                .rules
                .into_iter()
                .map(|(name, rule)| {
                    (
                        name,
                        driftcheck_sdk::RuleConfig {
                            name: rule.name,
                            enabled: rule.enabled,
                            body: None,
                        },
                    )
                })
                .collect(),
            disabled_by_default: config.disabled_by_default,
            only: config.only,
            plugin_dir: config.plugin_dir,
        }
    }
}

/// Wire form of [`driftcheck_sdk::ModuleCtx`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleCtx {
    #[default]
    Current,
    Root,
    All,
}

/// Wire form of [`driftcheck_sdk::ExpandMode`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpandMode {
    #[default]
    None,
    Expand,
}

/// Wire form of [`driftcheck_sdk::ModuleContentOptions`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleContentOptions {
    #[serde(default)]
    pub module_ctx: ModuleCtx,
    #[serde(default)]
    pub expand_mode: ExpandMode,
    #[serde(default)]
    pub resource_type_hint: Option<String>,
}

impl From<&driftcheck_sdk::ModuleContentOptions> for ModuleContentOptions {
    fn from(options: &driftcheck_sdk::ModuleContentOptions) -> Self {
        Self {
            module_ctx: match options.module_ctx {
                driftcheck_sdk::ModuleCtx::Current => ModuleCtx::Current,
                driftcheck_sdk::ModuleCtx::Root => ModuleCtx::Root,
                driftcheck_sdk::ModuleCtx::All => ModuleCtx::All,
            },
            expand_mode: match options.expand_mode {
                driftcheck_sdk::ExpandMode::None => ExpandMode::None,
                driftcheck_sdk::ExpandMode::Expand => ExpandMode::Expand,
            },
            resource_type_hint: options.resource_type_hint.clone(),
        }
    }
}

impl From<ModuleContentOptions> for driftcheck_sdk::ModuleContentOptions {
    fn from(options: ModuleContentOptions) -> Self {
        Self {
            module_ctx: match options.module_ctx {
                ModuleCtx::Current => driftcheck_sdk::ModuleCtx::Current,
                ModuleCtx::Root => driftcheck_sdk::ModuleCtx::Root,
                ModuleCtx::All => driftcheck_sdk::ModuleCtx::All,
            },
            expand_mode: match options.expand_mode {
                ExpandMode::None => driftcheck_sdk::ExpandMode::None,
                ExpandMode::Expand => driftcheck_sdk::ExpandMode::Expand,
            },
            resource_type_hint: options.resource_type_hint,
        }
    }
}
