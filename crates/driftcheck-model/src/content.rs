//! Extracted configuration content: attributes, blocks, and their values.
//!
//! A [`BodyContent`] is produced fresh for every retrieval call and owned
//! solely by the caller that received it. Attribute values are a tagged
//! variant: in-process content carries a live [`Expression`], content that
//! crossed the host/plugin boundary carries a snapshotted typed value, and
//! attributes whose expression could not be statically evaluated carry
//! neither.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::position::Range;

/// An attribute value expression as parsed from source.
///
/// Only statically evaluable expressions (literals) yield a value; anything
/// referencing variables, functions, or other dynamic context is kept as raw
/// source text and produces no snapshot when marshalled across the process
/// boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A literal with a known, self-describing value.
    Literal(Value),
    /// Source text of an expression that cannot be evaluated statically.
    Raw(String),
}

impl Expression {
    /// Evaluates the expression once, statically.
    ///
    /// Returns `None` for raw expressions and for null literals; a null
    /// result is treated the same as an unknown one and never snapshotted.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Literal(Value::Null) | Self::Raw(_) => None,
            Self::Literal(value) => Some(value),
        }
    }
}

/// The value side of an [`Attribute`], depending on where it lives.
///
/// Exactly one variant is meaningful at a time. An attribute crossing the
/// process boundary loses its expression permanently: the receiving side
/// sees either a snapshotted [`Value`](serde_json::Value) or nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum AttrValue {
    /// A live expression; only exists in the process that parsed the source.
    Expression(Expression),
    /// A typed value snapshotted when the attribute was marshalled.
    Value(Value),
    /// No value available (non-evaluable expression after marshalling).
    #[default]
    Absent,
}

/// A single extracted attribute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// The attribute's value, live or snapshotted.
    pub value: AttrValue,
    /// Span of the whole attribute, name through expression.
    pub range: Range,
    /// Span of just the attribute name.
    pub name_range: Range,
}

impl Attribute {
    /// Returns the attribute's typed value when one is available.
    ///
    /// Resolves either a snapshotted value or a statically evaluable live
    /// expression; returns `None` otherwise. Rule logic that needs
    /// expression semantics beyond a snapshotted scalar cannot run across
    /// the process boundary.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match &self.value {
            AttrValue::Expression(expr) => expr.value(),
            AttrValue::Value(value) => Some(value),
            AttrValue::Absent => None,
        }
    }
}

/// A single extracted block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    /// Block type (e.g. `"resource"`).
    pub block_type: String,
    /// Label values in positional order (e.g. `["azurerm_resource_group", "rg"]`).
    pub labels: Vec<String>,
    /// Nested body content. `None` when the schema did not request the
    /// block's body.
    pub body: Option<BodyContent>,
    /// Span of the block definition (type through last label).
    pub def_range: Range,
    /// Span of the block type keyword.
    pub type_range: Range,
    /// Span of each label, one per entry in `labels`.
    pub label_ranges: Vec<Range>,
}

/// Content extracted from a configuration body.
///
/// Attribute names are unique per content instance; blocks preserve source
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BodyContent {
    /// Extracted attributes keyed by name.
    pub attributes: BTreeMap<String, Attribute>,
    /// Extracted blocks in source order.
    pub blocks: Vec<Block>,
}

impl BodyContent {
    /// Creates empty content.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when no attributes or blocks were extracted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.blocks.is_empty()
    }
}
