//! Body schemas describing what content a rule wants extracted.
//!
//! Rules construct a [`BodySchema`] per call to declare the attributes and
//! nested blocks they care about. Schemas are purely descriptive and never
//! mutated after construction; the recursive [`BlockSchema::body`] field
//! lets a rule request nested block content to arbitrary depth.

/// How schema matching treats attributes that are not declared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SchemaMode {
    /// Only explicitly declared attributes are extracted.
    #[default]
    Default,
    /// Every attribute present in the body is extracted, regardless of
    /// declarations.
    JustAttributes,
}

/// Declares a single expected attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSchema {
    /// Attribute name to match.
    pub name: String,
    /// Whether the attribute must be present.
    pub required: bool,
}

impl AttributeSchema {
    /// Creates an optional attribute declaration.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
        }
    }

    /// Creates a required attribute declaration.
    #[must_use]
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
        }
    }
}

/// Declares a single expected block type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockSchema {
    /// Block type to match (e.g. `"resource"`).
    pub block_type: String,
    /// Names for the block's positional labels (e.g. `["type", "name"]`).
    pub label_names: Vec<String>,
    /// Schema for the block's body. `None` leaves nested bodies unresolved.
    pub body: Option<Box<BodySchema>>,
}

/// The expected structure of a configuration body.
///
/// # Example
///
/// ```
/// use driftcheck_model::{AttributeSchema, BlockSchema, BodySchema};
///
/// let schema = BodySchema {
///     attributes: vec![AttributeSchema::required("location")],
///     blocks: vec![BlockSchema {
///         block_type: "timeouts".into(),
///         label_names: vec![],
///         body: None,
///     }],
///     ..BodySchema::default()
/// };
/// assert_eq!(schema.blocks[0].block_type, "timeouts");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodySchema {
    /// Expected attributes, in declaration order.
    pub attributes: Vec<AttributeSchema>,
    /// Expected nested blocks, in declaration order.
    pub blocks: Vec<BlockSchema>,
    /// Matching behaviour for undeclared attributes.
    pub mode: SchemaMode,
}

impl BodySchema {
    /// A schema that captures every attribute present in the body.
    #[must_use]
    pub fn just_attributes() -> Self {
        Self {
            mode: SchemaMode::JustAttributes,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    #![expect(clippy::expect_used, reason = "tests use expect for clarity")]

    use rstest::rstest;

    use super::*;

    #[rstest]
    fn default_schema_declares_nothing() {
        let schema = BodySchema::default();
        assert!(schema.attributes.is_empty());
        assert!(schema.blocks.is_empty());
        assert_eq!(schema.mode, SchemaMode::Default);
    }

    #[rstest]
    fn just_attributes_sets_mode() {
        assert_eq!(
            BodySchema::just_attributes().mode,
            SchemaMode::JustAttributes
        );
    }

    #[rstest]
    fn schemas_nest_recursively() {
        let inner = BodySchema {
            attributes: vec![AttributeSchema::new("create")],
            ..BodySchema::default()
        };
        let outer = BodySchema {
            blocks: vec![BlockSchema {
                block_type: "timeouts".into(),
                label_names: vec![],
                body: Some(Box::new(inner.clone())),
            }],
            ..BodySchema::default()
        };
        let body = outer.blocks[0].body.as_deref().expect("nested schema");
        assert_eq!(*body, inner);
    }
}
