//! Data model shared between the driftcheck host and its plugins.
//!
//! The `driftcheck-model` crate defines the schema and content types a rule
//! uses to describe and receive configuration, the source position types
//! attached to every finding, and the issue severity enum. These types cross
//! the host/plugin process boundary via the wire layer in
//! `driftcheck-bridge`; everything here is a plain value type with no
//! behaviour beyond construction and lookup.
//!
//! # Example
//!
//! ```
//! use driftcheck_model::{AttributeSchema, BodySchema};
//!
//! let schema = BodySchema {
//!     attributes: vec![AttributeSchema { name: "location".into(), required: true }],
//!     ..BodySchema::default()
//! };
//! assert_eq!(schema.attributes.len(), 1);
//! ```

pub mod content;
pub mod position;
pub mod schema;
pub mod severity;

pub use self::content::{AttrValue, Attribute, Block, BodyContent, Expression};
pub use self::position::{Pos, Range};
pub use self::schema::{AttributeSchema, BlockSchema, BodySchema, SchemaMode};
pub use self::severity::Severity;
