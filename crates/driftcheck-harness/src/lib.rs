//! In-process test harness for driftcheck rules.
//!
//! Rule authors test their rules without a host, a plugin process, or a
//! bridge session: [`TestRunner`] parses old and new configuration sources
//! with a small built-in parser and implements the SDK's
//! [`Runner`](driftcheck_sdk::Runner) directly, recording emitted issues
//! for assertion.
//!
//! # Example
//!
//! ```
//! use driftcheck_harness::TestRunner;
//! use driftcheck_model::{AttributeSchema, BodySchema};
//! use driftcheck_sdk::Runner;
//!
//! let mut runner = TestRunner::new(
//!     &[("main.tf", r#"resource "azurerm_resource_group" "rg" { location = "westeurope" }"#)],
//!     &[("main.tf", r#"resource "azurerm_resource_group" "rg" { location = "eastus" }"#)],
//! )
//! .expect("valid sources");
//!
//! let schema = BodySchema {
//!     attributes: vec![AttributeSchema::required("location")],
//!     ..BodySchema::default()
//! };
//! let old = runner
//!     .get_old_resource_content("azurerm_resource_group", &schema, None)
//!     .expect("old content");
//! assert_eq!(old.blocks.len(), 1);
//! ```

pub mod parser;
pub mod runner;

pub use self::parser::{ParseError, RawAttribute, RawBlock, RawBody, parse};
pub use self::runner::{
    Issue, TestRunner, assert_issues, assert_issues_without_range, assert_no_issues,
};
