//! Contracts between the driftcheck host, its plugins, and rule authors.
//!
//! The `driftcheck-sdk` crate defines the three interfaces a plugin is built
//! from and the global configuration that drives them:
//!
//! - [`Rule`]: one named check with default enablement and severity,
//!   executed against a [`Runner`].
//! - [`Runner`]: the capability set a rule uses to read old/new
//!   configuration content and emit findings.
//! - [`RuleSet`]: a plugin's bundle of metadata plus its rules, usually
//!   backed by [`BuiltinRuleSet`] which implements the rule registry and
//!   the enablement policy derived from [`Config`].
//!
//! # Example
//!
//! ```
//! use driftcheck_sdk::{BuiltinRuleSet, Rule, RuleError, Runner, RuleSet};
//!
//! struct LocationChanged;
//!
//! impl Rule for LocationChanged {
//!     fn name(&self) -> &str {
//!         "azurerm_location_changed"
//!     }
//!
//!     fn check(&self, _runner: &mut dyn Runner) -> Result<(), RuleError> {
//!         Ok(())
//!     }
//! }
//!
//! let ruleset = BuiltinRuleSet::new("azurerm", "0.1.0")
//!     .with_rules(vec![Box::new(LocationChanged)]);
//! assert_eq!(ruleset.rule_names(), vec!["azurerm_location_changed"]);
//! ```

pub mod config;
pub mod error;
pub mod rule;
pub mod ruleset;
pub mod runner;

pub use self::config::{Config, RuleConfig};
pub use self::error::{ConfigError, RuleError, RunnerError};
pub use self::rule::{Rule, RuleDescriptor};
pub use self::ruleset::{BuiltinRuleSet, RuleSet};
pub use self::runner::{ExpandMode, ModuleCtx, ModuleContentOptions, Runner, RunnerExt};
