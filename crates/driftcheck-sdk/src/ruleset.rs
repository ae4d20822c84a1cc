//! Ruleset contract and the built-in rule registry with enablement policy.

use std::collections::BTreeMap;

use driftcheck_model::{BodyContent, BodySchema};

use crate::config::Config;
use crate::error::ConfigError;
use crate::rule::Rule;
use crate::runner::Runner;

/// Fallback version constraint when a ruleset does not declare one.
const DEFAULT_VERSION_CONSTRAINT: &str = ">= 0.1.0";

/// A plugin's bundle of metadata plus its collection of rules.
///
/// Most plugins use [`BuiltinRuleSet`] directly or wrap one; the trait's
/// default methods delegate to the wrapped registry so a wrapper only
/// overrides what it customises (typically [`RuleSet::config_schema`],
/// [`RuleSet::apply_config`], or [`RuleSet::new_runner`]).
pub trait RuleSet: Send {
    /// The wrapped registry. Drives rule iteration and enablement.
    fn builtin(&self) -> &BuiltinRuleSet;

    /// Mutable access to the wrapped registry.
    fn builtin_mut(&mut self) -> &mut BuiltinRuleSet;

    /// Ruleset name, e.g. `"azurerm"`.
    fn name(&self) -> &str {
        self.builtin().name()
    }

    /// Ruleset version, e.g. `"0.1.0"`.
    fn version(&self) -> &str {
        self.builtin().version()
    }

    /// Names of every rule, in registration order.
    fn rule_names(&self) -> Vec<String> {
        self.builtin().rule_names()
    }

    /// The host version constraint this ruleset requires.
    fn version_constraint(&self) -> &str {
        self.builtin().version_constraint()
    }

    /// Schema for plugin-specific configuration, or `None` when the plugin
    /// takes none.
    fn config_schema(&self) -> Option<BodySchema> {
        None
    }

    /// Applies global driftcheck configuration, recomputing rule
    /// enablement.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the configuration is rejected;
    /// failures are fatal to the session.
    fn apply_global_config(&mut self, config: Option<&Config>) -> Result<(), ConfigError> {
        self.builtin_mut().apply_global_config(config);
        Ok(())
    }

    /// Applies plugin-specific configuration matching
    /// [`RuleSet::config_schema`]. The default accepts anything.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the configuration is rejected.
    fn apply_config(&mut self, content: Option<&BodyContent>) -> Result<(), ConfigError> {
        let _ = content;
        Ok(())
    }

    /// Optionally wraps the runner every rule will see during a check
    /// pass. The default is an identity passthrough.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the wrapper cannot be built.
    fn new_runner<'r>(
        &self,
        runner: Box<dyn Runner + 'r>,
    ) -> Result<Box<dyn Runner + 'r>, ConfigError> {
        Ok(runner)
    }
}

/// The rule registry and enablement policy.
///
/// Holds the static, ordered list of rules and derives which are enabled
/// from global configuration. The enablement map is private per-instance
/// state: it does not exist until [`BuiltinRuleSet::apply_global_config`]
/// runs, and queries before that fall back to each rule's own default.
///
/// # Example
///
/// ```
/// use driftcheck_sdk::{BuiltinRuleSet, Config, Rule, RuleError, Runner};
///
/// struct Noop;
/// impl Rule for Noop {
///     fn name(&self) -> &str {
///         "noop"
///     }
///     fn check(&self, _runner: &mut dyn Runner) -> Result<(), RuleError> {
///         Ok(())
///     }
/// }
///
/// let mut ruleset = BuiltinRuleSet::new("example", "0.1.0")
///     .with_rules(vec![Box::new(Noop)]);
/// assert!(ruleset.is_rule_enabled("noop"));
///
/// let config = Config {
///     disabled_by_default: true,
///     ..Config::default()
/// };
/// ruleset.apply_global_config(Some(&config));
/// assert!(!ruleset.is_rule_enabled("noop"));
/// ```
pub struct BuiltinRuleSet {
    name: String,
    version: String,
    constraint: String,
    rules: Vec<Box<dyn Rule>>,
    /// `None` until `apply_global_config` has run at least once.
    enablement: Option<BTreeMap<String, bool>>,
}

impl BuiltinRuleSet {
    /// Creates an empty ruleset with the given identity.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            constraint: String::new(),
            rules: Vec::new(),
            enablement: None,
        }
    }

    /// Sets the host version constraint.
    #[must_use]
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = constraint.into();
        self
    }

    /// Replaces the rule list. Registration order is preserved everywhere
    /// rules are iterated.
    #[must_use]
    pub fn with_rules(mut self, rules: Vec<Box<dyn Rule>>) -> Self {
        self.rules = rules;
        self
    }

    /// Ruleset name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ruleset version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The host version constraint, falling back to
    /// `">= 0.1.0"` when none was declared.
    #[must_use]
    pub fn version_constraint(&self) -> &str {
        if self.constraint.is_empty() {
            DEFAULT_VERSION_CONSTRAINT
        } else {
            &self.constraint
        }
    }

    /// Names of every registered rule, in registration order.
    #[must_use]
    pub fn rule_names(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.name().to_owned()).collect()
    }

    /// Looks up a rule by name.
    #[must_use]
    pub fn get_rule(&self, name: &str) -> Option<&dyn Rule> {
        self.rules
            .iter()
            .find(|rule| rule.name() == name)
            .map(AsRef::as_ref)
    }

    /// Recomputes the enablement map from global configuration.
    ///
    /// Precedence, later steps overriding earlier ones:
    ///
    /// 1. each rule's own default;
    /// 2. `disabled_by_default` forces every flag off;
    /// 3. a non-empty `only` forces every flag off, then enables the names
    ///    present in both `only` and the registry;
    /// 4. per-rule [`RuleConfig::enabled`](crate::RuleConfig::enabled) is
    ///    applied last and wins, even over `only`.
    pub fn apply_global_config(&mut self, config: Option<&Config>) {
        let mut enablement: BTreeMap<String, bool> = self
            .rules
            .iter()
            .map(|rule| (rule.name().to_owned(), rule.enabled()))
            .collect();

        if let Some(config) = config {
            if config.disabled_by_default {
                for flag in enablement.values_mut() {
                    *flag = false;
                }
            }

            if !config.only.is_empty() {
                for flag in enablement.values_mut() {
                    *flag = false;
                }
                for name in &config.only {
                    if let Some(flag) = enablement.get_mut(name) {
                        *flag = true;
                    }
                }
            }

            // Explicit per-rule configuration wins, even over `only`.
            for (name, rule_config) in &config.rules {
                if let Some(flag) = enablement.get_mut(name) {
                    *flag = rule_config.enabled;
                }
            }
        }

        self.enablement = Some(enablement);
    }

    /// Whether a rule is currently enabled.
    ///
    /// Before [`BuiltinRuleSet::apply_global_config`] has run this falls
    /// back to the rule's own default; unknown names are disabled.
    #[must_use]
    pub fn is_rule_enabled(&self, name: &str) -> bool {
        match &self.enablement {
            Some(enablement) => enablement.get(name).copied().unwrap_or(false),
            None => self.get_rule(name).is_some_and(Rule::enabled),
        }
    }

    /// Every enabled rule, in registration order.
    #[must_use]
    pub fn enabled_rules(&self) -> Vec<&dyn Rule> {
        self.rules
            .iter()
            .filter(|rule| self.is_rule_enabled(rule.name()))
            .map(AsRef::as_ref)
            .collect()
    }
}

impl std::fmt::Debug for BuiltinRuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinRuleSet")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("rules", &self.rule_names())
            .field("enablement", &self.enablement)
            .finish()
    }
}

impl RuleSet for BuiltinRuleSet {
    fn builtin(&self) -> &BuiltinRuleSet {
        self
    }

    fn builtin_mut(&mut self) -> &mut BuiltinRuleSet {
        self
    }
}
