//! Global driftcheck configuration passed to plugins.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::Value;

/// Configuration for a single rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleConfig {
    /// Rule name.
    pub name: String,
    /// Whether the rule is enabled.
    pub enabled: bool,
    /// Opaque rule-specific configuration. Not carried across the process
    /// boundary; rules retrieve it through
    /// [`RunnerExt::decode_rule_config`](crate::RunnerExt::decode_rule_config).
    pub body: Option<Value>,
}

impl RuleConfig {
    /// Creates a rule configuration with no body.
    #[must_use]
    pub fn new(name: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            enabled,
            body: None,
        }
    }
}

/// Global configuration used to enable and disable rules.
///
/// Precedence when deriving enablement (later entries override earlier
/// ones): rule defaults, then [`Config::disabled_by_default`], then
/// [`Config::only`], then per-rule [`RuleConfig::enabled`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    /// Per-rule configuration keyed by rule name.
    pub rules: BTreeMap<String, RuleConfig>,
    /// When true, rules must be explicitly enabled.
    pub disabled_by_default: bool,
    /// When non-empty, only these rules are enabled (subject to per-rule
    /// overrides, which are applied last).
    pub only: Vec<String>,
    /// Directory where plugins are installed.
    pub plugin_dir: Option<PathBuf>,
}

impl Config {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a per-rule configuration entry.
    #[must_use]
    pub fn with_rule(mut self, rule: RuleConfig) -> Self {
        self.rules.insert(rule.name.clone(), rule);
        self
    }
}
