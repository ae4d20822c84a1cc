//! The rule contract and the value-only descriptor that crosses the wire.

use driftcheck_model::Severity;

use crate::error::RuleError;
use crate::runner::Runner;

/// One named check executed against a [`Runner`].
///
/// Default methods provide the common case: enabled by default, error
/// severity, no documentation link. Implement `name` and `check`; override
/// the rest as needed.
///
/// # Example
///
/// ```
/// use driftcheck_sdk::{Rule, RuleError, Runner};
///
/// struct ForceNewLocation;
///
/// impl Rule for ForceNewLocation {
///     fn name(&self) -> &str {
///         "azurerm_force_new_location"
///     }
///
///     fn link(&self) -> &str {
///         "https://example.com/rules/azurerm_force_new_location"
///     }
///
///     fn check(&self, _runner: &mut dyn Runner) -> Result<(), RuleError> {
///         Ok(())
///     }
/// }
/// ```
pub trait Rule: Send + Sync {
    /// Unique rule name, conventionally lowercase with underscores.
    fn name(&self) -> &str;

    /// Whether the rule is enabled by default.
    fn enabled(&self) -> bool {
        true
    }

    /// Default severity for issues this rule emits.
    fn severity(&self) -> Severity {
        Severity::Error
    }

    /// URL of documentation for the rule, empty when there is none.
    fn link(&self) -> &str {
        ""
    }

    /// Executes the rule. Findings go through
    /// [`Runner::emit_issue`]; an `Err` is reserved for unexpected
    /// failures.
    ///
    /// # Errors
    ///
    /// Returns a [`RuleError`] when the check itself fails, not when it
    /// finds issues.
    fn check(&self, runner: &mut dyn Runner) -> Result<(), RuleError>;
}

/// A value-only snapshot of a rule's identity.
///
/// This is what crosses the process boundary when an issue is emitted:
/// name, enablement, severity, and link, never the executable check. The
/// host reconstructs one of these as a read-only stand-in for display and
/// recording.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleDescriptor {
    /// Rule name.
    pub name: String,
    /// Whether the rule was enabled when the issue was emitted.
    pub enabled: bool,
    /// The rule's severity.
    pub severity: Severity,
    /// Documentation link, empty when there is none.
    pub link: String,
}

impl RuleDescriptor {
    /// Snapshots a rule's identity.
    #[must_use]
    pub fn of(rule: &dyn Rule) -> Self {
        Self {
            name: rule.name().to_owned(),
            enabled: rule.enabled(),
            severity: rule.severity(),
            link: rule.link().to_owned(),
        }
    }
}

impl Rule for RuleDescriptor {
    fn name(&self) -> &str {
        &self.name
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn link(&self) -> &str {
        &self.link
    }

    /// A descriptor carries no executable behaviour.
    fn check(&self, _runner: &mut dyn Runner) -> Result<(), RuleError> {
        Ok(())
    }
}
