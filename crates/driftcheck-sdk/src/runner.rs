//! The runner contract: how a rule reads configuration and reports findings.
//!
//! driftcheck compares two configurations, so every content accessor comes
//! in an old (baseline) and a new (candidate) variant. Issue ranges should
//! point into the new configuration, where the offending change was made.

use driftcheck_model::{BodyContent, BodySchema, Range};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::RunnerError;
use crate::rule::Rule;

/// Which module context content is retrieved from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModuleCtx {
    /// The current module only.
    #[default]
    Current,
    /// The root module.
    Root,
    /// All modules.
    All,
}

/// How dynamic blocks are handled during retrieval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExpandMode {
    /// Dynamic blocks are returned as written.
    #[default]
    None,
    /// Dynamic blocks are expanded.
    Expand,
}

/// Options for module content retrieval.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleContentOptions {
    /// Module context to retrieve from.
    pub module_ctx: ModuleCtx,
    /// Dynamic block handling.
    pub expand_mode: ExpandMode,
    /// Optional resource type hint for the implementation to pre-filter.
    pub resource_type_hint: Option<String>,
}

/// The capability set a rule uses during its check.
///
/// Implementations exist on both sides of the process boundary: the plugin
/// side is an RPC client calling back into the host, the host side wraps
/// the actual configuration store, and the test harness records issues
/// in-process.
pub trait Runner {
    /// Retrieves module content from the old (baseline) configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`RunnerError`] when retrieval fails.
    fn get_old_module_content(
        &mut self,
        schema: &BodySchema,
        options: Option<&ModuleContentOptions>,
    ) -> Result<BodyContent, RunnerError>;

    /// Retrieves module content from the new (candidate) configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`RunnerError`] when retrieval fails.
    fn get_new_module_content(
        &mut self,
        schema: &BodySchema,
        options: Option<&ModuleContentOptions>,
    ) -> Result<BodyContent, RunnerError>;

    /// Retrieves resources of `resource_type` from the old configuration.
    ///
    /// Convenience over [`Runner::get_old_module_content`]: wraps `schema`
    /// in a `resource` block schema with type and name labels and keeps
    /// only blocks whose first label equals `resource_type`.
    ///
    /// # Errors
    ///
    /// Returns a [`RunnerError`] when retrieval fails.
    fn get_old_resource_content(
        &mut self,
        resource_type: &str,
        schema: &BodySchema,
        options: Option<&ModuleContentOptions>,
    ) -> Result<BodyContent, RunnerError>;

    /// Retrieves resources of `resource_type` from the new configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`RunnerError`] when retrieval fails.
    fn get_new_resource_content(
        &mut self,
        resource_type: &str,
        schema: &BodySchema,
        options: Option<&ModuleContentOptions>,
    ) -> Result<BodyContent, RunnerError>;

    /// Reports a finding.
    ///
    /// `rule` may be absent when the caller has no rule identity to attach;
    /// the finding is still recorded with whatever fields are present.
    ///
    /// # Errors
    ///
    /// Returns a [`RunnerError`] when the finding cannot be recorded.
    fn emit_issue(
        &mut self,
        rule: Option<&dyn Rule>,
        message: &str,
        issue_range: Range,
    ) -> Result<(), RunnerError>;

    /// Retrieves the raw configuration for a named rule.
    ///
    /// Returns `Ok(None)` when no configuration exists for the rule. Most
    /// rules use [`RunnerExt::decode_rule_config`] instead.
    ///
    /// # Errors
    ///
    /// Returns a [`RunnerError`] when retrieval fails.
    fn rule_config(&mut self, rule_name: &str) -> Result<Option<Value>, RunnerError>;
}

/// Typed convenience over [`Runner::rule_config`].
///
/// A blanket impl covers every runner, including trait objects.
pub trait RunnerExt: Runner {
    /// Retrieves and decodes the configuration for a named rule.
    ///
    /// Returns `Ok(None)`, leaving nothing decoded, when the rule has no
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::DecodeConfig`] when the payload does not
    /// match `T`, or any retrieval error from the underlying runner.
    fn decode_rule_config<T: DeserializeOwned>(
        &mut self,
        rule_name: &str,
    ) -> Result<Option<T>, RunnerError> {
        match self.rule_config(rule_name)? {
            None => Ok(None),
            Some(value) => serde_json::from_value(value).map(Some).map_err(|source| {
                RunnerError::DecodeConfig {
                    rule: rule_name.to_owned(),
                    source,
                }
            }),
        }
    }
}

impl<R: Runner + ?Sized> RunnerExt for R {}

#[cfg(test)]
mod tests {
    #![expect(clippy::expect_used, reason = "tests use expect for clarity")]

    use rstest::rstest;
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    /// Runner stub that serves a fixed rule-config payload.
    struct ConfigOnlyRunner {
        payload: Option<Value>,
    }

    impl Runner for ConfigOnlyRunner {
        fn get_old_module_content(
            &mut self,
            _schema: &BodySchema,
            _options: Option<&ModuleContentOptions>,
        ) -> Result<BodyContent, RunnerError> {
            Ok(BodyContent::new())
        }

        fn get_new_module_content(
            &mut self,
            _schema: &BodySchema,
            _options: Option<&ModuleContentOptions>,
        ) -> Result<BodyContent, RunnerError> {
            Ok(BodyContent::new())
        }

        fn get_old_resource_content(
            &mut self,
            _resource_type: &str,
            _schema: &BodySchema,
            _options: Option<&ModuleContentOptions>,
        ) -> Result<BodyContent, RunnerError> {
            Ok(BodyContent::new())
        }

        fn get_new_resource_content(
            &mut self,
            _resource_type: &str,
            _schema: &BodySchema,
            _options: Option<&ModuleContentOptions>,
        ) -> Result<BodyContent, RunnerError> {
            Ok(BodyContent::new())
        }

        fn emit_issue(
            &mut self,
            _rule: Option<&dyn Rule>,
            _message: &str,
            _issue_range: Range,
        ) -> Result<(), RunnerError> {
            Ok(())
        }

        fn rule_config(&mut self, _rule_name: &str) -> Result<Option<Value>, RunnerError> {
            Ok(self.payload.clone())
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct IgnoreConfig {
        ignore_patterns: Vec<String>,
    }

    #[rstest]
    fn decode_rule_config_decodes_payload() {
        let mut runner = ConfigOnlyRunner {
            payload: Some(json!({"ignore_patterns": ["tmp_*"]})),
        };
        let decoded: Option<IgnoreConfig> = runner
            .decode_rule_config("my_rule")
            .expect("decode succeeds");
        assert_eq!(
            decoded,
            Some(IgnoreConfig {
                ignore_patterns: vec!["tmp_*".into()]
            })
        );
    }

    #[rstest]
    fn decode_rule_config_passes_through_missing_config() {
        let mut runner = ConfigOnlyRunner { payload: None };
        let decoded: Option<IgnoreConfig> = runner
            .decode_rule_config("my_rule")
            .expect("absent config is not an error");
        assert!(decoded.is_none());
    }

    #[rstest]
    fn decode_rule_config_reports_shape_mismatch() {
        let mut runner = ConfigOnlyRunner {
            payload: Some(json!({"ignore_patterns": 7})),
        };
        let err = runner
            .decode_rule_config::<IgnoreConfig>("my_rule")
            .expect_err("shape mismatch fails");
        assert!(matches!(err, RunnerError::DecodeConfig { ref rule, .. } if rule == "my_rule"));
    }
}
