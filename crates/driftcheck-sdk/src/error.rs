//! Domain errors raised by rules, runners, and configuration application.
//!
//! All errors use `thiserror`-derived enums with structured context so
//! callers can inspect the failure programmatically.

use thiserror::Error;

/// Errors arising from applying global or plugin-specific configuration.
///
/// Configuration failures are fatal: they propagate to the caller
/// immediately and are never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration was rejected by the ruleset.
    #[error("invalid configuration: {message}")]
    Invalid {
        /// Human-readable rejection reason.
        message: String,
    },
}

impl ConfigError {
    /// Creates an invalid-configuration error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// Errors arising from runner operations.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The call could not reach the other side of the bridge.
    #[error("transport failure: {message}")]
    Transport {
        /// Human-readable failure description.
        message: String,
    },

    /// Content extraction failed on the implementing side.
    #[error("{message}")]
    Content {
        /// Human-readable failure description.
        message: String,
    },

    /// A rule's configuration payload did not match the target shape.
    #[error("failed to decode configuration for rule '{rule}'")]
    DecodeConfig {
        /// Rule whose configuration was requested.
        rule: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl RunnerError {
    /// Creates a transport failure.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a content extraction failure.
    #[must_use]
    pub fn content(message: impl Into<String>) -> Self {
        Self::Content {
            message: message.into(),
        }
    }
}

/// Errors returned from a rule's check.
///
/// A rule returns an error only for unexpected failures; findings are
/// reported through [`Runner::emit_issue`](crate::Runner::emit_issue) and
/// are not errors.
#[derive(Debug, Error)]
pub enum RuleError {
    /// The rule failed for a rule-specific reason.
    #[error("{message}")]
    Failed {
        /// Human-readable failure description.
        message: String,
    },

    /// A runner operation failed during the check.
    #[error(transparent)]
    Runner(#[from] RunnerError),
}

impl RuleError {
    /// Creates a rule-specific failure.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }
}
