//! The forward (ruleset) service: host-side client, plugin-side server.
//!
//! The host drives a plugin through [`RulesetClient`]: metadata queries,
//! configuration application, and the `check` pass. On the plugin side
//! [`RulesetServer`] wraps the plugin's [`RuleSet`] and serves those
//! requests, running each check pass by dialling back to the host over the
//! reverse channel and iterating the enabled rules sequentially.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

use driftcheck_model::{BodyContent, BodySchema};
use driftcheck_sdk::{Config, ConfigError, RuleSet, Runner};

use crate::broker::{Broker, Channel, RULESET_CHANNEL, RUNNER_CHANNEL};
use crate::cancel::CancelToken;
use crate::error::BridgeError;
use crate::runner::{RunnerClient, RunnerServer};
use crate::wire;


/// Log target for ruleset service operations.
const RULESET_TARGET: &str = "driftcheck_bridge::ruleset";

/// Deadline for metadata and configuration calls.
const METADATA_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline for one whole check pass.
const CHECK_TIMEOUT: Duration = Duration::from_secs(300);

/// How long the host waits for its reverse listener to confirm readiness
/// before starting the check optimistically.
const READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll window of the server loop; bounds shutdown latency.
const SERVE_POLL: Duration = Duration::from_millis(50);

const NAME: &str = "ruleset/name";
const VERSION: &str = "ruleset/version";
const RULE_NAMES: &str = "ruleset/rule_names";
const VERSION_CONSTRAINT: &str = "ruleset/version_constraint";
const CONFIG_SCHEMA: &str = "ruleset/config_schema";
const APPLY_GLOBAL_CONFIG: &str = "ruleset/apply_global_config";
const APPLY_CONFIG: &str = "ruleset/apply_config";
const CHECK: &str = "ruleset/check";

#[derive(Debug, Serialize, Deserialize)]
struct ApplyGlobalConfigRequest {
    #[serde(default)]
    config: Option<wire::Config>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApplyConfigRequest {
    #[serde(default)]
    content: Option<wire::BodyContent>,
}

/// Wire shape of a completed check request.
///
/// Cancellation and rule failures are outcomes of the pass, not transport
/// faults, so they travel in the response rather than as call errors;
/// the host can then tell a cancelled pass apart from a failed rule.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum CheckResponse {
    Completed,
    Cancelled,
    RulesFailed { failures: Vec<String> },
}

/// The accumulated failures of one check pass.
///
/// Rules fail independently: one rule's error never stops the remaining
/// rules from running, and every failure is reported at the end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleFailures {
    messages: Vec<String>,
}

impl RuleFailures {
    /// Creates an empty failure list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one failure.
    pub fn push(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    /// Whether any rule failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The individual failure messages, in rule execution order.
    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

impl std::fmt::Display for RuleFailures {
    /// A single failure renders verbatim; multiple failures render as a
    /// count followed by the joined messages.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.messages.as_slice() {
            [] => write!(f, "no rules failed"),
            [message] => write!(f, "{message}"),
            messages => write!(
                f,
                "{} rules failed: {}",
                messages.len(),
                messages.join("; ")
            ),
        }
    }
}

/// Errors arising from a check pass.
#[derive(Debug, Error)]
pub enum CheckError {
    /// The pass was cancelled between rules.
    #[error("check cancelled")]
    Cancelled,

    /// One or more rules failed; the rest of the pass still ran.
    #[error("{0}")]
    Rules(RuleFailures),

    /// The bridge itself failed.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// The ruleset rejected its runner or configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Plugin-side dispatch loop wrapping a [`RuleSet`].
pub struct RulesetServer<S> {
    ruleset: S,
}

impl<S: RuleSet> RulesetServer<S> {
    /// Wraps the ruleset this plugin serves.
    #[must_use]
    pub fn new(ruleset: S) -> Self {
        Self { ruleset }
    }

    /// Binds the forward channel and serves requests until the stop token
    /// is cancelled or the host disconnects.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError`] when the channel cannot be bound or the
    /// transport fails mid-session. The host closing the session is a
    /// normal exit, not an error.
    pub fn serve(&mut self, broker: &dyn Broker, stop: &CancelToken) -> Result<(), BridgeError> {
        let mut listener = broker.listen(RULESET_CHANNEL)?;
        debug!(
            target: RULESET_TARGET,
            ruleset = self.ruleset.name(),
            "ruleset server started"
        );
        loop {
            if stop.is_cancelled() {
                debug!(target: RULESET_TARGET, "ruleset server stopped");
                return Ok(());
            }
            match listener.next_incoming(SERVE_POLL) {
                Ok(Some(incoming)) => {
                    let outcome = self.dispatch(broker, incoming.method(), incoming.params(), stop);
                    incoming.respond(outcome);
                }
                Ok(None) => {}
                Err(BridgeError::ChannelClosed { .. }) => {
                    debug!(target: RULESET_TARGET, "host disconnected");
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn dispatch(
        &mut self,
        broker: &dyn Broker,
        method: &str,
        params: &Value,
        stop: &CancelToken,
    ) -> Result<Value, String> {
        match method {
            NAME => Ok(json!(self.ruleset.name())),
            VERSION => Ok(json!(self.ruleset.version())),
            RULE_NAMES => Ok(json!(self.ruleset.rule_names())),
            VERSION_CONSTRAINT => Ok(json!(self.ruleset.version_constraint())),
            CONFIG_SCHEMA => {
                let schema = self.ruleset.config_schema().map(|s| wire::BodySchema::from(&s));
                encode_result(&schema)
            }
            APPLY_GLOBAL_CONFIG => {
                let request: ApplyGlobalConfigRequest = decode_params(params)?;
                let config: Option<Config> = request.config.map(Into::into);
                self.ruleset
                    .apply_global_config(config.as_ref())
                    .map_err(|err| err.to_string())?;
                Ok(Value::Null)
            }
            APPLY_CONFIG => {
                let request: ApplyConfigRequest = decode_params(params)?;
                let content: Option<BodyContent> = request.content.map(Into::into);
                self.ruleset
                    .apply_config(content.as_ref())
                    .map_err(|err| err.to_string())?;
                Ok(Value::Null)
            }
            CHECK => match self.run_check(broker, stop) {
                Ok(()) => encode_result(&CheckResponse::Completed),
                Err(CheckError::Cancelled) => encode_result(&CheckResponse::Cancelled),
                Err(CheckError::Rules(failures)) => encode_result(&CheckResponse::RulesFailed {
                    failures: failures.messages().to_vec(),
                }),
                Err(err) => Err(err.to_string()),
            },
            other => {
                warn!(target: RULESET_TARGET, method = other, "unknown ruleset method");
                Err(format!("unknown ruleset method '{other}'"))
            }
        }
    }

    /// Runs one check pass: dial the reverse channel, wrap the client in
    /// the ruleset's runner, then run every enabled rule in registration
    /// order. Rule failures are collected; transport and configuration
    /// failures abort the pass.
    fn run_check(&mut self, broker: &dyn Broker, stop: &CancelToken) -> Result<(), CheckError> {
        let channel = broker.dial(RUNNER_CHANNEL)?;
        let client = RunnerClient::new(channel);
        let mut runner = self.ruleset.new_runner(Box::new(client))?;

        let mut failures = RuleFailures::new();
        for rule in self.ruleset.builtin().enabled_rules() {
            if stop.is_cancelled() {
                return Err(CheckError::Cancelled);
            }
            debug!(target: RULESET_TARGET, rule = rule.name(), "running rule");
            if let Err(err) = rule.check(runner.as_mut()) {
                failures.push(format!("rule {}: {err}", rule.name()));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CheckError::Rules(failures))
        }
    }
}

/// Host-side client for a plugin's ruleset service.
pub struct RulesetClient<B> {
    broker: B,
    channel: Box<dyn Channel>,
}

impl<B: Broker> RulesetClient<B> {
    /// Dials the forward channel on an established session.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError`] when the plugin has not bound the forward
    /// channel within the dial window.
    pub fn connect(broker: B) -> Result<Self, BridgeError> {
        let channel = broker.dial(RULESET_CHANNEL)?;
        Ok(Self { broker, channel })
    }

    /// Ruleset name. Falls back to an empty string when the plugin cannot
    /// be reached; metadata is advisory and never aborts a session.
    #[must_use]
    pub fn name(&self) -> String {
        self.metadata(NAME)
    }

    /// Ruleset version, with the same fallback behaviour as
    /// [`RulesetClient::name`].
    #[must_use]
    pub fn version(&self) -> String {
        self.metadata(VERSION)
    }

    /// Names of every rule the plugin registers.
    #[must_use]
    pub fn rule_names(&self) -> Vec<String> {
        self.metadata(RULE_NAMES)
    }

    /// The host version constraint the plugin declares.
    #[must_use]
    pub fn version_constraint(&self) -> String {
        self.metadata(VERSION_CONSTRAINT)
    }

    /// Schema for the plugin's own configuration block, when it takes one.
    #[must_use]
    pub fn config_schema(&self) -> Option<BodySchema> {
        let schema: Option<wire::BodySchema> = self.metadata(CONFIG_SCHEMA);
        schema.map(Into::into)
    }

    fn metadata<T: DeserializeOwned + Default>(&self, method: &str) -> T {
        match self.channel.call(method, Value::Null, METADATA_TIMEOUT) {
            Ok(value) => serde_json::from_value(value).unwrap_or_else(|err| {
                warn!(target: RULESET_TARGET, method, error = %err, "malformed metadata response");
                T::default()
            }),
            Err(err) => {
                warn!(target: RULESET_TARGET, method, error = %err, "metadata call failed");
                T::default()
            }
        }
    }

    /// Sends global configuration to the plugin.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError`] when the call fails or the plugin rejects
    /// the configuration; unlike metadata, configuration failures are
    /// fatal.
    pub fn apply_global_config(&self, config: Option<&Config>) -> Result<(), BridgeError> {
        let request = ApplyGlobalConfigRequest {
            config: config.map(Into::into),
        };
        self.channel
            .call(APPLY_GLOBAL_CONFIG, serde_json::to_value(&request)?, METADATA_TIMEOUT)?;
        Ok(())
    }

    /// Sends the plugin-specific configuration block to the plugin.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError`] when the call fails or the plugin rejects
    /// the content.
    pub fn apply_config(&self, content: Option<&BodyContent>) -> Result<(), BridgeError> {
        let request = ApplyConfigRequest {
            content: content.map(Into::into),
        };
        self.channel
            .call(APPLY_CONFIG, serde_json::to_value(&request)?, METADATA_TIMEOUT)?;
        Ok(())
    }

    /// Runs one check pass against the plugin.
    ///
    /// The given runner serves the plugin's callbacks for the duration of
    /// the pass: a background listener binds the reverse channel, its
    /// readiness is awaited briefly, then the `check` request is issued and
    /// callbacks flow until it completes. The listener is stopped and
    /// joined before this returns, so the runner is quiescent again on
    /// exit.
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::Rules`] when the plugin reports failed rules,
    /// [`CheckError::Cancelled`] when the plugin's pass was cancelled
    /// between rules, or [`CheckError::Bridge`] on transport failures.
    pub fn check<R: Runner + Send>(&self, runner: &mut R) -> Result<(), CheckError> {
        let stop = CancelToken::new();
        let broker = &self.broker;
        thread::scope(|scope| {
            let (ready_send, ready_recv) = mpsc::channel();
            let server_stop = stop.clone();
            let server = scope.spawn(move || -> Result<(), BridgeError> {
                let mut listener = broker.listen(RUNNER_CHANNEL)?;
                let _ = ready_send.send(());
                RunnerServer::new(runner).serve(listener.as_mut(), &server_stop)
            });

            if ready_recv.recv_timeout(READY_TIMEOUT).is_err() {
                // Proceed anyway; the plugin's dial has its own grace
                // window.
                warn!(
                    target: RULESET_TARGET,
                    "reverse listener readiness not confirmed"
                );
            }

            let outcome = self.channel.call(CHECK, Value::Null, CHECK_TIMEOUT);
            stop.cancel();
            match server.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(target: RULESET_TARGET, error = %err, "reverse listener failed");
                }
                Err(_) => {
                    return Err(CheckError::Bridge(BridgeError::transport(
                        "reverse listener panicked",
                    )));
                }
            }

            match outcome {
                Ok(value) => match serde_json::from_value(value) {
                    Ok(CheckResponse::Completed) => Ok(()),
                    Ok(CheckResponse::Cancelled) => Err(CheckError::Cancelled),
                    Ok(CheckResponse::RulesFailed { failures: messages }) => {
                        Err(CheckError::Rules(RuleFailures { messages }))
                    }
                    Err(err) => Err(CheckError::Bridge(BridgeError::Codec(err))),
                },
                Err(err) => Err(CheckError::Bridge(err)),
            }
        })
    }
}

fn decode_params<T: DeserializeOwned>(params: &Value) -> Result<T, String> {
    serde_json::from_value(params.clone())
        .map_err(|err| format!("malformed request parameters: {err}"))
}

fn encode_result(result: &impl Serialize) -> Result<Value, String> {
    serde_json::to_value(result).map_err(|err| format!("failed to encode response: {err}"))
}
