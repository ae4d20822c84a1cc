//! The reverse (runner) service: plugin-side client, host-side server.
//!
//! During a check pass the host listens on the runner channel and the
//! plugin dials back over it. [`RunnerClient`] implements the SDK's
//! [`Runner`] trait on top of that channel, so a rule body is oblivious to
//! the process boundary. [`RunnerServer`] is the host-side dispatch loop
//! wrapping whatever real runner the host supplies.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use driftcheck_model::{BodyContent, BodySchema, Range};
use driftcheck_sdk::{
    ModuleContentOptions, Rule, RuleDescriptor, Runner, RunnerError,
};

use crate::broker::{Channel, Listener};
use crate::cancel::CancelToken;
use crate::error::BridgeError;
use crate::wire;


/// Log target for runner service operations.
const RUNNER_TARGET: &str = "driftcheck_bridge::runner";

/// Deadline for one runner call. Content extraction is local work on the
/// host, so anything slower than this indicates a wedged host.
const RUNNER_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Poll window of the server loop; bounds shutdown latency.
const SERVE_POLL: Duration = Duration::from_millis(50);

const OLD_MODULE_CONTENT: &str = "runner/old_module_content";
const NEW_MODULE_CONTENT: &str = "runner/new_module_content";
const OLD_RESOURCE_CONTENT: &str = "runner/old_resource_content";
const NEW_RESOURCE_CONTENT: &str = "runner/new_resource_content";
const EMIT_ISSUE: &str = "runner/emit_issue";
const RULE_CONFIG: &str = "runner/rule_config";

#[derive(Debug, Serialize, Deserialize)]
struct ModuleContentRequest {
    schema: wire::BodySchema,
    #[serde(default)]
    options: Option<wire::ModuleContentOptions>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResourceContentRequest {
    resource_type: String,
    schema: wire::BodySchema,
    #[serde(default)]
    options: Option<wire::ModuleContentOptions>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EmitIssueRequest {
    #[serde(default)]
    rule: Option<wire::Rule>,
    message: String,
    range: wire::Range,
}

#[derive(Debug, Serialize, Deserialize)]
struct RuleConfigRequest {
    rule_name: String,
}

/// `has_config` distinguishes "no configuration stanza" from a present but
/// empty one; only a present stanza carries a payload.
#[derive(Debug, Serialize, Deserialize)]
struct RuleConfigResponse {
    has_config: bool,
    #[serde(default)]
    payload: Option<Value>,
}

fn to_runner_error(err: BridgeError) -> RunnerError {
    match err {
        BridgeError::Remote { message } => RunnerError::content(message),
        other => RunnerError::transport(other.to_string()),
    }
}

/// Plugin-side [`Runner`] backed by the reverse channel.
///
/// Every method is one synchronous call back into the host; failures
/// surface as [`RunnerError`] so rule code never sees transport types.
pub struct RunnerClient {
    channel: Box<dyn Channel>,
}

impl RunnerClient {
    /// Wraps a dialled runner channel.
    #[must_use]
    pub fn new(channel: Box<dyn Channel>) -> Self {
        Self { channel }
    }

    fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        request: &impl Serialize,
    ) -> Result<T, RunnerError> {
        let params = serde_json::to_value(request)
            .map_err(|err| RunnerError::transport(format!("failed to encode request: {err}")))?;
        let result = self
            .channel
            .call(method, params, RUNNER_CALL_TIMEOUT)
            .map_err(to_runner_error)?;
        serde_json::from_value(result)
            .map_err(|err| RunnerError::transport(format!("failed to decode response: {err}")))
    }

    fn module_content(
        &self,
        method: &str,
        schema: &BodySchema,
        options: Option<&ModuleContentOptions>,
    ) -> Result<BodyContent, RunnerError> {
        let request = ModuleContentRequest {
            schema: schema.into(),
            options: options.map(Into::into),
        };
        let content: wire::BodyContent = self.call(method, &request)?;
        Ok(content.into())
    }

    fn resource_content(
        &self,
        method: &str,
        resource_type: &str,
        schema: &BodySchema,
        options: Option<&ModuleContentOptions>,
    ) -> Result<BodyContent, RunnerError> {
        let request = ResourceContentRequest {
            resource_type: resource_type.to_owned(),
            schema: schema.into(),
            options: options.map(Into::into),
        };
        let content: wire::BodyContent = self.call(method, &request)?;
        Ok(content.into())
    }
}

impl Runner for RunnerClient {
    fn get_old_module_content(
        &mut self,
        schema: &BodySchema,
        options: Option<&ModuleContentOptions>,
    ) -> Result<BodyContent, RunnerError> {
        self.module_content(OLD_MODULE_CONTENT, schema, options)
    }

    fn get_new_module_content(
        &mut self,
        schema: &BodySchema,
        options: Option<&ModuleContentOptions>,
    ) -> Result<BodyContent, RunnerError> {
        self.module_content(NEW_MODULE_CONTENT, schema, options)
    }

    fn get_old_resource_content(
        &mut self,
        resource_type: &str,
        schema: &BodySchema,
        options: Option<&ModuleContentOptions>,
    ) -> Result<BodyContent, RunnerError> {
        self.resource_content(OLD_RESOURCE_CONTENT, resource_type, schema, options)
    }

    fn get_new_resource_content(
        &mut self,
        resource_type: &str,
        schema: &BodySchema,
        options: Option<&ModuleContentOptions>,
    ) -> Result<BodyContent, RunnerError> {
        self.resource_content(NEW_RESOURCE_CONTENT, resource_type, schema, options)
    }

    fn emit_issue(
        &mut self,
        rule: Option<&dyn Rule>,
        message: &str,
        issue_range: Range,
    ) -> Result<(), RunnerError> {
        let request = EmitIssueRequest {
            rule: rule.map(|rule| wire::Rule::from(&RuleDescriptor::of(rule))),
            message: message.to_owned(),
            range: (&issue_range).into(),
        };
        self.call::<Value>(EMIT_ISSUE, &request)?;
        Ok(())
    }

    fn rule_config(&mut self, rule_name: &str) -> Result<Option<Value>, RunnerError> {
        let request = RuleConfigRequest {
            rule_name: rule_name.to_owned(),
        };
        let response: RuleConfigResponse = self.call(RULE_CONFIG, &request)?;
        if !response.has_config {
            return Ok(None);
        }
        Ok(response.payload.filter(|payload| !payload.is_null()))
    }
}

/// Host-side dispatch loop for the runner channel.
///
/// Wraps the host's real runner for the duration of one check pass. Issues
/// emitted with a rule attached arrive as value descriptors; the server
/// hands the descriptor to the wrapped runner as a read-only rule.
pub struct RunnerServer<'r> {
    runner: &'r mut dyn Runner,
}

impl<'r> RunnerServer<'r> {
    /// Wraps the runner that will serve this check pass.
    #[must_use]
    pub fn new(runner: &'r mut dyn Runner) -> Self {
        Self { runner }
    }

    /// Serves requests until the stop token is cancelled or the peer
    /// disconnects. A closed channel is a normal end of the pass, not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError`] on transport failures other than the
    /// peer closing the channel.
    pub fn serve(
        &mut self,
        listener: &mut dyn Listener,
        stop: &CancelToken,
    ) -> Result<(), BridgeError> {
        loop {
            if stop.is_cancelled() {
                debug!(target: RUNNER_TARGET, "runner server stopped");
                return Ok(());
            }
            match listener.next_incoming(SERVE_POLL) {
                Ok(Some(incoming)) => {
                    let outcome = self.dispatch(incoming.method(), incoming.params());
                    incoming.respond(outcome);
                }
                Ok(None) => {}
                Err(BridgeError::ChannelClosed { .. }) => {
                    debug!(target: RUNNER_TARGET, "runner channel closed");
                    return Ok(());
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn dispatch(&mut self, method: &str, params: &Value) -> Result<Value, String> {
        match method {
            OLD_MODULE_CONTENT => {
                self.module_content(params, |runner, schema, options| {
                    runner.get_old_module_content(schema, options)
                })
            }
            NEW_MODULE_CONTENT => {
                self.module_content(params, |runner, schema, options| {
                    runner.get_new_module_content(schema, options)
                })
            }
            OLD_RESOURCE_CONTENT => {
                self.resource_content(params, |runner, resource_type, schema, options| {
                    runner.get_old_resource_content(resource_type, schema, options)
                })
            }
            NEW_RESOURCE_CONTENT => {
                self.resource_content(params, |runner, resource_type, schema, options| {
                    runner.get_new_resource_content(resource_type, schema, options)
                })
            }
            EMIT_ISSUE => self.emit_issue(params),
            RULE_CONFIG => self.rule_config(params),
            other => {
                warn!(target: RUNNER_TARGET, method = other, "unknown runner method");
                Err(format!("unknown runner method '{other}'"))
            }
        }
    }

    fn module_content(
        &mut self,
        params: &Value,
        get: fn(
            &mut dyn Runner,
            &BodySchema,
            Option<&ModuleContentOptions>,
        ) -> Result<BodyContent, RunnerError>,
    ) -> Result<Value, String> {
        let request: ModuleContentRequest = decode_params(params)?;
        let schema: BodySchema = request.schema.into();
        let options: Option<ModuleContentOptions> = request.options.map(Into::into);
        let content =
            get(self.runner, &schema, options.as_ref()).map_err(|err| err.to_string())?;
        encode_result(&wire::BodyContent::from(&content))
    }

    fn resource_content(
        &mut self,
        params: &Value,
        get: fn(
            &mut dyn Runner,
            &str,
            &BodySchema,
            Option<&ModuleContentOptions>,
        ) -> Result<BodyContent, RunnerError>,
    ) -> Result<Value, String> {
        let request: ResourceContentRequest = decode_params(params)?;
        let schema: BodySchema = request.schema.into();
        let options: Option<ModuleContentOptions> = request.options.map(Into::into);
        let content = get(
            self.runner,
            &request.resource_type,
            &schema,
            options.as_ref(),
        )
        .map_err(|err| err.to_string())?;
        encode_result(&wire::BodyContent::from(&content))
    }

    fn emit_issue(&mut self, params: &Value) -> Result<Value, String> {
        let request: EmitIssueRequest = decode_params(params)?;
        let descriptor: Option<RuleDescriptor> = request.rule.map(Into::into);
        self.runner
            .emit_issue(
                descriptor.as_ref().map(|rule| rule as &dyn Rule),
                &request.message,
                request.range.into(),
            )
            .map_err(|err| err.to_string())?;
        Ok(Value::Null)
    }

    fn rule_config(&mut self, params: &Value) -> Result<Value, String> {
        let request: RuleConfigRequest = decode_params(params)?;
        let payload = self
            .runner
            .rule_config(&request.rule_name)
            .map_err(|err| err.to_string())?;
        encode_result(&RuleConfigResponse {
            has_config: payload.is_some(),
            payload,
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
