//! Plugin entry point: handshake validation and the serve loop.
//!
//! A plugin binary's `main` builds its [`RuleSet`] and hands it to
//! [`serve`]. The handshake is an environment-variable cookie plus a
//! protocol version the launching host sets; it is not a security boundary,
//! only protection against a user running the plugin binary directly. On a
//! mismatch the plugin prints its identity to stderr and exits without ever
//! touching its stdio streams as a transport.

use std::collections::HashMap;
use std::io::Write;

use tracing::debug;

use driftcheck_sdk::RuleSet;

use crate::broker::Broker;
use crate::cancel::CancelToken;
use crate::error::BridgeError;
use crate::ruleset::RulesetServer;
use crate::stdio::StdioBroker;

/// Log target for plugin bootstrap.
const SERVE_TARGET: &str = "driftcheck_bridge::serve";

/// Environment variable carrying the handshake cookie.
pub const COOKIE_ENV: &str = "DRIFTCHECK_PLUGIN_COOKIE";

/// The handshake cookie value. Shared by host and plugin; arbitrary but
/// fixed for all time.
pub const COOKIE_VALUE: &str = "e09c6d285d385e6b64b50d1a73caf9a57e69acba";

/// Environment variable carrying the protocol version.
pub const PROTOCOL_VERSION_ENV: &str = "DRIFTCHECK_PROTOCOL_VERSION";

/// The bridge protocol version this crate speaks.
pub const PROTOCOL_VERSION: u32 = 1;

/// Options for [`serve`].
#[derive(Debug, Clone, Default)]
pub struct ServeOpts {
    /// Token halting the serve loop; embedders keep a clone to shut the
    /// plugin down from another thread. The loop also exits when the host
    /// disconnects.
    pub stop: CancelToken,
}

/// Serves a ruleset over the process's standard I/O.
///
/// Returns without serving when the handshake environment variables are
/// absent or wrong, after printing the plugin's identity to stderr.
///
/// # Errors
///
/// Returns a [`BridgeError`] when the ruleset is malformed or the
/// transport fails mid-session.
pub fn serve<S: RuleSet>(ruleset: S, opts: &ServeOpts) -> Result<(), BridgeError> {
    let env: HashMap<String, String> = std::env::vars().collect();
    serve_session(
        ruleset,
        opts,
        &env,
        || StdioBroker::new(std::io::stdin(), std::io::stdout()),
        &mut std::io::stderr().lock(),
    )
}

/// [`serve`] with its environment, transport, and diagnostic stream made
/// explicit.
pub(crate) fn serve_session<S: RuleSet, B: Broker>(
    ruleset: S,
    opts: &ServeOpts,
    env: &HashMap<String, String>,
    make_broker: impl FnOnce() -> B,
    diagnostics: &mut impl Write,
) -> Result<(), BridgeError> {
    validate_ruleset(&ruleset)?;

    if !handshake_matches(env) {
        // Lost replies aside, a failed write here has nowhere to go.
        let _ = write_direct_invocation_notice(&ruleset, diagnostics);
        return Ok(());
    }

    debug!(
        target: SERVE_TARGET,
        ruleset = ruleset.name(),
        version = ruleset.version(),
        "handshake accepted, serving"
    );
    let broker = make_broker();
    RulesetServer::new(ruleset).serve(&broker, &opts.stop)
}

/// Whether the launching process presented the expected cookie and
/// protocol version.
fn handshake_matches(env: &HashMap<String, String>) -> bool {
    let cookie_ok = env.get(COOKIE_ENV).is_some_and(|value| value == COOKIE_VALUE);
    let version_ok = env
        .get(PROTOCOL_VERSION_ENV)
        .and_then(|value| value.parse::<u32>().ok())
        .is_some_and(|version| version == PROTOCOL_VERSION);
    cookie_ok && version_ok
}

/// A plugin needs at least an identity before it can serve.
fn validate_ruleset<S: RuleSet>(ruleset: &S) -> Result<(), BridgeError> {
    if ruleset.name().is_empty() {
        return Err(BridgeError::Handshake {
            message: "ruleset has no name".into(),
        });
    }
    if ruleset.version().is_empty() {
        return Err(BridgeError::Handshake {
            message: "ruleset has no version".into(),
        });
    }
    Ok(())
}

/// The message a user sees when running the plugin binary by hand.
fn write_direct_invocation_notice<S: RuleSet>(
    ruleset: &S,
    out: &mut impl Write,
) -> std::io::Result<()> {
    writeln!(
        out,
        "{} {} is a driftcheck plugin and cannot be run directly.",
        ruleset.name(),
        ruleset.version()
    )?;
    writeln!(out, "rules:")?;
    for name in ruleset.rule_names() {
        writeln!(out, "  {name}")?;
    }
    Ok(())
}
