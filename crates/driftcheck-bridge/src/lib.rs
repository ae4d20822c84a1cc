//! The bidirectional RPC bridge between the driftcheck host and a plugin.
//!
//! A plugin is a separate process the host launches and, after an
//! environment-variable handshake, talks to over multiplexed numbered
//! channels. Two services cooperate per session:
//!
//! - the **forward service** (channel 0): the host drives the plugin —
//!   ruleset metadata, configuration application, and the `check` pass;
//! - the **reverse service** (channel 1): rules running inside the plugin
//!   call back into the host to read old/new configuration content, emit
//!   issues, and fetch per-rule settings.
//!
//! During a `check` call the host runs a reverse-service listener in the
//! background while the plugin iterates its enabled rules; each rule's
//! callbacks travel back over channel 1. One plugin process serves one host
//! session, and the fixed reverse channel id means at most one check pass
//! may be in flight per plugin at a time.
//!
//! The transport is abstracted behind the [`Broker`]/[`Channel`]/
//! [`Listener`] traits with two implementations: [`InMemoryBroker`] for
//! in-process pairs and tests, and [`StdioBroker`] framing messages over a
//! child process's standard I/O.

pub mod broker;
pub mod cancel;
pub mod error;
pub mod host;
pub mod ruleset;
pub mod runner;
pub mod serve;
pub mod stdio;
pub mod wire;

pub use self::broker::{
    Broker, Channel, ChannelId, InMemoryBroker, Incoming, Listener, RULESET_CHANNEL, RUNNER_CHANNEL,
};
pub use self::cancel::CancelToken;
pub use self::error::BridgeError;
pub use self::host::PluginProcess;
pub use self::ruleset::{CheckError, RuleFailures, RulesetClient, RulesetServer};
pub use self::runner::{RunnerClient, RunnerServer};
pub use self::serve::{ServeOpts, serve};
pub use self::stdio::StdioBroker;
