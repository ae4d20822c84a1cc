//! Launching and supervising a plugin subprocess.
//!
//! The host builds a `Command` for the plugin binary; launch adds the
//! handshake environment, pipes the child's stdio, and wires a
//! [`StdioBroker`] over it. Shutdown is graceful first: the session is
//! closed so the plugin sees EOF and exits on its own, with a kill as the
//! fallback after a short grace period.

use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::BridgeError;
use crate::ruleset::RulesetClient;
use crate::serve::{COOKIE_ENV, COOKIE_VALUE, PROTOCOL_VERSION, PROTOCOL_VERSION_ENV};
use crate::stdio::StdioBroker;

/// Log target for plugin process lifecycle.
const HOST_TARGET: &str = "driftcheck_bridge::host";

/// How long shutdown waits for the plugin to exit on its own.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

/// Poll interval while waiting for the child to exit.
const EXIT_POLL: Duration = Duration::from_millis(10);

/// A running plugin subprocess and the session established over its stdio.
pub struct PluginProcess {
    child: std::process::Child,
    broker: StdioBroker,
    client: RulesetClient<StdioBroker>,
}

impl PluginProcess {
    /// Spawns the plugin and establishes the bridge session.
    ///
    /// The command's stdin and stdout become the transport; stderr is
    /// inherited so plugin diagnostics reach the host's own stderr.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError`] when the process cannot be spawned or its
    /// stdio cannot be piped.
    pub fn launch(mut command: Command) -> Result<Self, BridgeError> {
        command
            .env(COOKIE_ENV, COOKIE_VALUE)
            .env(PROTOCOL_VERSION_ENV, PROTOCOL_VERSION.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        let mut child = command
            .spawn()
            .map_err(|err| BridgeError::io("failed to spawn plugin", err))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::transport("plugin stdin was not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::transport("plugin stdout was not piped"))?;

        debug!(target: HOST_TARGET, pid = child.id(), "plugin launched");
        let broker = StdioBroker::new(stdout, stdin);
        let client = RulesetClient::connect(broker.clone())?;
        Ok(Self {
            child,
            broker,
            client,
        })
    }

    /// The forward-service client for this plugin.
    #[must_use]
    pub fn client(&self) -> &RulesetClient<StdioBroker> {
        &self.client
    }

    /// Shuts the plugin down, preferring a clean exit over a kill.
    ///
    /// Closes the session so the plugin's serve loop sees EOF, waits
    /// briefly for it to exit, and kills it if it does not.
    ///
    /// # Errors
    ///
    /// Returns a [`BridgeError`] when the child's state cannot be queried
    /// or it cannot be killed.
    pub fn shutdown(&mut self) -> Result<(), BridgeError> {
        self.broker.close();
        let deadline = Instant::now() + SHUTDOWN_GRACE;
        loop {
            match self
                .child
                .try_wait()
                .map_err(|err| BridgeError::io("failed to query plugin state", err))?
            {
                Some(status) => {
                    debug!(target: HOST_TARGET, %status, "plugin exited");
                    return Ok(());
                }
                None if Instant::now() >= deadline => break,
                None => std::thread::sleep(EXIT_POLL),
            }
        }

        warn!(target: HOST_TARGET, pid = self.child.id(), "plugin did not exit, killing");
        self.child
            .kill()
            .map_err(|err| BridgeError::io("failed to kill plugin", err))?;
        self.child
            .wait()
            .map_err(|err| BridgeError::io("failed to reap plugin", err))?;
        Ok(())
    }
}

impl std::fmt::Debug for PluginProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginProcess")
            .field("child", &self.child)
            .finish_non_exhaustive()
    }
}

impl Drop for PluginProcess {
    /// Best-effort cleanup for hosts that never called
    /// [`PluginProcess::shutdown`].
    fn drop(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
