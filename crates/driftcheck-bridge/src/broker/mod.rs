//! The multiplexed channel abstraction the bridge runs over.
//!
//! A [`Broker`] hands out numbered channels on a single transport session.
//! Either side may [`Broker::listen`] on a channel id and the other side
//! [`Broker::dial`] it; every call is a synchronous request/response
//! bounded by a caller-supplied deadline. Channel 0 carries the forward
//! ruleset service and channel 1 the reverse runner service; the fixed
//! reverse id is why only one check pass may be in flight against a plugin
//! at a time.
//!
//! [`InMemoryBroker`] connects a host half and a plugin half inside one
//! process. The subprocess transport lives in [`crate::stdio`].

use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::debug;

use crate::error::BridgeError;

/// Log target for broker operations.
const BROKER_TARGET: &str = "driftcheck_bridge::broker";

/// Identifies one multiplexed channel within a session.
pub type ChannelId = u32;

/// Channel carrying the forward (ruleset) service.
pub const RULESET_CHANNEL: ChannelId = 0;

/// Channel carrying the reverse (runner) service. Fixed and well-known:
/// one runner channel per check call, never pooled.
pub const RUNNER_CHANNEL: ChannelId = 1;

/// How long a dial waits for a listener to appear.
const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a remote call as it travels back over the wire: the
/// handler's JSON result or its failure message.
pub type CallOutcome = Result<Value, String>;

/// The calling end of a channel.
pub trait Channel: Send {
    /// Performs one synchronous request/response exchange.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Timeout`] when the deadline elapses,
    /// [`BridgeError::Remote`] when the remote handler reports a failure,
    /// or a transport error when the channel breaks.
    fn call(&self, method: &str, params: Value, deadline: Duration) -> Result<Value, BridgeError>;
}

/// Replies to a single incoming request.
pub trait Responder: Send {
    /// Sends the outcome back to the caller. Consumes the responder; each
    /// request is answered exactly once.
    fn respond(self: Box<Self>, outcome: CallOutcome);
}

/// One request received by a listener, with its reply handle.
pub struct Incoming {
    method: String,
    params: Value,
    responder: Box<dyn Responder>,
}

impl Incoming {
    /// Creates an incoming request. Transport implementations use this;
    /// services only consume it.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value, responder: Box<dyn Responder>) -> Self {
        Self {
            method: method.into(),
            params,
            responder,
        }
    }

    /// The method being invoked.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The request parameters.
    #[must_use]
    pub fn params(&self) -> &Value {
        &self.params
    }

    /// Consumes the request, sending its outcome back to the caller.
    pub fn respond(self, outcome: CallOutcome) {
        self.responder.respond(outcome);
    }
}

impl std::fmt::Debug for Incoming {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Incoming")
            .field("method", &self.method)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// The serving end of a channel.
pub trait Listener: Send {
    /// Waits up to `poll` for the next request.
    ///
    /// Returns `Ok(None)` when the poll window elapses with nothing to
    /// serve; callers loop, checking their shutdown condition between
    /// polls so an in-flight request always finishes before shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ChannelClosed`] once the peer is gone.
    fn next_incoming(&mut self, poll: Duration) -> Result<Option<Incoming>, BridgeError>;
}

/// Hands out numbered channels on one transport session.
pub trait Broker: Send + Sync {
    /// Opens the calling end of a channel, waiting briefly for the remote
    /// listener where the transport requires one.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NoListener`] when no listener appears within
    /// the dial window.
    fn dial(&self, id: ChannelId) -> Result<Box<dyn Channel>, BridgeError>;

    /// Binds the serving end of a channel. Rebinding an id replaces the
    /// previous listener.
    ///
    /// # Errors
    ///
    /// Returns a transport error when the session can no longer accept
    /// channels.
    fn listen(&self, id: ChannelId) -> Result<Box<dyn Listener>, BridgeError>;
}

/// One request in flight between the two in-memory halves.
struct Envelope {
    method: String,
    params: Value,
    reply: mpsc::Sender<CallOutcome>,
}

/// A bound listener entry. The generation distinguishes a rebinding of
/// the same id so a stale listener's drop cannot unbind its successor.
struct Binding {
    generation: u64,
    sender: mpsc::Sender<Envelope>,
}

/// Shared state of an in-memory session.
#[derive(Default)]
struct SessionState {
    listeners: Mutex<HashMap<ChannelId, Binding>>,
    registered: Condvar,
    generations: std::sync::atomic::AtomicU64,
}

/// An in-process broker connecting a host half and a plugin half.
///
/// Cloning yields another handle onto the same session, so one clone can
/// be moved into the plugin-side thread while the host keeps the other.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<SessionState>,
}

impl InMemoryBroker {
    /// Creates a fresh session with no channels bound.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Broker for InMemoryBroker {
    fn dial(&self, id: ChannelId) -> Result<Box<dyn Channel>, BridgeError> {
        let deadline = Instant::now() + DIAL_TIMEOUT;
        let mut listeners = self
            .state
            .listeners
            .lock()
            .map_err(|_| BridgeError::transport("broker lock poisoned"))?;
        loop {
            if let Some(binding) = listeners.get(&id) {
                debug!(target: BROKER_TARGET, channel = id, "dialled channel");
                return Ok(Box::new(InMemoryChannel {
                    id,
                    sender: binding.sender.clone(),
                }));
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(BridgeError::NoListener { id });
            }
            let (guard, timeout) = self
                .state
                .registered
                .wait_timeout(listeners, remaining)
                .map_err(|_| BridgeError::transport("broker lock poisoned"))?;
            listeners = guard;
            if timeout.timed_out() && !listeners.contains_key(&id) {
                return Err(BridgeError::NoListener { id });
            }
        }
    }

    fn listen(&self, id: ChannelId) -> Result<Box<dyn Listener>, BridgeError> {
        let (sender, receiver) = mpsc::channel();
        let generation = self
            .state
            .generations
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut listeners = self
            .state
            .listeners
            .lock()
            .map_err(|_| BridgeError::transport("broker lock poisoned"))?;
        listeners.insert(id, Binding { generation, sender });
        self.state.registered.notify_all();
        debug!(target: BROKER_TARGET, channel = id, "listener bound");
        Ok(Box::new(InMemoryListener {
            id,
            generation,
            receiver,
            state: Arc::clone(&self.state),
        }))
    }
}

/// Calling end of an in-memory channel.
struct InMemoryChannel {
    id: ChannelId,
    sender: mpsc::Sender<Envelope>,
}

impl Channel for InMemoryChannel {
    fn call(&self, method: &str, params: Value, deadline: Duration) -> Result<Value, BridgeError> {
        let (reply, outcome) = mpsc::channel();
        self.sender
            .send(Envelope {
                method: method.to_owned(),
                params,
                reply,
            })
            .map_err(|_| BridgeError::ChannelClosed { id: self.id })?;
        match outcome.recv_timeout(deadline) {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(message)) => Err(BridgeError::remote(message)),
            Err(RecvTimeoutError::Timeout) => Err(BridgeError::Timeout {
                method: method.to_owned(),
                deadline_secs: deadline.as_secs(),
            }),
            Err(RecvTimeoutError::Disconnected) => {
                Err(BridgeError::ChannelClosed { id: self.id })
            }
        }
    }
}

/// Serving end of an in-memory channel. Unbinds its id on drop.
struct InMemoryListener {
    id: ChannelId,
    generation: u64,
    receiver: mpsc::Receiver<Envelope>,
    state: Arc<SessionState>,
}

impl Listener for InMemoryListener {
    fn next_incoming(&mut self, poll: Duration) -> Result<Option<Incoming>, BridgeError> {
        match self.receiver.recv_timeout(poll) {
            Ok(envelope) => Ok(Some(Incoming::new(
                envelope.method,
                envelope.params,
                Box::new(InMemoryResponder {
                    reply: envelope.reply,
                }),
            ))),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(BridgeError::ChannelClosed { id: self.id })
            }
        }
    }
}

impl Drop for InMemoryListener {
    fn drop(&mut self) {
        if let Ok(mut listeners) = self.state.listeners.lock() {
            if listeners
                .get(&self.id)
                .is_some_and(|binding| binding.generation == self.generation)
            {
                listeners.remove(&self.id);
            }
        }
    }
}

/// Reply handle for one in-memory request.
struct InMemoryResponder {
    reply: mpsc::Sender<CallOutcome>,
}

impl Responder for InMemoryResponder {
    fn respond(self: Box<Self>, outcome: CallOutcome) {
        // The caller may have timed out and gone away; nothing to do then.
        let _ = self.reply.send(outcome);
    }
}
