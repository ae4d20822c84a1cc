//! Framed stdio transport multiplexing channels over one byte stream pair.
//!
//! Frames use header framing with the channel id alongside the payload
//! length:
//!
//! ```text
//! Channel-Id: <id>\r\n
//! Content-Length: <length>\r\n
//! \r\n
//! <payload>
//! ```
//!
//! The payload is one JSON object: a request (`id`, `method`, `params`) or
//! a response (`id` plus `result` or `error`). A background reader thread
//! routes request frames to the listener bound to their channel and
//! response frames to the pending call with the matching id. Writes from
//! both directions share one mutex-serialised writer.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::broker::{
    Broker, CallOutcome, Channel, ChannelId, Incoming, Listener, Responder,
};
use crate::error::BridgeError;

/// Log target for stdio transport operations.
const STDIO_TARGET: &str = "driftcheck_bridge::stdio";

/// One frame payload. Requests carry `method`/`params`; responses carry
/// `result` or `error`.
#[derive(Debug, Serialize, Deserialize)]
struct Frame {
    id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Writes one framed payload.
fn write_frame(
    writer: &mut dyn Write,
    channel: ChannelId,
    payload: &[u8],
) -> std::io::Result<()> {
    write!(
        writer,
        "Channel-Id: {channel}\r\nContent-Length: {}\r\n\r\n",
        payload.len()
    )?;
    writer.write_all(payload)?;
    writer.flush()
}

/// Reads one framed payload. Returns `None` on a clean EOF at a frame
/// boundary.
fn read_frame(reader: &mut dyn BufRead) -> std::io::Result<Option<(ChannelId, Vec<u8>)>> {
    let mut channel: Option<ChannelId> = None;
    let mut content_length: Option<usize> = None;
    let mut saw_header = false;

    loop {
        let mut line = String::new();
        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            if saw_header {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed while reading frame headers",
                ));
            }
            return Ok(None);
        }
        saw_header = true;

        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }
        if let Some(value) = trimmed.strip_prefix("Channel-Id: ") {
            channel = Some(value.parse().map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::InvalidData, "invalid Channel-Id header")
            })?);
        } else if let Some(value) = trimmed.strip_prefix("Content-Length: ") {
            content_length = Some(value.parse().map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "invalid Content-Length header",
                )
            })?);
        }
        // Other headers are ignored.
    }

    let channel = channel.ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidData, "missing Channel-Id header")
    })?;
    let content_length = content_length.ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "missing Content-Length header",
        )
    })?;

    let mut payload = vec![0u8; content_length];
    reader.read_exact(&mut payload)?;
    Ok(Some((channel, payload)))
}

/// An inbound request as routed to a listener.
struct InboundRequest {
    id: u64,
    method: String,
    params: Value,
}

/// State shared between channels, listeners, and the reader thread.
///
/// `writer` becomes `None` once the session is closed; the reader thread
/// holds the `Arc` for its whole life, so dropping broker handles alone
/// would never release the stream.
struct Shared {
    writer: Mutex<Option<Box<dyn Write + Send>>>,
    routes: Mutex<HashMap<ChannelId, mpsc::Sender<InboundRequest>>>,
    pending: Mutex<HashMap<u64, mpsc::Sender<CallOutcome>>>,
    next_id: AtomicU64,
}

impl Shared {
    fn send_frame(&self, channel: ChannelId, frame: &Frame) -> Result<(), BridgeError> {
        let payload = serde_json::to_vec(frame)?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| BridgeError::transport("stdio writer lock poisoned"))?;
        let Some(writer) = writer.as_mut() else {
            return Err(BridgeError::transport("stdio session closed"));
        };
        write_frame(writer.as_mut(), channel, &payload)
            .map_err(|err| BridgeError::io("failed to write frame", err))
    }
}

/// A broker multiplexing channels over a reader/writer pair, typically a
/// child process's stdio.
///
/// Cloning yields another handle onto the same session.
#[derive(Clone)]
pub struct StdioBroker {
    shared: Arc<Shared>,
}

impl StdioBroker {
    /// Creates a broker over the given streams and starts its reader
    /// thread. The host passes the child's stdout/stdin; the plugin passes
    /// its own stdin/stdout.
    #[must_use]
    pub fn new(
        reader: impl Read + Send + 'static,
        writer: impl Write + Send + 'static,
    ) -> Self {
        let shared = Arc::new(Shared {
            writer: Mutex::new(Some(Box::new(writer))),
            routes: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        });
        let reader_shared = Arc::clone(&shared);
        thread::spawn(move || read_loop(BufReader::new(reader), &reader_shared));
        Self { shared }
    }

    /// Closes the outbound stream, signalling EOF to the peer. Further
    /// calls on any clone of this broker fail; the peer's serve loops exit
    /// once they observe the closed channel.
    pub fn close(&self) {
        if let Ok(mut writer) = self.shared.writer.lock() {
            writer.take();
        }
        debug!(target: STDIO_TARGET, "stdio session closed");
    }
}

/// Routes inbound frames until the stream ends.
fn read_loop(mut reader: BufReader<impl Read>, shared: &Arc<Shared>) {
    loop {
        match read_frame(&mut reader) {
            Ok(Some((channel, payload))) => route_frame(shared, channel, &payload),
            Ok(None) => {
                debug!(target: STDIO_TARGET, "peer closed the stream");
                break;
            }
            Err(err) => {
                warn!(target: STDIO_TARGET, error = %err, "frame read failed");
                break;
            }
        }
    }
    // Dropping the route and pending senders wakes every listener and
    // in-flight call with a closed-channel signal.
    if let Ok(mut routes) = shared.routes.lock() {
        routes.clear();
    }
    if let Ok(mut pending) = shared.pending.lock() {
        pending.clear();
    }
}

/// Dispatches one decoded frame to its listener or pending call.
fn route_frame(shared: &Arc<Shared>, channel: ChannelId, payload: &[u8]) {
    let frame: Frame = match serde_json::from_slice(payload) {
        Ok(frame) => frame,
        Err(err) => {
            warn!(target: STDIO_TARGET, channel, error = %err, "discarding malformed frame");
            return;
        }
    };

    if let Some(method) = frame.method {
        let request = InboundRequest {
            id: frame.id,
            method,
            params: frame.params.unwrap_or(Value::Null),
        };
        let delivered = shared
            .routes
            .lock()
            .ok()
            .and_then(|routes| routes.get(&channel).map(|route| route.send(request)))
            .is_some_and(|sent| sent.is_ok());
        if !delivered {
            warn!(target: STDIO_TARGET, channel, "request for unbound channel");
            let reply = Frame {
                id: frame.id,
                method: None,
                params: None,
                result: None,
                error: Some(format!("no listener on channel {channel}")),
            };
            let _ = shared.send_frame(channel, &reply);
        }
        return;
    }

    let outcome = match frame.error {
        Some(message) => Err(message),
        None => Ok(frame.result.unwrap_or(Value::Null)),
    };
    let waiter = shared
        .pending
        .lock()
        .ok()
        .and_then(|mut pending| pending.remove(&frame.id));
    match waiter {
        Some(reply) => {
            let _ = reply.send(outcome);
        }
        None => {
            // The caller timed out and abandoned the id.
            debug!(target: STDIO_TARGET, id = frame.id, "response with no pending call");
        }
    }
}

impl Broker for StdioBroker {
    /// Stdio channels need no registration handshake: frames queue in the
    /// pipe until the remote listener binds, so dialling always succeeds.
    fn dial(&self, id: ChannelId) -> Result<Box<dyn Channel>, BridgeError> {
        Ok(Box::new(StdioChannel {
            id,
            shared: Arc::clone(&self.shared),
        }))
    }

    fn listen(&self, id: ChannelId) -> Result<Box<dyn Listener>, BridgeError> {
        let (sender, receiver) = mpsc::channel();
        let mut routes = self
            .shared
            .routes
            .lock()
            .map_err(|_| BridgeError::transport("stdio routes lock poisoned"))?;
        routes.insert(id, sender);
        debug!(target: STDIO_TARGET, channel = id, "listener bound");
        Ok(Box::new(StdioListener {
            id,
            receiver,
            shared: Arc::clone(&self.shared),
        }))
    }
}

/// Calling end of a stdio channel.
struct StdioChannel {
    id: ChannelId,
    shared: Arc<Shared>,
}

impl Channel for StdioChannel {
    fn call(&self, method: &str, params: Value, deadline: Duration) -> Result<Value, BridgeError> {
        let call_id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        let (reply, outcome) = mpsc::channel();
        {
            let mut pending = self
                .shared
                .pending
                .lock()
                .map_err(|_| BridgeError::transport("stdio pending lock poisoned"))?;
            pending.insert(call_id, reply);
        }

        let frame = Frame {
            id: call_id,
            method: Some(method.to_owned()),
            params: Some(params),
            result: None,
            error: None,
        };
        if let Err(err) = self.shared.send_frame(self.id, &frame) {
            if let Ok(mut pending) = self.shared.pending.lock() {
                pending.remove(&call_id);
            }
            return Err(err);
        }

        match outcome.recv_timeout(deadline) {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(message)) => Err(BridgeError::remote(message)),
            Err(RecvTimeoutError::Timeout) => {
                if let Ok(mut pending) = self.shared.pending.lock() {
                    pending.remove(&call_id);
                }
                Err(BridgeError::Timeout {
                    method: method.to_owned(),
                    deadline_secs: deadline.as_secs(),
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                Err(BridgeError::ChannelClosed { id: self.id })
            }
        }
    }
}

/// Serving end of a stdio channel. Unbinds its route on drop.
struct StdioListener {
    id: ChannelId,
    receiver: mpsc::Receiver<InboundRequest>,
    shared: Arc<Shared>,
}

impl Listener for StdioListener {
    fn next_incoming(&mut self, poll: Duration) -> Result<Option<Incoming>, BridgeError> {
        match self.receiver.recv_timeout(poll) {
            Ok(request) => Ok(Some(Incoming::new(
                request.method,
                request.params,
                Box::new(StdioResponder {
                    channel: self.id,
                    call_id: request.id,
                    shared: Arc::clone(&self.shared),
                }),
            ))),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                Err(BridgeError::ChannelClosed { id: self.id })
            }
        }
    }
}

impl Drop for StdioListener {
    fn drop(&mut self) {
        if let Ok(mut routes) = self.shared.routes.lock() {
            routes.remove(&self.id);
        }
    }
}

/// Reply handle for one stdio request.
struct StdioResponder {
    channel: ChannelId,
    call_id: u64,
    shared: Arc<Shared>,
}

impl Responder for StdioResponder {
    fn respond(self: Box<Self>, outcome: CallOutcome) {
        let frame = match outcome {
            Ok(result) => Frame {
                id: self.call_id,
                method: None,
                params: None,
                result: Some(result),
                error: None,
            },
            Err(message) => Frame {
                id: self.call_id,
                method: None,
                params: None,
                result: None,
                error: Some(message),
            },
        };
        // The peer may already be gone; a lost reply is indistinguishable
        // from a timeout on the calling side.
        if let Err(err) = self.shared.send_frame(self.channel, &frame) {
            warn!(target: STDIO_TARGET, channel = self.channel, error = %err, "failed to send reply");
        }
    }
}

#[cfg(test)]
mod tests {
    #![expect(clippy::expect_used, reason = "tests use expect for clarity")]

    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::sync::Condvar;

    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::broker::RULESET_CHANNEL;

    const SHORT: Duration = Duration::from_millis(500);

    #[rstest]
    fn frame_round_trips_through_codec() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, 3, br#"{"id":1}"#).expect("write frame");

        let mut reader = Cursor::new(buffer);
        let (channel, payload) = read_frame(&mut reader)
            .expect("read frame")
            .expect("frame present");
        assert_eq!(channel, 3);
        assert_eq!(payload, br#"{"id":1}"#);
        // Clean EOF after the frame.
        assert!(read_frame(&mut reader).expect("eof read").is_none());
    }

    #[rstest]
    fn missing_channel_header_is_invalid() {
        let mut reader = Cursor::new(b"Content-Length: 2\r\n\r\n{}".to_vec());
        let err = read_frame(&mut reader).expect_err("invalid frame");
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[rstest]
    fn truncated_headers_are_an_unexpected_eof() {
        let mut reader = Cursor::new(b"Channel-Id: 1\r\n".to_vec());
        let err = read_frame(&mut reader).expect_err("truncated frame");
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    /// A blocking in-memory pipe so two brokers can face each other
    /// in-process.
    #[derive(Default)]
    struct PipeState {
        buffer: Mutex<VecDeque<u8>>,
        closed: Mutex<bool>,
        available: Condvar,
    }

    struct PipeWriter(Arc<PipeState>);
    struct PipeReader(Arc<PipeState>);

    fn pipe() -> (PipeWriter, PipeReader) {
        let state = Arc::new(PipeState::default());
        (PipeWriter(Arc::clone(&state)), PipeReader(state))
    }

    impl Write for PipeWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let mut buffer = self.0.buffer.lock().expect("pipe lock");
            buffer.extend(buf);
            self.0.available.notify_all();
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Drop for PipeWriter {
        fn drop(&mut self) {
            let mut closed = self.0.closed.lock().expect("pipe lock");
            *closed = true;
            self.0.available.notify_all();
        }
    }

    impl Read for PipeReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let mut buffer = self.0.buffer.lock().expect("pipe lock");
            loop {
                if !buffer.is_empty() {
                    let take = buf.len().min(buffer.len());
                    for slot in buf.iter_mut().take(take) {
                        *slot = buffer.pop_front().unwrap_or_default();
                    }
                    return Ok(take);
                }
                if *self.0.closed.lock().expect("pipe lock") {
                    return Ok(0);
                }
                buffer = self
                    .0
                    .available
                    .wait(buffer)
                    .map_err(|_| std::io::Error::other("pipe poisoned"))?;
            }
        }
    }

    /// Builds two brokers joined by a pair of in-memory pipes.
    fn linked_brokers() -> (StdioBroker, StdioBroker) {
        let (host_writer, plugin_reader) = pipe();
        let (plugin_writer, host_reader) = pipe();
        let host = StdioBroker::new(host_reader, host_writer);
        let plugin = StdioBroker::new(plugin_reader, plugin_writer);
        (host, plugin)
    }

    #[rstest]
    fn calls_cross_the_pipe_pair() {
        let (host, plugin) = linked_brokers();
        let mut listener = plugin.listen(RULESET_CHANNEL).expect("listen");
        let server = thread::spawn(move || {
            let incoming = loop {
                if let Some(incoming) = listener.next_incoming(SHORT).expect("next incoming") {
                    break incoming;
                }
            };
            assert_eq!(incoming.method(), "ruleset/name");
            incoming.respond(Ok(json!("azurerm")));
        });

        let channel = host.dial(RULESET_CHANNEL).expect("dial");
        let result = channel.call("ruleset/name", json!(null), SHORT).expect("call");
        assert_eq!(result, json!("azurerm"));
        server.join().expect("server thread");
    }

    #[rstest]
    fn unbound_channel_reports_remote_error() {
        let (host, plugin) = linked_brokers();
        // Keep the plugin broker alive but bind nothing.
        let _plugin = plugin;
        let channel = host.dial(RULESET_CHANNEL).expect("dial");
        let err = channel
            .call("ruleset/name", json!(null), SHORT)
            .expect_err("no listener");
        assert!(matches!(err, BridgeError::Remote { ref message } if message.contains("no listener")));
    }
}
