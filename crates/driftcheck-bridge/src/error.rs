//! Errors raised by the bridge transport and services.
//!
//! I/O errors are wrapped in `Arc` so `BridgeError` stays cloneable into
//! per-call outcomes.

use std::sync::Arc;

use thiserror::Error;

use crate::broker::ChannelId;

/// Errors arising from bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The underlying transport failed.
    #[error("transport failure: {message}")]
    Transport {
        /// Human-readable failure description.
        message: String,
        /// Optional underlying I/O error.
        #[source]
        source: Option<Arc<std::io::Error>>,
    },

    /// A call did not complete within its deadline.
    #[error("call to '{method}' timed out after {deadline_secs}s")]
    Timeout {
        /// Method that was invoked.
        method: String,
        /// The deadline that elapsed, in seconds.
        deadline_secs: u64,
    },

    /// The remote handler reported a failure.
    #[error("{message}")]
    Remote {
        /// The failure message as reported by the remote side.
        message: String,
    },

    /// The channel closed before or during the call.
    #[error("channel {id} is closed")]
    ChannelClosed {
        /// The channel that closed.
        id: ChannelId,
    },

    /// No listener appeared on the channel within the dial window.
    #[error("no listener on channel {id}")]
    NoListener {
        /// The channel that was dialled.
        id: ChannelId,
    },

    /// A wire payload could not be encoded or decoded.
    #[error("wire codec failure: {0}")]
    Codec(#[from] serde_json::Error),

    /// The plugin handshake failed.
    #[error("handshake failed: {message}")]
    Handshake {
        /// Human-readable failure description.
        message: String,
    },
}

impl BridgeError {
    /// Creates a transport failure with no underlying I/O error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a transport failure wrapping an I/O error.
    #[must_use]
    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(Arc::new(source)),
        }
    }

    /// Creates a remote-failure error.
    #[must_use]
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
        }
    }
}
