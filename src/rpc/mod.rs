//! Dual-mode JSON-RPC 2.0 client for the aria2 control channel.
//!
//! Two transports share one call contract:
//! - [`ChannelTransport`] - a persistent WebSocket opened once and multiplexed
//!   across calls, with server-push notifications.
//! - [`CallTransport`] - one HTTP POST per call, no persistent state.
//!
//! [`Aria2Client`] wraps either transport behind the daemon's method surface
//! and applies the cross-cutting rules: secret-token prefixing and `aria2.`
//! namespace qualification.

mod call;
mod channel;
mod client;
mod envelope;

pub use call::CallTransport;
pub use channel::{CALL_TIMEOUT, ChannelTransport};
pub use client::Aria2Client;
pub use envelope::{Inbound, RpcErrorObject, RpcRequest, parse_inbound};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors raised by the RPC layer.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The channel could not be established.
    #[error("failed to open channel to {endpoint}: {reason}")]
    Connect {
        /// Endpoint that refused the connection.
        endpoint: String,
        /// Underlying failure description.
        reason: String,
    },

    /// The per-call transport returned a non-success HTTP status.
    #[error("HTTP {status} from {endpoint}")]
    HttpStatus {
        /// Endpoint that answered.
        endpoint: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The per-call transport failed below the HTTP layer.
    #[error("transport error calling {method}: {source}")]
    Transport {
        /// Method being called.
        method: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// No reply arrived within the call timeout.
    #[error("timeout waiting for reply to {method}")]
    Timeout {
        /// Method that timed out.
        method: String,
    },

    /// The channel closed while a call was outstanding.
    #[error("channel closed before {method} completed")]
    ChannelClosed {
        /// Method left unresolved.
        method: String,
    },

    /// A payload could not be serialized or parsed.
    #[error("malformed RPC payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// The daemon answered with a JSON-RPC error object.
    #[error("daemon error {code}: {message}")]
    Daemon {
        /// JSON-RPC error code.
        code: i64,
        /// Daemon-supplied message.
        message: String,
    },
}

impl RpcError {
    /// Creates a connect error.
    pub fn connect(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        Self::Connect {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(endpoint: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            endpoint: endpoint.into(),
            status,
        }
    }

    /// Creates a daemon error from a JSON-RPC error object.
    #[must_use]
    pub fn daemon(error: RpcErrorObject) -> Self {
        Self::Daemon {
            code: error.code,
            message: error.message,
        }
    }
}

/// The shared call contract both transports implement.
///
/// `method` is already fully qualified and `params` already carries the
/// secret token when one is configured; transports move envelopes only.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Performs one call and returns the daemon's `result` payload.
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError>;
}
