//! JSON-RPC 2.0 envelopes for the daemon control channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An outbound JSON-RPC request.
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    /// Protocol version marker, always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Call identifier echoed back by the daemon.
    pub id: u64,
    /// Fully-qualified method name.
    pub method: String,
    /// Positional parameters; omitted from the wire when empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Value>,
}

impl RpcRequest {
    /// Builds an envelope for `method` with positional `params`.
    #[must_use]
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC error object returned by the daemon.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RpcErrorObject {
    /// Daemon error code.
    pub code: i64,
    /// Daemon error message.
    pub message: String,
}

/// An inbound message on the control channel.
#[derive(Debug, Clone)]
pub enum Inbound {
    /// A reply to one of our calls.
    Response {
        /// Identifier of the call being answered.
        id: u64,
        /// Result payload; present on success.
        result: Option<Value>,
        /// Error object; present on failure.
        error: Option<RpcErrorObject>,
    },
    /// A server-initiated event (no id).
    Notification {
        /// Event method name as sent by the daemon.
        method: String,
        /// Event payload.
        params: Vec<Value>,
    },
    /// A frame that is neither a response nor a notification.
    Unrecognized,
}

#[derive(Debug, Deserialize)]
struct RawInbound {
    id: Option<u64>,
    method: Option<String>,
    result: Option<Value>,
    error: Option<RpcErrorObject>,
    #[serde(default)]
    params: Vec<Value>,
}

/// Classifies one inbound text frame.
///
/// Frames carrying an `id` are responses; frames with a `method` and no id
/// are notifications.
///
/// # Errors
///
/// Returns the underlying serde error for frames that are not JSON objects.
pub fn parse_inbound(text: &str) -> Result<Inbound, serde_json::Error> {
    let raw: RawInbound = serde_json::from_str(text)?;
    Ok(match (raw.id, raw.method) {
        (Some(id), _) => Inbound::Response {
            id,
            result: raw.result,
            error: raw.error,
        },
        (None, Some(method)) => Inbound::Notification {
            method,
            params: raw.params,
        },
        (None, None) => Inbound::Unrecognized,
    })
}
