//! Stateless per-call JSON-RPC transport: one HTTP POST per call.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::envelope::{RpcErrorObject, RpcRequest};
use super::{RpcError, RpcTransport};

/// JSON-RPC over HTTP POST.
///
/// Each call performs one full request/response exchange; there is no
/// connection state beyond the client's pool. A non-success HTTP status and
/// a JSON-RPC `error` field both raise.
#[derive(Debug)]
pub struct CallTransport {
    endpoint: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

#[derive(Debug, serde::Deserialize)]
struct CallReply {
    result: Option<Value>,
    error: Option<RpcErrorObject>,
}

impl CallTransport {
    /// Creates a transport posting to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Connect`] when the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, RpcError> {
        let endpoint = endpoint.into();
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| RpcError::connect(&endpoint, e))?;
        Ok(Self {
            endpoint,
            http,
            next_id: AtomicU64::new(0),
        })
    }

    /// The endpoint this transport posts to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RpcTransport for CallTransport {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let request = RpcRequest::new(id, method, params);
        debug!(method, id, endpoint = %self.endpoint, "posting RPC call");

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|source| RpcError::Transport {
                method: method.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::http_status(&self.endpoint, status.as_u16()));
        }

        let reply: CallReply =
            response
                .json()
                .await
                .map_err(|source| RpcError::Transport {
                    method: method.to_string(),
                    source,
                })?;

        if let Some(error) = reply.error {
            return Err(RpcError::daemon(error));
        }
        Ok(reply.result.unwrap_or(Value::Null))
    }
}
