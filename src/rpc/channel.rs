//! Persistent-channel JSON-RPC transport over a WebSocket.
//!
//! The channel is opened once and multiplexed: every call registers a pending
//! slot keyed by its request id, the writer task serializes envelopes as text
//! frames, and the reader task routes inbound frames back to the matching
//! slot or out to notification subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};

use super::envelope::{Inbound, RpcRequest, parse_inbound};
use super::{RpcError, RpcTransport};

/// How long a channel call waits for its reply before rejecting.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(10);

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, RpcError>>>>>;
type ListenerMap = Arc<Mutex<HashMap<String, Vec<mpsc::UnboundedSender<Vec<Value>>>>>>;

/// JSON-RPC over a persistent full-duplex WebSocket.
#[derive(Debug)]
pub struct ChannelTransport {
    endpoint: String,
    outbound: mpsc::UnboundedSender<Message>,
    pending: PendingMap,
    listeners: ListenerMap,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl ChannelTransport {
    /// Opens the channel. Must resolve before [`RpcTransport::call`] is used.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Connect`] when the WebSocket handshake fails.
    pub async fn connect(endpoint: impl Into<String>) -> Result<Self, RpcError> {
        let endpoint = endpoint.into();
        let (stream, _) = connect_async(endpoint.as_str())
            .await
            .map_err(|e| RpcError::connect(&endpoint, e))?;
        debug!(endpoint = %endpoint, "channel opened");

        let (mut sink, mut source) = stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

        let writer = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if sink.send(message).await.is_err() || closing {
                    break;
                }
            }
        });

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let listeners: ListenerMap = Arc::new(Mutex::new(HashMap::new()));
        let reader = {
            let pending = Arc::clone(&pending);
            let listeners = Arc::clone(&listeners);
            tokio::spawn(async move {
                while let Some(frame) = source.next().await {
                    match frame {
                        Ok(Message::Text(text)) => {
                            route_frame(text.as_str(), &pending, &listeners);
                        }
                        Ok(Message::Close(_)) | Err(_) => break,
                        Ok(_) => {}
                    }
                }
                trace!("channel reader finished");
            })
        };

        Ok(Self {
            endpoint,
            outbound,
            pending,
            listeners,
            next_id: AtomicU64::new(0),
            reader,
            writer,
        })
    }

    /// The endpoint this channel is connected to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Subscribes to daemon notifications for `event`.
    ///
    /// `event` is the method name without the daemon namespace prefix
    /// (e.g. `onDownloadComplete`).
    pub fn subscribe(&self, event: &str) -> mpsc::UnboundedReceiver<Vec<Value>> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.entry(event.to_string()).or_default().push(tx);
        }
        rx
    }

    /// Tears the channel down.
    ///
    /// Calls still pending are left unresolved; their callers complete via
    /// the call timeout.
    pub fn close(&self) {
        let _ = self.outbound.send(Message::Close(None));
    }
}

impl Drop for ChannelTransport {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}

#[async_trait]
impl RpcTransport for ChannelTransport {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        {
            let Ok(mut pending) = self.pending.lock() else {
                return Err(RpcError::ChannelClosed {
                    method: method.to_string(),
                });
            };
            pending.insert(id, tx);
        }

        let request = RpcRequest::new(id, method, params);
        let text = serde_json::to_string(&request)?;
        trace!(method, id, "sending channel call");
        if self.outbound.send(Message::Text(text.into())).is_err() {
            discard_pending(&self.pending, id);
            return Err(RpcError::ChannelClosed {
                method: method.to_string(),
            });
        }

        match tokio::time::timeout(CALL_TIMEOUT, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(RpcError::ChannelClosed {
                method: method.to_string(),
            }),
            Err(_) => {
                discard_pending(&self.pending, id);
                Err(RpcError::Timeout {
                    method: method.to_string(),
                })
            }
        }
    }
}

/// Routes one inbound text frame to its pending call or its subscribers.
fn route_frame(text: &str, pending: &PendingMap, listeners: &ListenerMap) {
    let inbound = match parse_inbound(text) {
        Ok(inbound) => inbound,
        Err(error) => {
            warn!(%error, "dropping unparseable channel frame");
            return;
        }
    };
    match inbound {
        Inbound::Response { id, result, error } => {
            let slot = pending.lock().ok().and_then(|mut map| map.remove(&id));
            let Some(slot) = slot else {
                trace!(id, "reply for unknown or timed-out call");
                return;
            };
            let outcome = match error {
                Some(error) => Err(RpcError::daemon(error)),
                None => Ok(result.unwrap_or(Value::Null)),
            };
            let _ = slot.send(outcome);
        }
        Inbound::Notification { method, params } => {
            let event = method.strip_prefix("aria2.").unwrap_or(&method).to_string();
            if let Ok(mut listeners) = listeners.lock()
                && let Some(subscribers) = listeners.get_mut(&event)
            {
                subscribers.retain(|tx| tx.send(params.clone()).is_ok());
            }
        }
        Inbound::Unrecognized => {
            trace!("ignoring frame with neither id nor method");
        }
    }
}

fn discard_pending(pending: &PendingMap, id: u64) {
    if let Ok(mut map) = pending.lock() {
        map.remove(&id);
    }
}
