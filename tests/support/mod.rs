//! Shared fixtures for integration tests: an in-memory settings store, a
//! recording host, and a scripted mock JSON-RPC WebSocket daemon.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use aria2_relay::config::{
    KEY_ACTIVE_SERVER_ID, KEY_CONFIRM_DISPATCH, KEY_RPC_SERVERS, SettingsStore,
};
use aria2_relay::{DirectDownload, HostActions, PanelRequest};

/// In-memory key-value store with test-side mutation.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, key: &str, value: impl Into<String>) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.into());
    }

    pub fn remove(&self, key: &str) {
        self.values.lock().unwrap().remove(key);
    }

    /// Stores a single-profile list pointing at `endpoint_url`
    /// (`http://host:port/path` or `ws://host:port/path`) and disables the
    /// confirmation panel so captures dispatch directly.
    pub fn configure_server(&self, endpoint_url: &str, secret: &str) {
        let parsed = url::Url::parse(endpoint_url).unwrap();
        let protocol = parsed.scheme().to_string();
        let host = parsed.host_str().unwrap().to_string();
        let port = parsed.port().unwrap();
        let interface_path = parsed.path().trim_start_matches('/').to_string();
        self.set(
            KEY_RPC_SERVERS,
            json!([{
                "id": "s1",
                "name": "test daemon",
                "protocol": protocol,
                "host": host,
                "port": port,
                "interface_path": interface_path,
                "secret": secret,
                "remote_dir": ""
            }])
            .to_string(),
        );
        self.set(KEY_ACTIVE_SERVER_ID, "s1");
        self.set(KEY_CONFIRM_DISPATCH, "false");
    }
}

impl SettingsStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }
}

/// Host double that records every interaction.
#[derive(Default)]
pub struct RecordingHost {
    notifications: Mutex<Vec<(String, String)>>,
    fallbacks: Mutex<Vec<DirectDownload>>,
    panels: Mutex<Vec<PanelRequest>>,
    settings_opened: AtomicUsize,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notifications(&self) -> Vec<(String, String)> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn fallbacks(&self) -> Vec<DirectDownload> {
        self.fallbacks.lock().unwrap().clone()
    }

    pub fn panels(&self) -> Vec<PanelRequest> {
        self.panels.lock().unwrap().clone()
    }

    pub fn settings_opened(&self) -> usize {
        self.settings_opened.load(Ordering::SeqCst)
    }

    /// Notifications whose title contains `needle`.
    pub fn notifications_containing(&self, needle: &str) -> usize {
        self.notifications()
            .iter()
            .filter(|(title, _)| title.contains(needle))
            .count()
    }
}

#[async_trait]
impl HostActions for RecordingHost {
    fn notify(&self, title: &str, body: &str) {
        self.notifications
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
    }

    async fn direct_download(&self, request: DirectDownload) {
        self.fallbacks.lock().unwrap().push(request);
    }

    fn open_download_panel(&self, request: PanelRequest) {
        self.panels.lock().unwrap().push(request);
    }

    fn open_settings(&self) {
        self.settings_opened.fetch_add(1, Ordering::SeqCst);
    }
}

/// Scripted daemon behavior for one received call.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Answer with a JSON-RPC result.
    Result(Value),
    /// Answer with a JSON-RPC error object.
    Error { code: i64, message: String },
    /// Send a notification frame first, then answer with a result.
    NotifyThenResult {
        method: String,
        params: Value,
        result: Value,
    },
    /// Never answer (drives the call timeout).
    Ignore,
}

/// A mock aria2 WebSocket daemon bound to an ephemeral port.
///
/// Replies are consumed in order across all connections; once the script is
/// exhausted every call succeeds with `"ok"`.
pub struct WsDaemon {
    pub url: String,
    requests: Arc<Mutex<Vec<Value>>>,
    handle: JoinHandle<()>,
}

impl WsDaemon {
    pub async fn start(replies: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let url = format!("ws://{addr}/jsonrpc");
        let replies = Arc::new(Mutex::new(VecDeque::from(replies)));
        let requests: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));

        let handle = {
            let requests = Arc::clone(&requests);
            tokio::spawn(async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        break;
                    };
                    let replies = Arc::clone(&replies);
                    let requests = Arc::clone(&requests);
                    tokio::spawn(async move {
                        let Ok(mut ws) = accept_async(stream).await else {
                            return;
                        };
                        while let Some(Ok(frame)) = ws.next().await {
                            let text = match frame {
                                Message::Text(text) => text,
                                Message::Close(_) => break,
                                _ => continue,
                            };
                            let request: Value = serde_json::from_str(text.as_str()).unwrap();
                            requests.lock().unwrap().push(request.clone());
                            let id = request["id"].clone();
                            let reply = replies
                                .lock()
                                .unwrap()
                                .pop_front()
                                .unwrap_or(Reply::Result(json!("ok")));
                            match reply {
                                Reply::Result(result) => {
                                    send_json(
                                        &mut ws,
                                        json!({"jsonrpc": "2.0", "id": id, "result": result}),
                                    )
                                    .await;
                                }
                                Reply::Error { code, message } => {
                                    send_json(
                                        &mut ws,
                                        json!({
                                            "jsonrpc": "2.0",
                                            "id": id,
                                            "error": {"code": code, "message": message}
                                        }),
                                    )
                                    .await;
                                }
                                Reply::NotifyThenResult {
                                    method,
                                    params,
                                    result,
                                } => {
                                    send_json(
                                        &mut ws,
                                        json!({
                                            "jsonrpc": "2.0",
                                            "method": method,
                                            "params": params
                                        }),
                                    )
                                    .await;
                                    send_json(
                                        &mut ws,
                                        json!({"jsonrpc": "2.0", "id": id, "result": result}),
                                    )
                                    .await;
                                }
                                Reply::Ignore => {}
                            }
                        }
                    });
                }
            })
        };

        Self {
            url,
            requests,
            handle,
        }
    }

    /// Every JSON-RPC request received so far, across connections.
    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for WsDaemon {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn send_json<S>(ws: &mut S, value: Value)
where
    S: Sink<Message> + Unpin,
{
    let _ = ws.send(Message::Text(value.to_string().into())).await;
}

/// Polls `condition` until it holds or a generous deadline passes.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached within deadline");
}
