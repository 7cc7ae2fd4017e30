//! Daemon-facing client surface over either transport.

use std::sync::Arc;

use serde_json::{Value, json};

use super::{RpcError, RpcTransport};

/// Client for the aria2 control interface.
///
/// Wraps a transport with the cross-cutting call rules: a configured secret
/// is prepended to the parameter list as `token:<secret>`, and a method name
/// without a recognized namespace prefix is qualified with `aria2.` before
/// transmission.
#[derive(Clone)]
pub struct Aria2Client {
    transport: Arc<dyn RpcTransport>,
    secret: Option<String>,
}

impl Aria2Client {
    /// Creates a client over `transport`.
    ///
    /// An empty secret behaves as no secret.
    pub fn new(transport: Arc<dyn RpcTransport>, secret: Option<String>) -> Self {
        Self {
            transport,
            secret: secret.filter(|s| !s.is_empty()),
        }
    }

    /// Performs a call, applying namespace qualification and the secret
    /// token.
    ///
    /// # Errors
    ///
    /// Propagates transport and daemon errors as [`RpcError`].
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let method = qualify_method(method);
        let mut all_params = params;
        if let Some(secret) = &self.secret {
            all_params.insert(0, json!(format!("token:{secret}")));
        }
        self.transport.call(&method, all_params).await
    }

    /// `aria2.getVersion`
    pub async fn get_version(&self) -> Result<Value, RpcError> {
        self.call("getVersion", Vec::new()).await
    }

    /// `aria2.getGlobalStat`
    pub async fn get_global_stat(&self) -> Result<Value, RpcError> {
        self.call("getGlobalStat", Vec::new()).await
    }

    /// `aria2.addUri` - queues `uris` with per-download `options`.
    pub async fn add_uri(&self, uris: &[&str], options: Value) -> Result<Value, RpcError> {
        self.call("addUri", vec![json!(uris), options]).await
    }

    /// `aria2.tellStatus`
    pub async fn tell_status(&self, gid: &str, keys: &[&str]) -> Result<Value, RpcError> {
        self.call("tellStatus", vec![json!(gid), json!(keys)]).await
    }

    /// `aria2.tellActive`
    pub async fn tell_active(&self, keys: &[&str]) -> Result<Value, RpcError> {
        self.call("tellActive", vec![json!(keys)]).await
    }

    /// `aria2.tellWaiting`
    pub async fn tell_waiting(&self, offset: i64, num: i64, keys: &[&str]) -> Result<Value, RpcError> {
        self.call("tellWaiting", vec![json!(offset), json!(num), json!(keys)])
            .await
    }

    /// `aria2.tellStopped`
    pub async fn tell_stopped(&self, offset: i64, num: i64, keys: &[&str]) -> Result<Value, RpcError> {
        self.call("tellStopped", vec![json!(offset), json!(num), json!(keys)])
            .await
    }

    /// `aria2.pause`
    pub async fn pause(&self, gid: &str) -> Result<Value, RpcError> {
        self.call("pause", vec![json!(gid)]).await
    }

    /// `aria2.pauseAll`
    pub async fn pause_all(&self) -> Result<Value, RpcError> {
        self.call("pauseAll", Vec::new()).await
    }

    /// `aria2.forcePause`
    pub async fn force_pause(&self, gid: &str) -> Result<Value, RpcError> {
        self.call("forcePause", vec![json!(gid)]).await
    }

    /// `aria2.forcePauseAll`
    pub async fn force_pause_all(&self) -> Result<Value, RpcError> {
        self.call("forcePauseAll", Vec::new()).await
    }

    /// `aria2.unpause`
    pub async fn unpause(&self, gid: &str) -> Result<Value, RpcError> {
        self.call("unpause", vec![json!(gid)]).await
    }

    /// `aria2.unpauseAll`
    pub async fn unpause_all(&self) -> Result<Value, RpcError> {
        self.call("unpauseAll", Vec::new()).await
    }

    /// `aria2.remove`
    pub async fn remove(&self, gid: &str) -> Result<Value, RpcError> {
        self.call("remove", vec![json!(gid)]).await
    }

    /// `aria2.forceRemove`
    pub async fn force_remove(&self, gid: &str) -> Result<Value, RpcError> {
        self.call("forceRemove", vec![json!(gid)]).await
    }

    /// `aria2.getOption`
    pub async fn get_option(&self, gid: &str) -> Result<Value, RpcError> {
        self.call("getOption", vec![json!(gid)]).await
    }

    /// `aria2.changeOption`
    pub async fn change_option(&self, gid: &str, options: Value) -> Result<Value, RpcError> {
        self.call("changeOption", vec![json!(gid), options]).await
    }

    /// `aria2.getGlobalOption`
    pub async fn get_global_option(&self) -> Result<Value, RpcError> {
        self.call("getGlobalOption", Vec::new()).await
    }

    /// `aria2.changeGlobalOption`
    pub async fn change_global_option(&self, options: Value) -> Result<Value, RpcError> {
        self.call("changeGlobalOption", vec![options]).await
    }

    /// `aria2.purgeDownloadResult`
    pub async fn purge_download_result(&self) -> Result<Value, RpcError> {
        self.call("purgeDownloadResult", Vec::new()).await
    }

    /// `aria2.removeDownloadResult`
    pub async fn remove_download_result(&self, gid: &str) -> Result<Value, RpcError> {
        self.call("removeDownloadResult", vec![json!(gid)]).await
    }

    /// `aria2.getSessionInfo`
    pub async fn get_session_info(&self) -> Result<Value, RpcError> {
        self.call("getSessionInfo", Vec::new()).await
    }

    /// `aria2.shutdown`
    pub async fn shutdown(&self) -> Result<Value, RpcError> {
        self.call("shutdown", Vec::new()).await
    }

    /// `aria2.forceShutdown`
    pub async fn force_shutdown(&self) -> Result<Value, RpcError> {
        self.call("forceShutdown", Vec::new()).await
    }

    /// `aria2.saveSession`
    pub async fn save_session(&self) -> Result<Value, RpcError> {
        self.call("saveSession", Vec::new()).await
    }

    /// `system.multicall` - batches `methods` into one exchange.
    pub async fn multicall(&self, methods: Value) -> Result<Value, RpcError> {
        self.call("system.multicall", vec![methods]).await
    }

    /// `system.listMethods`
    pub async fn list_methods(&self) -> Result<Value, RpcError> {
        self.call("system.listMethods", Vec::new()).await
    }

    /// `system.listNotifications`
    pub async fn list_notifications(&self) -> Result<Value, RpcError> {
        self.call("system.listNotifications", Vec::new()).await
    }
}

/// Qualifies a bare method name with the daemon namespace.
fn qualify_method(method: &str) -> String {
    if method.starts_with("aria2.") || method.starts_with("system.") {
        method.to_string()
    } else {
        format!("aria2.{method}")
    }
}
