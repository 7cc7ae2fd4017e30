//! Dispatch of captured downloads to the daemon, with retry and fallback.
//!
//! A [`DispatchJob`] moves through at most two RPC attempts and always ends
//! in exactly one terminal path: a success notification (`Delivered`) or one
//! fallback invocation plus a degraded-mode notification (`FellBack`). The
//! retry delay is fixed; in channel mode a failed *open* retries the whole
//! open+call sequence while a failed *call* retries only the call.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{ServerProfile, SettingsStore, load_server_profiles};
use crate::host::{DirectDownload, HostActions};
use crate::rpc::{Aria2Client, CallTransport, ChannelTransport, RpcError, RpcTransport};

/// Fixed delay between the first and second RPC attempt.
pub const RETRY_DELAY: Duration = Duration::from_secs(3);

const NOTIFY_SENT_TITLE: &str = "Download sent to aria2";
const NOTIFY_FALLBACK_TITLE: &str = "aria2 unreachable";
const NOTIFY_CONFIGURE_TITLE: &str = "aria2 connection not configured";
const NOTIFY_CONFIGURE_BODY: &str = "Add an RPC server before capturing downloads.";

/// A captured download ready to hand to the daemon.
#[derive(Debug, Clone)]
pub struct DispatchJob {
    /// Download URL.
    pub url: String,
    /// Output filename; empty lets the daemon derive one.
    pub file_name: String,
    /// Explicit download directory; empty defers to the profile default.
    pub file_path: String,
    /// Request headers to forward, formatted `Name: value`.
    pub headers: Vec<String>,
    /// Explicit target profile id; `None` uses the active profile.
    pub server_id: Option<String>,
}

/// Terminal state of a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The daemon accepted the download.
    Delivered,
    /// Both attempts failed (or no profile existed); the host fallback ran.
    FellBack,
}

/// Sends jobs to the configured daemon, retrying once and falling back.
pub struct DispatchCoordinator {
    store: Arc<dyn SettingsStore>,
    host: Arc<dyn HostActions>,
}

impl DispatchCoordinator {
    /// Creates a coordinator reading profiles from `store` and reporting
    /// through `host`.
    pub fn new(store: Arc<dyn SettingsStore>, host: Arc<dyn HostActions>) -> Self {
        Self { store, host }
    }

    /// Runs one job to its terminal state.
    ///
    /// Exactly one of the success notification or the fallback invocation
    /// executes, regardless of which attempt succeeds or how many fail.
    pub async fn dispatch(&self, job: DispatchJob) -> DispatchOutcome {
        let (profiles, active) = load_server_profiles(self.store.as_ref());
        if profiles.is_empty() {
            warn!(url = %job.url, "no server profiles configured, using fallback");
            self.host.notify(NOTIFY_CONFIGURE_TITLE, NOTIFY_CONFIGURE_BODY);
            self.host.open_settings();
            self.invoke_fallback(&job).await;
            return DispatchOutcome::FellBack;
        }

        let profile = resolve_profile(&profiles, job.server_id.as_deref(), active.as_deref());
        let options = build_options(&job, profile);
        debug!(
            url = %job.url,
            profile = %profile.id,
            channel = profile.protocol.is_channel(),
            "dispatching capture"
        );

        let sent = if profile.protocol.is_channel() {
            self.send_via_channel(profile, &job, options).await
        } else {
            self.send_via_call(profile, &job, options).await
        };

        match sent {
            Ok(()) => {
                info!(url = %job.url, file = %job.file_name, "daemon accepted download");
                self.host.notify(
                    NOTIFY_SENT_TITLE,
                    &format!("{}\n\n{}", job.file_name, job.url),
                );
                DispatchOutcome::Delivered
            }
            Err(error) => {
                warn!(url = %job.url, %error, "both attempts failed, using fallback");
                self.host.notify(
                    NOTIFY_FALLBACK_TITLE,
                    &format!("Falling back to the host download\n\n{}", job.file_name),
                );
                self.invoke_fallback(&job).await;
                DispatchOutcome::FellBack
            }
        }
    }

    /// Per-call mode: attempt, fixed delay, retry the call once.
    async fn send_via_call(
        &self,
        profile: &ServerProfile,
        job: &DispatchJob,
        options: Value,
    ) -> Result<(), RpcError> {
        let transport = CallTransport::new(profile.http_url())?;
        let client = Aria2Client::new(Arc::new(transport), profile.secret());

        match client.add_uri(&[job.url.as_str()], options.clone()).await {
            Ok(_) => Ok(()),
            Err(error) => {
                warn!(%error, attempt = 1, "addUri failed, retrying");
                sleep(RETRY_DELAY).await;
                client.add_uri(&[job.url.as_str()], options).await.map(|_| ())
            }
        }
    }

    /// Channel mode: a failed open retries the full open+call sequence; a
    /// failed call retries only the call. The channel is opened for this
    /// dispatch alone and closed before returning.
    async fn send_via_channel(
        &self,
        profile: &ServerProfile,
        job: &DispatchJob,
        options: Value,
    ) -> Result<(), RpcError> {
        match ChannelTransport::connect(profile.ws_url()).await {
            Ok(channel) => {
                let channel = Arc::new(channel);
                let client = Aria2Client::new(
                    Arc::clone(&channel) as Arc<dyn RpcTransport>,
                    profile.secret(),
                );
                let outcome = match client.add_uri(&[job.url.as_str()], options.clone()).await {
                    Ok(_) => Ok(()),
                    Err(error) => {
                        warn!(%error, attempt = 1, "addUri failed on open channel, retrying call");
                        sleep(RETRY_DELAY).await;
                        client.add_uri(&[job.url.as_str()], options).await.map(|_| ())
                    }
                };
                channel.close();
                outcome
            }
            Err(error) => {
                warn!(%error, attempt = 1, "channel open failed, retrying open and call");
                sleep(RETRY_DELAY).await;
                let channel = Arc::new(ChannelTransport::connect(profile.ws_url()).await?);
                let client = Aria2Client::new(
                    Arc::clone(&channel) as Arc<dyn RpcTransport>,
                    profile.secret(),
                );
                let outcome = client.add_uri(&[job.url.as_str()], options).await.map(|_| ());
                channel.close();
                outcome
            }
        }
    }

    async fn invoke_fallback(&self, job: &DispatchJob) {
        self.host
            .direct_download(DirectDownload {
                url: job.url.clone(),
                file_name: job.file_name.clone(),
                file_path: job.file_path.clone(),
                headers: job.headers.clone(),
                save_as: false,
            })
            .await;
    }
}

/// Picks the target profile: explicit id if found, else active id, else the
/// first entry.
///
/// Callers guarantee `profiles` is non-empty.
fn resolve_profile<'a>(
    profiles: &'a [ServerProfile],
    explicit: Option<&str>,
    active: Option<&str>,
) -> &'a ServerProfile {
    let find = |id: &str| profiles.iter().find(|p| p.id == id);
    explicit
        .and_then(find)
        .or_else(|| active.and_then(find))
        .unwrap_or(&profiles[0])
}

/// Builds the aria2 per-download options object for a job.
fn build_options(job: &DispatchJob, profile: &ServerProfile) -> Value {
    let mut options = serde_json::Map::new();
    if !job.headers.is_empty() {
        options.insert("header".to_string(), json!(job.headers));
    }
    if !job.file_name.is_empty() {
        options.insert("out".to_string(), json!(job.file_name));
    }
    options.insert("parameterized-uri".to_string(), json!("false"));

    let dir = if job.file_path.is_empty() {
        &profile.remote_dir
    } else {
        &job.file_path
    };
    if !dir.is_empty() {
        options.insert("dir".to_string(), json!(normalize_dir(dir)));
    }
    Value::Object(options)
}

/// Converts path separators to the platform's.
fn normalize_dir(dir: &str) -> String {
    dir.chars()
        .map(|c| {
            if c == '/' || c == '\\' {
                std::path::MAIN_SEPARATOR
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Protocol;

    fn profile(id: &str, protocol: Protocol) -> ServerProfile {
        ServerProfile {
            id: id.to_string(),
            name: id.to_string(),
            protocol,
            host: "127.0.0.1".to_string(),
            port: 6800,
            interface_path: "jsonrpc".to_string(),
            secret: String::new(),
            remote_dir: String::new(),
        }
    }

    fn job() -> DispatchJob {
        DispatchJob {
            url: "https://example.com/a.zip".to_string(),
            file_name: "a.zip".to_string(),
            file_path: String::new(),
            headers: Vec::new(),
            server_id: None,
        }
    }

    #[test]
    fn test_resolve_profile_explicit_wins() {
        let profiles = vec![profile("s1", Protocol::Ws), profile("s2", Protocol::Http)];
        let picked = resolve_profile(&profiles, Some("s2"), Some("s1"));
        assert_eq!(picked.id, "s2");
    }

    #[test]
    fn test_resolve_profile_unknown_explicit_falls_to_active() {
        let profiles = vec![profile("s1", Protocol::Ws), profile("s2", Protocol::Http)];
        let picked = resolve_profile(&profiles, Some("ghost"), Some("s2"));
        assert_eq!(picked.id, "s2");
    }

    #[test]
    fn test_resolve_profile_stale_active_falls_to_first() {
        let profiles = vec![profile("s1", Protocol::Ws), profile("s2", Protocol::Http)];
        let picked = resolve_profile(&profiles, None, Some("gone"));
        assert_eq!(picked.id, "s1");
    }

    #[test]
    fn test_resolve_profile_no_pointers_uses_first() {
        let profiles = vec![profile("s1", Protocol::Ws)];
        assert_eq!(resolve_profile(&profiles, None, None).id, "s1");
    }

    #[test]
    fn test_build_options_header_param_only_when_present() {
        let p = profile("s1", Protocol::Http);
        let bare = build_options(&job(), &p);
        assert!(bare.get("header").is_none());

        let mut with_headers = job();
        with_headers.headers = vec!["Referer: https://origin.example/".to_string()];
        let built = build_options(&with_headers, &p);
        assert_eq!(
            built["header"],
            json!(["Referer: https://origin.example/"])
        );
    }

    #[test]
    fn test_build_options_out_and_pinned_flags() {
        let built = build_options(&job(), &profile("s1", Protocol::Http));
        assert_eq!(built["out"], json!("a.zip"));
        assert_eq!(built["parameterized-uri"], json!("false"));
    }

    #[test]
    fn test_build_options_job_dir_preferred_over_profile_dir() {
        let mut p = profile("s1", Protocol::Http);
        p.remote_dir = "/srv/default".to_string();

        let from_profile = build_options(&job(), &p);
        assert_eq!(from_profile["dir"], json!(normalize_dir("/srv/default")));

        let mut explicit = job();
        explicit.file_path = "/data/incoming".to_string();
        let from_job = build_options(&explicit, &p);
        assert_eq!(from_job["dir"], json!(normalize_dir("/data/incoming")));
    }

    #[test]
    fn test_build_options_no_dir_when_both_empty() {
        let built = build_options(&job(), &profile("s1", Protocol::Http));
        assert!(built.get("dir").is_none());
    }

    #[test]
    fn test_normalize_dir_unifies_separators() {
        let normalized = normalize_dir("downloads\\archive/2026");
        let sep = std::path::MAIN_SEPARATOR;
        assert_eq!(
            normalized,
            format!("downloads{sep}archive{sep}2026")
        );
    }
}
