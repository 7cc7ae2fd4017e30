//! Stored configuration: server profiles, filter settings, dispatch
//! preferences.
//!
//! All state lives in the host's key-value store behind [`SettingsStore`]
//! and is read on demand. Each value falls back to a fixed default when the
//! key is absent or malformed; a parse failure is recovered locally (logged,
//! never surfaced).

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::filter::{FilterConfig, FilterMode, parse_pattern_list};

/// Storage key holding the serialized [`ServerProfile`] list.
pub const KEY_RPC_SERVERS: &str = "rpc-servers";
/// Storage key holding the active profile id.
pub const KEY_ACTIVE_SERVER_ID: &str = "active-server-id";
/// Storage key for the site pattern list (newline/comma separated).
pub const KEY_FILTER_SITES: &str = "filter-sites";
/// Storage key for the site list mode (`whitelist`/`blacklist`).
pub const KEY_SITE_FILTER_MODE: &str = "site-filter-mode";
/// Storage key for the extension pattern list.
pub const KEY_FILTER_EXTS: &str = "filter-exts";
/// Storage key for the extension list mode.
pub const KEY_EXT_FILTER_MODE: &str = "ext-filter-mode";
/// Storage key for the minimum capture size in bytes.
pub const KEY_MIN_FILE_SIZE: &str = "min-file-size";
/// Storage key for the modifier-key bypass toggle.
pub const KEY_ALT_KEY_BYPASS: &str = "alt-key-bypass";
/// Storage key for routing captures through the confirmation panel.
pub const KEY_CONFIRM_DISPATCH: &str = "confirm-dispatch";
/// Storage key for forwarding the User-Agent header to the daemon.
pub const KEY_FORWARD_USER_AGENT: &str = "forward-user-agent";

/// Host key-value store the configuration is read from.
pub trait SettingsStore: Send + Sync {
    /// Returns the stored value for `key`, if any.
    fn get(&self, key: &str) -> Option<String>;
}

/// Endpoint protocol of a server profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Per-call mode over plain HTTP.
    Http,
    /// Per-call mode over TLS.
    Https,
    /// Channel mode over a plain WebSocket.
    #[default]
    Ws,
    /// Channel mode over a TLS WebSocket.
    Wss,
}

impl Protocol {
    /// Whether this protocol uses the persistent-channel transport.
    #[must_use]
    pub fn is_channel(self) -> bool {
        matches!(self, Self::Ws | Self::Wss)
    }
}

/// One configured daemon endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerProfile {
    /// Unique profile id.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Endpoint protocol; selects the transport mode.
    #[serde(default)]
    pub protocol: Protocol,
    /// Daemon host.
    pub host: String,
    /// Daemon port.
    pub port: u16,
    /// RPC interface path segment (no leading slash).
    #[serde(default = "default_interface_path")]
    pub interface_path: String,
    /// RPC secret token; empty means none.
    #[serde(default)]
    pub secret: String,
    /// Default download directory on the daemon side; empty means unset.
    #[serde(default)]
    pub remote_dir: String,
}

fn default_interface_path() -> String {
    "jsonrpc".to_string()
}

impl ServerProfile {
    /// Endpoint URL for the per-call transport.
    #[must_use]
    pub fn http_url(&self) -> String {
        let scheme = match self.protocol {
            Protocol::Https | Protocol::Wss => "https",
            Protocol::Http | Protocol::Ws => "http",
        };
        format!("{scheme}://{}:{}/{}", self.host, self.port, self.interface_path)
    }

    /// Endpoint URL for the channel transport.
    #[must_use]
    pub fn ws_url(&self) -> String {
        let scheme = match self.protocol {
            Protocol::Https | Protocol::Wss => "wss",
            Protocol::Http | Protocol::Ws => "ws",
        };
        format!("{scheme}://{}:{}/{}", self.host, self.port, self.interface_path)
    }

    /// The configured secret, or `None` when blank.
    #[must_use]
    pub fn secret(&self) -> Option<String> {
        if self.secret.is_empty() {
            None
        } else {
            Some(self.secret.clone())
        }
    }
}

/// Dispatch behavior preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPrefs {
    /// Route captures through the host's confirmation panel before
    /// dispatching.
    pub confirm_before_dispatch: bool,
    /// Include the User-Agent header among forwarded request headers.
    pub forward_user_agent: bool,
}

impl Default for DispatchPrefs {
    fn default() -> Self {
        Self {
            confirm_before_dispatch: true,
            forward_user_agent: false,
        }
    }
}

/// Loads the profile list and active id from the store.
///
/// Malformed JSON behaves as an empty list (recovered locally); the caller
/// decides how to surface "no profiles".
pub fn load_server_profiles(store: &dyn SettingsStore) -> (Vec<ServerProfile>, Option<String>) {
    let profiles = match store.get(KEY_RPC_SERVERS) {
        Some(raw) => match serde_json::from_str::<Vec<ServerProfile>>(&raw) {
            Ok(profiles) => profiles,
            Err(error) => {
                warn!(%error, "stored server profiles unparseable, treating as none");
                Vec::new()
            }
        },
        None => Vec::new(),
    };
    let active = store.get(KEY_ACTIVE_SERVER_ID).filter(|id| !id.is_empty());
    (profiles, active)
}

/// Loads the filter configuration, defaulting each field independently.
pub fn load_filter_config(store: &dyn SettingsStore) -> FilterConfig {
    let defaults = FilterConfig::default();
    FilterConfig {
        sites: store
            .get(KEY_FILTER_SITES)
            .map(|text| parse_pattern_list(&text))
            .unwrap_or_default(),
        site_mode: store
            .get(KEY_SITE_FILTER_MODE)
            .map(|v| FilterMode::parse(&v))
            .unwrap_or(defaults.site_mode),
        extensions: store
            .get(KEY_FILTER_EXTS)
            .map(|text| parse_pattern_list(&text))
            .unwrap_or_default(),
        extension_mode: store
            .get(KEY_EXT_FILTER_MODE)
            .map(|v| FilterMode::parse(&v))
            .unwrap_or(defaults.extension_mode),
        min_size_bytes: store
            .get(KEY_MIN_FILE_SIZE)
            .and_then(|v| parse_u64(KEY_MIN_FILE_SIZE, &v))
            .unwrap_or(defaults.min_size_bytes),
        alt_key_bypass_enabled: store
            .get(KEY_ALT_KEY_BYPASS)
            .map(|v| parse_bool(&v))
            .unwrap_or(defaults.alt_key_bypass_enabled),
    }
}

/// Loads dispatch preferences, defaulting each field independently.
pub fn load_dispatch_prefs(store: &dyn SettingsStore) -> DispatchPrefs {
    let defaults = DispatchPrefs::default();
    DispatchPrefs {
        confirm_before_dispatch: store
            .get(KEY_CONFIRM_DISPATCH)
            .map(|v| parse_bool(&v))
            .unwrap_or(defaults.confirm_before_dispatch),
        forward_user_agent: store
            .get(KEY_FORWARD_USER_AGENT)
            .map(|v| parse_bool(&v))
            .unwrap_or(defaults.forward_user_agent),
    }
}

fn parse_u64(key: &str, value: &str) -> Option<u64> {
    match value.trim().parse::<u64>() {
        Ok(parsed) => Some(parsed),
        Err(error) => {
            warn!(key, value, %error, "stored number unparseable, using default");
            None
        }
    }
}

/// `"true"`/`"false"` (case-insensitive); anything else is false.
fn parse_bool(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}
