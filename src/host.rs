//! Collaborator interface the embedding host implements.

use async_trait::async_trait;

/// Arguments for the host's direct-download primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectDownload {
    /// Download URL.
    pub url: String,
    /// Target filename; empty lets the host pick.
    pub file_name: String,
    /// Target directory; empty uses the host default.
    pub file_path: String,
    /// Request headers to replay, formatted `Name: value`.
    pub headers: Vec<String>,
    /// Whether the host should prompt with a save-as dialog.
    pub save_as: bool,
}

/// Fields shown in the host's download confirmation panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelRequest {
    /// Download URL.
    pub url: String,
    /// Derived filename, editable by the user.
    pub file_name: String,
    /// Human-readable size, or empty when unknown.
    pub file_size: String,
    /// Request headers to forward, formatted `Name: value`.
    pub headers: Vec<String>,
}

/// Host primitives the capture pipeline drives.
///
/// Implementations must be cheap to call; the pipeline invokes them from the
/// deferred dispatch path, never from the synchronous decision callback.
#[async_trait]
pub trait HostActions: Send + Sync {
    /// Shows a user-facing notification.
    fn notify(&self, title: &str, body: &str);

    /// Starts a host-managed direct download (the fallback path).
    async fn direct_download(&self, request: DirectDownload);

    /// Opens the download confirmation panel with derived fields.
    fn open_download_panel(&self, request: PanelRequest);

    /// Opens the host's settings surface (used for the configure prompt).
    fn open_settings(&self);
}
