//! Host-facing capture pipeline context.
//!
//! [`Relay`] owns the mutable pipeline state — the pending-request table,
//! the current settings snapshot, and the gesture bypass — and is the single
//! entry point the host drives. The cancel/allow decision runs synchronously
//! inside [`Relay::on_response_headers`] so the host gets its answer within
//! the callback window; extraction and dispatch are deferred to a spawned
//! task.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::{
    DispatchPrefs, SettingsStore, load_dispatch_prefs, load_filter_config,
};
use crate::dispatch::{DispatchCoordinator, DispatchJob, DispatchOutcome};
use crate::filter::{self, FilterConfig, GestureBypass};
use crate::headers::find_header;
use crate::host::{HostActions, PanelRequest};
use crate::metadata;
use crate::observer::{CaptureRecord, NetworkObserver, RequestEvent, ResponseEvent};

/// Request headers replayed to the daemon when present on the capture.
const FORWARDED_HEADERS: [&str; 4] = ["Referer", "Cookie", "Cookie2", "Authorization"];

/// One atomically-replaced view of the stored settings.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Capture filter configuration.
    pub filter: FilterConfig,
    /// Dispatch behavior preferences.
    pub prefs: DispatchPrefs,
}

impl Snapshot {
    fn load(store: &dyn SettingsStore) -> Self {
        Self {
            filter: load_filter_config(store),
            prefs: load_dispatch_prefs(store),
        }
    }
}

/// The capture pipeline: observation, decision, deferred dispatch.
pub struct Relay {
    observer: NetworkObserver,
    snapshot: Arc<Snapshot>,
    bypass: GestureBypass,
    store: Arc<dyn SettingsStore>,
    host: Arc<dyn HostActions>,
}

impl Relay {
    /// Creates a relay with settings loaded from `store`.
    pub fn new(store: Arc<dyn SettingsStore>, host: Arc<dyn HostActions>) -> Self {
        let snapshot = Arc::new(Snapshot::load(store.as_ref()));
        Self {
            observer: NetworkObserver::new(),
            snapshot,
            bypass: GestureBypass::new(),
            store,
            host,
        }
    }

    /// Re-reads the store and swaps the settings snapshot.
    ///
    /// The swap is a single assignment: in-flight work keeps the snapshot it
    /// started with.
    pub fn reload_settings(&mut self) {
        self.snapshot = Arc::new(Snapshot::load(self.store.as_ref()));
        debug!("settings snapshot reloaded");
    }

    /// The current settings snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot)
    }

    /// Records a request-sent event.
    pub fn on_request_sent(&mut self, evt: RequestEvent) {
        self.observer.on_request_sent(evt);
    }

    /// Handles a response-headers event; returns whether the host should
    /// cancel its default handling.
    ///
    /// Runs the capture decision synchronously and, on interception, defers
    /// the extraction/dispatch work to a spawned task so the host callback
    /// returns immediately.
    pub fn on_response_headers(&mut self, evt: ResponseEvent) -> bool {
        let record = self.observer.on_response_headers(evt);
        let snapshot = Arc::clone(&self.snapshot);
        let decision = filter::evaluate(&record, &snapshot.filter, &mut self.bypass);
        if decision.consumed_bypass {
            trace!(url = %record.url, "capture skipped by gesture bypass");
        }
        if !decision.intercept {
            return false;
        }

        let store = Arc::clone(&self.store);
        let host = Arc::clone(&self.host);
        tokio::spawn(async move {
            process_capture(record, snapshot, store, host).await;
        });
        true
    }

    /// Purges the pending request for a failed exchange.
    pub fn on_request_error(&mut self, request_id: &str) {
        self.observer.on_request_error(request_id);
    }

    /// Purges pending requests owned by a closed tab.
    pub fn on_tab_closed(&mut self, tab_id: i64) {
        self.observer.on_tab_closed(tab_id);
    }

    /// Handles the user's modifier-key gesture signal.
    ///
    /// A press arms the one-shot bypass; releases are ignored. The arm
    /// expires on its own after the bypass window.
    pub fn on_modifier_gesture(&mut self, pressed: bool) {
        if pressed {
            self.bypass.arm();
            trace!("gesture bypass armed");
        }
    }

    /// Dispatches a job directly (the confirmation panel's submit path).
    pub async fn dispatch(&self, job: DispatchJob) -> DispatchOutcome {
        DispatchCoordinator::new(Arc::clone(&self.store), Arc::clone(&self.host))
            .dispatch(job)
            .await
    }

    /// Number of requests currently awaiting a response (for diagnostics).
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.observer.pending_len()
    }
}

/// The deferred half of a capture: derive metadata, then confirm or
/// dispatch.
async fn process_capture(
    record: CaptureRecord,
    snapshot: Arc<Snapshot>,
    store: Arc<dyn SettingsStore>,
    host: Arc<dyn HostActions>,
) {
    let file_name = metadata::extract_file_name(&record);
    let file_size = metadata::extract_file_size(&record);
    let headers = forward_headers(&record, snapshot.prefs.forward_user_agent);
    debug!(url = %record.url, file = %file_name, "capture prepared");

    if snapshot.prefs.confirm_before_dispatch {
        host.open_download_panel(PanelRequest {
            url: record.url,
            file_name,
            file_size,
            headers,
        });
        return;
    }

    let job = DispatchJob {
        url: record.url,
        file_name,
        file_path: String::new(),
        headers,
        server_id: None,
    };
    DispatchCoordinator::new(store, host).dispatch(job).await;
}

/// Formats the forwarded request headers for a capture.
///
/// Without a matched request there is no header context and the list is
/// empty.
fn forward_headers(record: &CaptureRecord, include_user_agent: bool) -> Vec<String> {
    let Some(request) = &record.matched_request else {
        return Vec::new();
    };
    let mut names: Vec<&str> = FORWARDED_HEADERS.to_vec();
    if include_user_agent {
        names.push("User-Agent");
    }
    names
        .into_iter()
        .filter_map(|name| {
            find_header(&request.request_headers, name).map(|value| format!("{name}: {value}"))
        })
        .collect()
}
