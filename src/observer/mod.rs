//! Correlation of asynchronous network events by request identifier.
//!
//! The host emits request-sent, response-headers, request-error, and
//! tab-closed events on independent callbacks. [`NetworkObserver`] keeps the
//! pending-request table that joins a response back to the request that
//! produced it, so the capture pipeline can see the original request headers
//! (Referer, Cookie, Authorization) when a response is classified.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::headers::Header;

/// A request-sent event from the host.
#[derive(Debug, Clone)]
pub struct RequestEvent {
    /// Host-assigned request identifier, unique among in-flight requests.
    pub request_id: String,
    /// Identifier of the tab that issued the request.
    pub tab_id: i64,
    /// Request URL.
    pub url: String,
    /// Headers sent with the request.
    pub request_headers: Vec<Header>,
}

/// A response-headers event from the host.
#[derive(Debug, Clone)]
pub struct ResponseEvent {
    /// Identifier matching the originating [`RequestEvent`].
    pub request_id: String,
    /// Response URL (post-redirect).
    pub url: String,
    /// HTTP status code.
    pub status_code: u16,
    /// Headers received on the response.
    pub response_headers: Vec<Header>,
}

/// A request captured while awaiting its response.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// Host-assigned request identifier.
    pub request_id: String,
    /// Tab that issued the request.
    pub tab_id: i64,
    /// Request URL.
    pub url: String,
    /// Headers sent with the request.
    pub request_headers: Vec<Header>,
}

/// A response joined to its originating request, ready for classification.
///
/// `matched_request` is `None` when no request-sent event was observed for
/// this response; downstream components treat that as "no request header
/// context available", not as an error.
#[derive(Debug, Clone)]
pub struct CaptureRecord {
    /// Response URL.
    pub url: String,
    /// HTTP status code.
    pub status_code: u16,
    /// Headers received on the response.
    pub response_headers: Vec<Header>,
    /// The originating request, if one was observed.
    pub matched_request: Option<PendingRequest>,
}

/// Pending-request table keyed by request identifier.
///
/// Invariant: at most one live [`PendingRequest`] per request id. A duplicate
/// request-sent event replaces the stored entry (last write wins). An entry
/// is removed when its response is matched, when the request errors, or when
/// its owning tab closes, and is never read after removal.
#[derive(Debug, Default)]
pub struct NetworkObserver {
    pending: HashMap<String, PendingRequest>,
}

impl NetworkObserver {
    /// Creates an empty observer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a request-sent event.
    pub fn on_request_sent(&mut self, evt: RequestEvent) {
        let entry = PendingRequest {
            request_id: evt.request_id.clone(),
            tab_id: evt.tab_id,
            url: evt.url,
            request_headers: evt.request_headers,
        };
        if self.pending.insert(evt.request_id.clone(), entry).is_some() {
            trace!(request_id = %evt.request_id, "replaced pending request with duplicate id");
        }
    }

    /// Joins a response-headers event to its stored request.
    ///
    /// The matching [`PendingRequest`] is consumed: a second response event
    /// with the same id yields `matched_request: None`.
    pub fn on_response_headers(&mut self, evt: ResponseEvent) -> CaptureRecord {
        let matched = self.pending.remove(&evt.request_id);
        if matched.is_none() {
            trace!(request_id = %evt.request_id, "response without a stored request");
        }
        CaptureRecord {
            url: evt.url,
            status_code: evt.status_code,
            response_headers: evt.response_headers,
            matched_request: matched,
        }
    }

    /// Purges the entry for a request that failed before headers arrived.
    pub fn on_request_error(&mut self, request_id: &str) {
        if self.pending.remove(request_id).is_some() {
            debug!(request_id, "purged pending request after request error");
        }
    }

    /// Purges every entry owned by a closed tab.
    ///
    /// Full scan; the concurrent pending count is small.
    pub fn on_tab_closed(&mut self, tab_id: i64) {
        let before = self.pending.len();
        self.pending.retain(|_, req| req.tab_id != tab_id);
        let removed = before - self.pending.len();
        if removed > 0 {
            debug!(tab_id, removed, "purged pending requests for closed tab");
        }
    }

    /// Number of requests currently awaiting a response.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(id: &str, tab: i64, url: &str) -> RequestEvent {
        RequestEvent {
            request_id: id.to_string(),
            tab_id: tab,
            url: url.to_string(),
            request_headers: vec![Header::new("Referer", "https://origin.example/")],
        }
    }

    fn response(id: &str, url: &str) -> ResponseEvent {
        ResponseEvent {
            request_id: id.to_string(),
            url: url.to_string(),
            status_code: 200,
            response_headers: Vec::new(),
        }
    }

    #[test]
    fn test_response_joins_stored_request() {
        let mut observer = NetworkObserver::new();
        observer.on_request_sent(request("r1", 7, "https://example.com/file.zip"));

        let record = observer.on_response_headers(response("r1", "https://example.com/file.zip"));
        let matched = record.matched_request.unwrap();
        assert_eq!(matched.request_id, "r1");
        assert_eq!(matched.tab_id, 7);
        assert_eq!(observer.pending_len(), 0, "entry is consumed on match");
    }

    #[test]
    fn test_duplicate_request_id_replaces_never_duplicates() {
        let mut observer = NetworkObserver::new();
        observer.on_request_sent(request("r1", 1, "https://example.com/a"));
        observer.on_request_sent(request("r1", 2, "https://example.com/b"));

        assert_eq!(observer.pending_len(), 1);
        let record = observer.on_response_headers(response("r1", "https://example.com/b"));
        assert_eq!(
            record.matched_request.unwrap().url,
            "https://example.com/b",
            "last write wins"
        );
    }

    #[test]
    fn test_unmatched_response_yields_no_request_context() {
        let mut observer = NetworkObserver::new();
        let record = observer.on_response_headers(response("ghost", "https://example.com/x"));
        assert!(record.matched_request.is_none());
    }

    #[test]
    fn test_response_consumes_entry_at_most_once() {
        let mut observer = NetworkObserver::new();
        observer.on_request_sent(request("r1", 1, "https://example.com/a"));

        let first = observer.on_response_headers(response("r1", "https://example.com/a"));
        assert!(first.matched_request.is_some());
        let second = observer.on_response_headers(response("r1", "https://example.com/a"));
        assert!(second.matched_request.is_none());
    }

    #[test]
    fn test_request_error_purges_entry() {
        let mut observer = NetworkObserver::new();
        observer.on_request_sent(request("r1", 1, "https://example.com/a"));
        observer.on_request_error("r1");

        let record = observer.on_response_headers(response("r1", "https://example.com/a"));
        assert!(record.matched_request.is_none());
    }

    #[test]
    fn test_request_error_for_unknown_id_is_noop() {
        let mut observer = NetworkObserver::new();
        observer.on_request_error("nope");
        assert_eq!(observer.pending_len(), 0);
    }

    #[test]
    fn test_tab_closed_purges_only_that_tab() {
        let mut observer = NetworkObserver::new();
        observer.on_request_sent(request("r1", 1, "https://example.com/a"));
        observer.on_request_sent(request("r2", 1, "https://example.com/b"));
        observer.on_request_sent(request("r3", 2, "https://example.com/c"));

        observer.on_tab_closed(1);

        assert_eq!(observer.pending_len(), 1);
        let record = observer.on_response_headers(response("r3", "https://example.com/c"));
        assert!(record.matched_request.is_some());
    }
}
