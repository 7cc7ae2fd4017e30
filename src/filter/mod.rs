//! Capture decision engine.
//!
//! [`evaluate`] is the pure classification step that runs synchronously
//! inside the host's response callback and decides whether a response is
//! intercepted. It performs no I/O; its only side effect is consuming an
//! armed gesture bypass.
//!
//! Rules run in a fixed order and the first matching bypass rule wins:
//! gesture bypass, site filter, extension filter, minimum size. Only when no
//! rule bypasses is the response classified by Content-Disposition and
//! Content-Type.

mod wildcard;

pub use wildcard::{WildcardPattern, parse_pattern_list};

use std::time::{Duration, Instant};

use tracing::trace;
use url::Url;

use crate::headers::find_header;
use crate::observer::CaptureRecord;

/// How long an armed gesture bypass stays live before expiring.
pub const BYPASS_WINDOW: Duration = Duration::from_secs(5);

/// Whether a pattern list admits or rejects matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Only matching entries are captured.
    Whitelist,
    /// Matching entries are never captured.
    #[default]
    Blacklist,
}

impl FilterMode {
    /// Parses a stored mode value; anything unrecognized is blacklist.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("whitelist") {
            Self::Whitelist
        } else {
            Self::Blacklist
        }
    }
}

/// Immutable filter configuration snapshot.
///
/// Replaced wholesale on settings reload; never mutated in place, so an
/// in-flight decision sees either the fully-old or fully-new snapshot.
/// `Default` mirrors the stored-settings default table.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Site patterns matched against the URL and Referer hostnames.
    pub sites: Vec<WildcardPattern>,
    /// Site list interpretation.
    pub site_mode: FilterMode,
    /// Extension patterns matched against the URL path extension.
    pub extensions: Vec<WildcardPattern>,
    /// Extension list interpretation.
    pub extension_mode: FilterMode,
    /// Responses smaller than this (when known) are not captured; 0 disables.
    pub min_size_bytes: u64,
    /// Whether the modifier-key gesture bypasses capture.
    pub alt_key_bypass_enabled: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            sites: Vec::new(),
            site_mode: FilterMode::Blacklist,
            extensions: Vec::new(),
            extension_mode: FilterMode::Blacklist,
            min_size_bytes: 0,
            alt_key_bypass_enabled: true,
        }
    }
}

/// One-shot bypass armed by a user modifier-key gesture.
///
/// Arming is overwritten by a newer gesture and expires after
/// [`BYPASS_WINDOW`] even if never consumed; expiry is checked on every read
/// so a stale arm is never observable.
#[derive(Debug, Default)]
pub struct GestureBypass {
    armed_at: Option<Instant>,
}

impl GestureBypass {
    /// Creates a disarmed bypass.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the bypass for the next capture decision.
    pub fn arm(&mut self) {
        self.armed_at = Some(Instant::now());
    }

    /// Clears the armed state.
    pub fn disarm(&mut self) {
        self.armed_at = None;
    }

    /// Whether the bypass is currently armed and unexpired.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed_at
            .is_some_and(|at| at.elapsed() <= BYPASS_WINDOW)
    }

    /// Consumes the armed state. Returns true when an unexpired arm existed.
    pub fn take(&mut self) -> bool {
        let live = self.is_armed();
        self.armed_at = None;
        live
    }
}

/// Outcome of a capture decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the host should cancel its default handling.
    pub intercept: bool,
    /// Whether an armed gesture bypass was consumed by this decision.
    pub consumed_bypass: bool,
}

impl Decision {
    fn pass() -> Self {
        Self {
            intercept: false,
            consumed_bypass: false,
        }
    }
}

/// Decides whether `record` should be intercepted.
pub fn evaluate(
    record: &CaptureRecord,
    config: &FilterConfig,
    bypass: &mut GestureBypass,
) -> Decision {
    // Only successful responses carry downloadable payloads.
    if record.status_code != 200 {
        return Decision::pass();
    }

    // 1. Gesture bypass: consume the armed flag and let the host handle it.
    if config.alt_key_bypass_enabled && bypass.take() {
        trace!(url = %record.url, "gesture bypass consumed, skipping capture");
        return Decision {
            intercept: false,
            consumed_bypass: true,
        };
    }

    // 2. Site filter against both the response URL and the Referer origin.
    let hostname = hostname_of(&record.url);
    let referer_hostname = record
        .matched_request
        .as_ref()
        .and_then(|req| find_header(&req.request_headers, "referer"))
        .map(hostname_of)
        .unwrap_or_default();
    let site_matched = config
        .sites
        .iter()
        .any(|p| p.matches(&hostname) || p.matches(&referer_hostname));
    match config.site_mode {
        FilterMode::Whitelist => {
            if !config.sites.is_empty() && !site_matched {
                trace!(%hostname, "site not in whitelist, skipping capture");
                return Decision::pass();
            }
        }
        FilterMode::Blacklist => {
            if site_matched {
                trace!(%hostname, "site in blacklist, skipping capture");
                return Decision::pass();
            }
        }
    }

    // 3. Extension filter, only when the URL path carries an extension.
    if let Some(ext) = url_path_extension(&record.url) {
        let ext_matched = config.extensions.iter().any(|p| p.matches(&ext));
        match config.extension_mode {
            FilterMode::Whitelist => {
                if !config.extensions.is_empty() && !ext_matched {
                    trace!(%ext, "extension not in whitelist, skipping capture");
                    return Decision::pass();
                }
            }
            FilterMode::Blacklist => {
                if ext_matched {
                    trace!(%ext, "extension in blacklist, skipping capture");
                    return Decision::pass();
                }
            }
        }
    }

    // 4. Minimum size, when both a threshold and a parseable length exist.
    if config.min_size_bytes > 0
        && let Some(length) = content_length(record)
        && length > 0
        && length < config.min_size_bytes
    {
        trace!(length, min = config.min_size_bytes, "below minimum size, skipping capture");
        return Decision::pass();
    }

    Decision {
        intercept: classify(record),
        consumed_bypass: false,
    }
}

/// Content-Type subtypes under `application/` that stay with the host.
///
/// Prefix semantics: `application/xhtml+xml` is excluded by `xhtml`.
const EXCLUDED_APPLICATION_SUBTYPES: [&str; 6] = [
    "pdf",
    "xhtml",
    "x-xpinstall",
    "x-shockwave-flash",
    "rss",
    "json",
];

/// Classifies a response as downloadable from its headers alone.
fn classify(record: &CaptureRecord) -> bool {
    if let Some(disposition) = find_header(&record.response_headers, "content-disposition") {
        let disposition = disposition.trim_start().to_ascii_lowercase();
        if disposition.starts_with("attachment") {
            return true;
        }
    }

    let Some(content_type) = find_header(&record.response_headers, "content-type") else {
        return false;
    };
    let content_type = content_type.trim().to_ascii_lowercase();

    if let Some(subtype) = content_type.strip_prefix("application/") {
        let subtype = subtype.split(';').next().unwrap_or("").trim();
        return !EXCLUDED_APPLICATION_SUBTYPES
            .iter()
            .any(|excluded| subtype.starts_with(excluded));
    }

    content_type.starts_with("audio/") || content_type.starts_with("video/")
}

/// Hostname of a URL, or the empty string when it cannot be parsed.
fn hostname_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

/// Extension (including the dot, lowercase) of the URL's last path segment.
///
/// Query and fragment are stripped first; a trailing dot yields no extension.
fn url_path_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next().unwrap_or(path);
    let dot = segment.rfind('.')?;
    let ext = &segment[dot..];
    if ext.len() <= 1 {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Parsed Content-Length of the record, if present and numeric.
fn content_length(record: &CaptureRecord) -> Option<u64> {
    find_header(&record.response_headers, "content-length")
        .and_then(|v| v.trim().parse::<u64>().ok())
}
