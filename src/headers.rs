//! Header name/value pairs as delivered by the host's network event stream.

use serde::{Deserialize, Serialize};

/// A single protocol header observed on a request or response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Header name as sent on the wire (case preserved).
    pub name: String,
    /// Raw header value.
    pub value: String,
}

impl Header {
    /// Creates a header from name/value parts.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Returns the value of the first header matching `name` (case-insensitive).
#[must_use]
pub fn find_header<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}
