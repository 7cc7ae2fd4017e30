//! Filename and size derivation from response headers.
//!
//! Filenames come from Content-Disposition when the header parses, otherwise
//! from the URL's last path segment. Raw names then run through a fixed
//! repair pipeline: percent-decode, a second decode pass tolerant of
//! double-encoded names, quote stripping, charset repair for byte-as-char
//! mojibake, and filesystem sanitation.
//!
//! Every step recovers locally — a name that fails a step passes through
//! unchanged. Extraction never aborts a dispatch.

mod charset;

pub use charset::decode_misencoded_name;

use std::borrow::Cow;

use bytesize::ByteSize;

use crate::headers::find_header;
use crate::observer::CaptureRecord;

/// Derives a filesystem-safe filename for a captured response.
#[must_use]
pub fn extract_file_name(record: &CaptureRecord) -> String {
    let raw = find_header(&record.response_headers, "content-disposition")
        .and_then(parse_content_disposition)
        .unwrap_or_else(|| file_name_from_url(&record.url));

    let decoded = percent_decode_lossy(&raw);
    // Second pass catches servers that percent-encode twice; a failed or
    // idle pass leaves the name as-is.
    let decoded = percent_decode_lossy(&decoded);
    let stripped: String = decoded.chars().filter(|c| *c != '"').collect();
    let repaired = decode_misencoded_name(&stripped);
    sanitize_file_name(&repaired)
}

/// Human-readable size from a Content-Length header, or `""` when absent
/// or unparseable.
#[must_use]
pub fn extract_file_size(record: &CaptureRecord) -> String {
    find_header(&record.response_headers, "content-length")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|n| ByteSize(n).to_string())
        .unwrap_or_default()
}

/// Parses a Content-Disposition value into a filename.
///
/// Walks the `; key=value` parameter grammar with quoted-string backslash
/// escapes and the `key*=charset'lang'value` extended form (RFC 5987),
/// percent-decoding extended values in their declared charset. `filename*`
/// wins over `filename`. Returns `None` when no usable parameter parses.
fn parse_content_disposition(header: &str) -> Option<String> {
    let params_start = header.find(';')?;
    let params = parse_parameters(&header[params_start..]);

    if let Some((_, value)) = params.iter().find(|(key, _)| key == "filename*")
        && let Some(decoded) = decode_ext_value(value)
    {
        return Some(decoded);
    }
    params
        .iter()
        .find(|(key, _)| key == "filename")
        .map(|(_, value)| value.clone())
}

/// Characters allowed in a parameter token (HTTP `token` grammar).
fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+.^_`|~-".contains(c)
}

/// Parses `; key=value` pairs, stopping at the first malformed parameter.
///
/// Keys are lowercased; quoted-string values are unquoted with `\X` escapes
/// resolved. An unterminated quoted-string discards that parameter.
fn parse_parameters(input: &str) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut rest = input;
    loop {
        rest = rest.trim_start_matches([' ', '\t']);
        let Some(after_sep) = rest.strip_prefix(';') else {
            break;
        };
        rest = after_sep.trim_start_matches([' ', '\t']);

        let key_end = rest.find(|c| !is_token_char(c)).unwrap_or(rest.len());
        if key_end == 0 {
            break;
        }
        let key = rest[..key_end].to_ascii_lowercase();
        rest = rest[key_end..].trim_start_matches([' ', '\t']);

        let Some(after_eq) = rest.strip_prefix('=') else {
            break;
        };
        rest = after_eq.trim_start_matches([' ', '\t']);

        if let Some(quoted) = rest.strip_prefix('"') {
            let mut value = String::new();
            let mut close = None;
            let mut chars = quoted.char_indices();
            while let Some((i, c)) = chars.next() {
                match c {
                    '\\' => {
                        if let Some((_, escaped)) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => {
                        close = Some(i);
                        break;
                    }
                    other => value.push(other),
                }
            }
            let Some(close) = close else {
                break;
            };
            params.push((key, value));
            rest = &quoted[close + 1..];
        } else {
            let value_end = rest.find(|c| !is_token_char(c)).unwrap_or(rest.len());
            if value_end == 0 {
                break;
            }
            params.push((key, rest[..value_end].to_string()));
            rest = &rest[value_end..];
        }
    }
    params
}

/// Decodes an RFC 5987 `charset'lang'percent-encoded` value.
fn decode_ext_value(value: &str) -> Option<String> {
    let (charset, rest) = value.split_once('\'')?;
    let (_lang, encoded) = rest.split_once('\'')?;
    if charset.is_empty() || encoded.is_empty() {
        return None;
    }
    let encoding = encoding_rs::Encoding::for_label(charset.as_bytes())?;
    let bytes = urlencoding::decode_binary(encoded.as_bytes());
    let (decoded, had_errors) = encoding.decode_without_bom_handling(&bytes);
    if had_errors {
        return None;
    }
    Some(decoded.into_owned())
}

/// Filename fallback: text after the URL's final `/`, before any `?`.
fn file_name_from_url(url: &str) -> String {
    let path = url.split('?').next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or("").to_string()
}

/// Percent-decodes, keeping the input on invalid UTF-8.
fn percent_decode_lossy(value: &str) -> String {
    match urlencoding::decode(value) {
        Ok(decoded) => match decoded {
            Cow::Borrowed(s) => s.to_string(),
            Cow::Owned(s) => s,
        },
        Err(_) => value.to_string(),
    }
}

/// Replaces characters invalid on common filesystems with `_`.
///
/// Dot-only names (`.`, `..`) are rewritten so a derived name can never
/// escape the download directory.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }
    if sanitized.chars().all(|c| c == '.') {
        return sanitized.chars().map(|_| '_').collect();
    }
    sanitized
}
