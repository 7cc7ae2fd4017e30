//! Charset repair for filenames delivered as byte-as-char mojibake.
//!
//! Some servers emit raw non-UTF-8 bytes in Content-Disposition; by the time
//! the host hands the value over, each byte has been widened into a char
//! (0x00-0xFF). Sniff the probable source encoding over those byte values
//! and redecode. Anything that cannot be repaired is returned unchanged.

use chardetng::EncodingDetector;

/// Redecodes a probable mis-encoded filename.
///
/// When every char fits in a byte and the string is not pure ASCII, the char
/// codes are reinterpreted as bytes of the sniffed encoding and decoded.
/// Decode errors, chars above 0xFF, and pure-ASCII input all yield the input
/// unchanged.
#[must_use]
pub fn decode_misencoded_name(name: &str) -> String {
    if name.is_ascii() {
        return name.to_string();
    }
    let Some(bytes) = chars_as_bytes(name) else {
        return name.to_string();
    };

    let mut detector = EncodingDetector::new();
    detector.feed(&bytes, true);
    let encoding = detector.guess(None, true);

    let (decoded, had_errors) = encoding.decode_without_bom_handling(&bytes);
    if had_errors {
        return name.to_string();
    }
    decoded.into_owned()
}

/// The string's char codes as bytes, or `None` if any char exceeds 0xFF.
fn chars_as_bytes(name: &str) -> Option<Vec<u8>> {
    name.chars()
        .map(|c| u8::try_from(u32::from(c)).ok())
        .collect()
}
