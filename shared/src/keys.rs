//! Object key decoding.

use std::borrow::Cow;

/// Decodes an object key as delivered in an S3 notification.
///
/// Notifications form-encode keys: a space arrives as `+` and reserved characters
/// as `%XX` (partition segments show up as `year%3D2025`). Decoding is best-effort;
/// a key with a malformed escape is returned unchanged.
pub fn decode_object_key(key: &str) -> String {
    let spaced = key.replace('+', " ");
    if has_malformed_escape(&spaced) {
        return key.to_string();
    }
    urlencoding::decode(&spaced)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| key.to_string())
}

fn has_malformed_escape(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.iter().enumerate().any(|(i, b)| {
        *b == b'%'
            && !(bytes.get(i + 1).map_or(false, u8::is_ascii_hexdigit)
                && bytes.get(i + 2).map_or(false, u8::is_ascii_hexdigit))
    })
}
