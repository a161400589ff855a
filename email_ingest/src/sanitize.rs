//! Turns message ids and attachment names into safe storage key fragments.

use lazy_static::lazy_static;
use regex::Regex;
use uuid::Uuid;

/// Leaf name used when `sanitize_filename` is handed nothing usable.
pub const DEFAULT_FILENAME: &str = "attachment.csv";

lazy_static! {
    static ref DISALLOWED: Regex = Regex::new(r"[^A-Za-z0-9._-]+").unwrap();
}

/// Strips the angle brackets from a `Message-ID` and collapses every run of
/// characters outside `[A-Za-z0-9._-]` into a single `-`.
///
/// May return an empty string; see [`message_id_or_generated`].
pub fn sanitize_message_id(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches(|c| c == '<' || c == '>').trim();
    DISALLOWED.replace_all(trimmed, "-").into_owned()
}

/// The sanitized message id, or a fresh UUID when there is nothing left of it.
pub fn message_id_or_generated(raw: Option<&str>) -> String {
    let sanitized = raw.map(sanitize_message_id).unwrap_or_default();
    if sanitized.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        sanitized
    }
}

/// Keeps only the base name of an attachment file name and replaces every run of
/// disallowed characters with `_`.
///
/// Directory components are dropped for both `/` and `\` separators, so
/// `../../etc/passwd` becomes `passwd`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name
        .trim_end_matches(|c| c == '/' || c == '\\')
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();
    let cleaned = DISALLOWED.replace_all(base, "_");
    match cleaned.as_ref() {
        "" | "." | ".." => DEFAULT_FILENAME.to_string(),
        _ => cleaned.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn only_safe_chars(s: &str) -> bool {
        s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    }

    #[rstest]
    #[case("<abc.def@domain.com>", "abc.def-domain.com")]
    #[case("  <CAF+x/y==@mail.gmail.com>  ", "CAF-x-y-mail.gmail.com")]
    #[case("plain-id_1.2", "plain-id_1.2")]
    #[case("<a  b\t@@c>", "a-b-c")]
    #[case("<>", "")]
    fn message_ids_are_flattened(#[case] raw: &str, #[case] expected: &str) {
        let got = sanitize_message_id(raw);
        assert_eq!(got, expected);
        assert!(only_safe_chars(&got));
    }

    #[test]
    fn missing_or_empty_ids_get_distinct_generated_ids() {
        let a = message_id_or_generated(None);
        let b = message_id_or_generated(Some("<>"));
        let c = message_id_or_generated(Some("   "));
        for id in [&a, &b, &c] {
            assert!(!id.is_empty());
            assert!(only_safe_chars(id));
        }
        assert_ne!(a, b);
        assert_ne!(b, c);
    }

    #[test]
    fn present_ids_are_kept() {
        assert_eq!(
            message_id_or_generated(Some("<1234@loseit.com>")),
            "1234-loseit.com"
        );
    }

    #[rstest]
    #[case("../../etc/passwd", "passwd")]
    #[case("my file.csv", "my_file.csv")]
    #[case("We!rd@Name#.csv", "We_rd_Name_.csv")]
    #[case("C:\\Users\\me\\Daily Report.csv", "Daily_Report.csv")]
    #[case("exports/", "exports")]
    #[case("", DEFAULT_FILENAME)]
    #[case("..", DEFAULT_FILENAME)]
    #[case("/", DEFAULT_FILENAME)]
    fn file_names_are_flattened(#[case] name: &str, #[case] expected: &str) {
        let got = sanitize_filename(name);
        assert_eq!(got, expected);
        assert!(only_safe_chars(&got));
    }
}
