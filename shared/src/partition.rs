//! `year=YYYY/month=MM/day=DD/` partitioning used by both pipeline stages.

use chrono::{DateTime, Datelike, Utc};

/// The date triplet an object is filed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    pub year: String,
    pub month: String,
    pub day: String,
}

impl PartitionKey {
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        PartitionKey {
            year: format!("{:04}", dt.year()),
            month: format!("{:02}", dt.month()),
            day: format!("{:02}", dt.day()),
        }
    }

    /// Partition for a message, from its `Date` header when parseable, else `now`.
    ///
    /// The header is converted to UTC first, so a late-evening message sent from a
    /// negative offset lands on the following day.
    pub fn from_date_header(header: Option<&str>, now: DateTime<Utc>) -> Self {
        let dt = header.and_then(parse_message_date).unwrap_or(now);
        Self::from_datetime(dt)
    }

    /// Reads the partition back out of an object key.
    ///
    /// Accepts both `year=2025` and the notification-encoded `year%3D2025` forms.
    /// Returns `None` unless all three segments are present and non-empty.
    pub fn from_object_key(key: &str) -> Option<Self> {
        let (mut year, mut month, mut day) = (None, None, None);
        for segment in key.split('/') {
            if let Some(v) = partition_value(segment, "year") {
                year = Some(v);
            } else if let Some(v) = partition_value(segment, "month") {
                month = Some(v);
            } else if let Some(v) = partition_value(segment, "day") {
                day = Some(v);
            }
        }
        Some(PartitionKey {
            year: year?,
            month: month?,
            day: day?,
        })
    }

    pub fn path(&self) -> String {
        format!("year={}/month={}/day={}/", self.year, self.month, self.day)
    }
}

fn partition_value(segment: &str, name: &str) -> Option<String> {
    let rest = segment.strip_prefix(name)?;
    let value = match rest.strip_prefix('=') {
        Some(value) => value,
        None => rest
            .get(..3)
            .filter(|escape| escape.eq_ignore_ascii_case("%3d"))
            .and_then(|_| rest.get(3..))?,
    };
    (!value.is_empty()).then(|| value.to_string())
}

/// Parses an RFC 5322 `Date` header value into UTC.
pub fn parse_message_date(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    // "Wed, 27 Aug 2025 12:34:56 -0700 (PDT)"
    if let Some(open) = trimmed.rfind('(').filter(|_| trimmed.ends_with(')')) {
        if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed[..open].trim_end()) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    mail_parser_date(trimmed)
}

/// Falls back to `mail-parser`'s more lenient date grammar.
fn mail_parser_date(input: &str) -> Option<DateTime<Utc>> {
    use mail_parser::MessageParser;

    let fake_msg = format!("Date: {input}\n\n");
    let parsed = MessageParser::default().parse(fake_msg.as_bytes())?;
    let dt = parsed.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&dt)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}
