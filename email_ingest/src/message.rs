//! Header view and CSV attachment extraction for a raw email.

use log::debug;
use mail_parser::{MessageParser, MimeHeaders};

/// The three headers the pipeline routes on, unfolded and trimmed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderView {
    pub from: Option<String>,
    pub date: Option<String>,
    pub message_id: Option<String>,
}

impl HeaderView {
    /// Reads the header block (everything before the first blank line).
    ///
    /// Never fails: a message without a header block yields an empty view.
    pub fn parse(raw: &[u8]) -> Self {
        let text = String::from_utf8_lossy(header_block(raw));
        let mut view = HeaderView::default();
        let mut pending: Option<(&str, String)> = None;

        for line in text.lines() {
            if line.starts_with(|c| c == ' ' || c == '\t') {
                if let Some((_, value)) = pending.as_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }
            if let Some((name, value)) = pending.take() {
                view.record(name, &value);
            }
            pending = line
                .split_once(':')
                .map(|(name, value)| (name.trim(), value.trim().to_string()));
        }
        if let Some((name, value)) = pending {
            view.record(name, &value);
        }
        view
    }

    /// The first non-empty occurrence of a routed header wins.
    fn record(&mut self, name: &str, value: &str) {
        let slot = if name.eq_ignore_ascii_case("from") {
            &mut self.from
        } else if name.eq_ignore_ascii_case("date") {
            &mut self.date
        } else if name.eq_ignore_ascii_case("message-id") {
            &mut self.message_id
        } else {
            return;
        };
        let value = value.trim();
        if slot.is_none() && !value.is_empty() {
            *slot = Some(value.to_string());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedAttachment {
    /// As declared by the sender; not yet safe to use in a key.
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// The MIME envelope could not be parsed. The raw copy is still kept.
#[derive(Debug, Clone)]
pub struct MessageError {
    msg: String,
}

impl std::error::Error for MessageError {}

impl std::fmt::Display for MessageError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "MIME parse failed: {}", self.msg)
    }
}

/// Decodes the MIME envelope and returns the attachments that look like CSV:
/// a `.csv` file name (any case) or a declared `text/csv` content type.
pub fn extract_csv_attachments(raw: &[u8]) -> Result<Vec<ExtractedAttachment>, MessageError> {
    let message = MessageParser::default()
        .parse(strip_bom(raw))
        .ok_or_else(|| MessageError {
            msg: "no MIME structure found".to_string(),
        })?;

    let attachments = message
        .attachments()
        .filter_map(|part| {
            let file_name = part.attachment_name().unwrap_or_default().to_string();
            let content_type = part
                .content_type()
                .map(|ct| match ct.subtype() {
                    Some(sub) => format!("{}/{}", ct.ctype(), sub),
                    None => ct.ctype().to_string(),
                })
                .unwrap_or_default()
                .to_lowercase();

            if !is_csv(&file_name, &content_type) {
                debug!(
                    "Ignoring attachment '{}' ({})",
                    file_name, content_type
                );
                return None;
            }
            Some(ExtractedAttachment {
                file_name,
                content_type,
                bytes: part.contents().to_vec(),
            })
        })
        .collect();
    Ok(attachments)
}

fn is_csv(file_name: &str, content_type: &str) -> bool {
    let has_csv_extension = std::path::Path::new(file_name.trim())
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));
    has_csv_extension || content_type == "text/csv"
}

fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data)
}

fn header_block(data: &[u8]) -> &[u8] {
    let data = strip_bom(data);
    let end = data
        .windows(2)
        .position(|w| w == b"\n\n")
        .map(|pos| pos + 1)
        .into_iter()
        .chain(
            data.windows(4)
                .position(|w| w == b"\r\n\r\n")
                .map(|pos| pos + 2),
        )
        .min()
        .unwrap_or(data.len());
    &data[..end]
}
