use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Message {
    pub id: String,
    pub thread_id: String,
    pub sender_id: String,
    /// Plain text, optionally carrying inline `![attachment](url)` markers
    /// for uploaded files.
    pub content: String,
    pub created_at: i64,
    /// Set when the recipient marks the message read; None means unread.
    pub read_at: Option<i64>,
}

/// One rendered segment of a message body, in original order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessagePart {
    Text(String),
    Image(String),
}

fn marker_regex() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| Regex::new(r"!\[[^\]]*\]\(([^)\s]+)\)").expect("valid marker regex"))
}

impl Message {
    /// Split the content into ordered text and image parts.
    ///
    /// Text between markers is trimmed; empty stretches (for example the
    /// blank line separating text from its attachments) produce no part.
    pub fn parts(&self) -> Vec<MessagePart> {
        split_content(&self.content)
    }

    /// Whether this message still counts toward the unread badge for the
    /// given reader.
    pub fn is_unread_for(&self, reader_id: &str) -> bool {
        self.read_at.is_none() && self.sender_id != reader_id
    }
}

/// Render an uploaded file URL as an inline attachment marker.
pub fn attachment_marker(url: &str) -> String {
    format!("![attachment]({})", url)
}

pub fn split_content(content: &str) -> Vec<MessagePart> {
    let mut parts = Vec::new();
    let mut cursor = 0;

    for cap in marker_regex().captures_iter(content) {
        let whole = cap.get(0).expect("capture 0 always present");
        let text = content[cursor..whole.start()].trim();
        if !text.is_empty() {
            parts.push(MessagePart::Text(text.to_string()));
        }
        let url = cap.get(1).expect("marker url group").as_str();
        parts.push(MessagePart::Image(url.to_string()));
        cursor = whole.end();
    }

    let tail = content[cursor..].trim();
    if !tail.is_empty() {
        parts.push(MessagePart::Text(tail.to_string()));
    }

    parts
}
