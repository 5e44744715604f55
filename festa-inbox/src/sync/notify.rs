//! Transient in-app notices for messages arriving outside the open thread.

/// Characters of message content shown in a notice before truncation.
pub const PREVIEW_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub body: String,
}

impl Notice {
    pub fn new_message(sender_name: &str, content: &str) -> Self {
        Self {
            title: format!("New message from {}", sender_name),
            body: preview(content, PREVIEW_LIMIT),
        }
    }
}

/// First `limit` characters of the content, with an ellipsis when truncated.
pub fn preview(content: &str, limit: usize) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(limit).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
