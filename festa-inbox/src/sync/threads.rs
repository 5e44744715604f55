//! Derived, narrowed view of the cached thread list.

use crate::models::Thread;

/// Narrowing predicates for the thread list. Search and the unread filter
/// intersect when both are set.
#[derive(Debug, Clone, Default)]
pub struct ThreadFilter {
    pub query: Option<String>,
    pub unread_only: bool,
}

impl ThreadFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn search(query: &str) -> Self {
        Self {
            query: Some(query.to_string()),
            unread_only: false,
        }
    }

    pub fn unread() -> Self {
        Self {
            query: None,
            unread_only: true,
        }
    }

    pub fn with_unread_only(mut self, unread_only: bool) -> Self {
        self.unread_only = unread_only;
        self
    }
}

/// Case-insensitive substring match over participant name/email and the
/// last-message text.
fn matches_query(thread: &Thread, query_lower: &str) -> bool {
    if thread
        .participant
        .name
        .to_lowercase()
        .contains(query_lower)
    {
        return true;
    }
    if thread
        .participant
        .email
        .to_lowercase()
        .contains(query_lower)
    {
        return true;
    }
    thread
        .last_message
        .as_ref()
        .map(|m| m.content.to_lowercase().contains(query_lower))
        .unwrap_or(false)
}

pub fn filter_threads(threads: &[Thread], filter: &ThreadFilter) -> Vec<Thread> {
    let query_lower = filter
        .query
        .as_ref()
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty());

    threads
        .iter()
        .filter(|thread| {
            if filter.unread_only && thread.unread_count == 0 {
                return false;
            }
            match &query_lower {
                Some(q) => matches_query(thread, q),
                None => true,
            }
        })
        .cloned()
        .collect()
}
