//! Shared query cache for thread and message projections.
//!
//! The cache is the single shared mutable structure in the engine. Both
//! update sources (the polling timers and the realtime listener) go through
//! `invalidate`; neither patches cached data directly. A fresh fetch then
//! replaces the entry wholesale, so duplicate or out-of-order invalidations
//! are harmless.

use dashmap::DashMap;

use crate::models::{Message, Thread};

/// Key space for cached projections. Message entries are scoped by thread id
/// so a stale in-flight fetch for a previously selected thread lands in an
/// entry nobody is reading.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Threads,
    Messages(String),
}

#[derive(Debug, Clone)]
enum CachedValue {
    Threads(Vec<Thread>),
    Messages(Vec<Message>),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedValue,
    stale: bool,
}

#[derive(Default)]
pub struct QueryCache {
    entries: DashMap<CacheKey, CacheEntry>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Mark a cached projection stale. The next refresh replaces it.
    pub fn invalidate(&self, key: &CacheKey) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.stale = true;
        }
    }

    pub fn is_stale(&self, key: &CacheKey) -> bool {
        self.entries.get(key).map(|e| e.stale).unwrap_or(true)
    }

    pub fn put_threads(&self, threads: Vec<Thread>) {
        self.entries.insert(
            CacheKey::Threads,
            CacheEntry {
                value: CachedValue::Threads(threads),
                stale: false,
            },
        );
    }

    pub fn put_messages(&self, thread_id: &str, messages: Vec<Message>) {
        self.entries.insert(
            CacheKey::Messages(thread_id.to_string()),
            CacheEntry {
                value: CachedValue::Messages(messages),
                stale: false,
            },
        );
    }

    pub fn threads(&self) -> Vec<Thread> {
        match self.entries.get(&CacheKey::Threads) {
            Some(entry) => match &entry.value {
                CachedValue::Threads(threads) => threads.clone(),
                _ => Vec::new(),
            },
            None => Vec::new(),
        }
    }

    pub fn messages(&self, thread_id: &str) -> Vec<Message> {
        match self.entries.get(&CacheKey::Messages(thread_id.to_string())) {
            Some(entry) => match &entry.value {
                CachedValue::Messages(messages) => messages.clone(),
                _ => Vec::new(),
            },
            None => Vec::new(),
        }
    }
}
