//! The inbox synchronization engine.
//!
//! Two independent, unordered update sources feed the shared query cache:
//! fixed-interval polling and the realtime insert feed. Both go through
//! invalidate-then-refetch; the server's current state always wins.

mod notify;
mod threads;

pub use notify::{preview, Notice, PREVIEW_LIMIT};
pub use threads::{filter_threads, ThreadFilter};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::cache::{CacheKey, QueryCache};
use crate::error::Result;
use crate::models::input::{MarkReadInput, SearchThreadsInput, ValidateExt};
use crate::models::{Inquiry, Message, Thread};
use crate::realtime::MessageInsert;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Full thread-list refetch interval.
    pub thread_poll: Duration,
    /// Open-thread message refetch interval.
    pub message_poll: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            thread_poll: Duration::from_secs(15),
            message_poll: Duration::from_secs(5),
        }
    }
}

pub struct InboxSync {
    vendor_id: String,
    user_id: String,
    backend: Arc<dyn Backend>,
    cache: Arc<QueryCache>,
    selected_tx: watch::Sender<Option<String>>,
    notices_tx: broadcast::Sender<Notice>,
    shutdown_tx: broadcast::Sender<()>,
    config: SyncConfig,
}

impl InboxSync {
    pub fn new(
        backend: Arc<dyn Backend>,
        vendor_id: &str,
        user_id: &str,
        config: SyncConfig,
    ) -> Self {
        let (selected_tx, _) = watch::channel(None);
        let (notices_tx, _) = broadcast::channel(64);
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            vendor_id: vendor_id.to_string(),
            user_id: user_id.to_string(),
            backend,
            cache: Arc::new(QueryCache::new()),
            selected_tx,
            notices_tx,
            shutdown_tx,
            config,
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn selected_thread(&self) -> Option<String> {
        self.selected_tx.borrow().clone()
    }

    /// Transient notices (new-message toasts) for the UI layer.
    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices_tx.subscribe()
    }

    /// Fetch the vendor's threads and replace the cached projection.
    pub async fn refresh_threads(&self) -> Result<Vec<Thread>> {
        let threads = self.backend.fetch_threads(&self.vendor_id).await?;
        self.cache.put_threads(threads.clone());
        Ok(threads)
    }

    /// Fetch a thread's messages and replace its cached projection.
    pub async fn refresh_messages(&self, thread_id: &str) -> Result<Vec<Message>> {
        let messages = self.backend.fetch_messages(thread_id).await?;
        self.cache.put_messages(thread_id, messages.clone());
        Ok(messages)
    }

    /// Cached thread list, narrowed by the filter. Search queries are
    /// validated before the cache is touched.
    pub fn threads(&self, filter: &ThreadFilter) -> Result<Vec<Thread>> {
        if let Some(query) = &filter.query {
            let input = SearchThreadsInput {
                query: query.clone(),
            };
            input.validate_input()?;
        }
        Ok(filter_threads(&self.cache.threads(), filter))
    }

    /// Cached messages for a thread.
    pub fn messages(&self, thread_id: &str) -> Vec<Message> {
        self.cache.messages(thread_id)
    }

    /// Read-only inquiry context for the counterparty of a thread.
    pub async fn inquiry_context(&self, thread: &Thread) -> Result<Vec<Inquiry>> {
        self.backend
            .fetch_inquiries(&self.vendor_id, &thread.participant.id)
            .await
    }

    /// Open a thread (or clear the selection with `None`). Opening fetches
    /// the messages and, when unread counterparty messages are present,
    /// triggers read-marking.
    pub async fn select_thread(&self, thread_id: Option<String>) {
        self.selected_tx.send_replace(thread_id.clone());

        let Some(id) = thread_id else { return };

        match self.refresh_messages(&id).await {
            Ok(messages) => {
                let has_unread = messages.iter().any(|m| m.is_unread_for(&self.user_id));
                if has_unread {
                    self.mark_read(&id).await;
                }
            }
            Err(e) => {
                // The message poll retries on its own schedule.
                warn!(thread_id = %id, error = %e, "failed to load messages on select");
            }
        }
    }

    /// Best-effort read-marking: failures are logged, never surfaced; the
    /// next successful mark self-corrects. Input is validated before the
    /// backend is consulted.
    pub async fn mark_read(&self, thread_id: &str) {
        let input = MarkReadInput {
            thread_id: thread_id.to_string(),
            reader_id: self.user_id.clone(),
        };
        if let Err(e) = input.validate_input() {
            warn!(thread_id, error = %e, "read-mark input rejected");
            return;
        }

        match self.backend.mark_read(thread_id, &self.user_id).await {
            Ok(marked) => {
                if !marked.is_empty() {
                    debug!(thread_id, count = marked.len(), "marked messages read");
                }
                self.cache.invalidate(&CacheKey::Threads);
                if let Err(e) = self.refresh_threads().await {
                    warn!(error = %e, "thread refresh after read-mark failed");
                }
                self.cache
                    .invalidate(&CacheKey::Messages(thread_id.to_string()));
                if let Err(e) = self.refresh_messages(thread_id).await {
                    warn!(thread_id, error = %e, "message refresh after read-mark failed");
                }
            }
            Err(e) => {
                warn!(thread_id, error = %e, "read-mark failed");
            }
        }
    }

    /// React to a realtime message insert. Inserts for the open thread
    /// refresh both caches and trigger read-marking for counterparty
    /// messages; inserts for other threads of this vendor refresh the list
    /// and surface a notice.
    pub async fn handle_insert(&self, insert: &MessageInsert) {
        if insert.vendor_id != self.vendor_id {
            return;
        }

        let open = self.selected_thread();
        let from_counterparty = insert.sender_id != self.user_id;

        if open.as_deref() == Some(insert.thread_id.as_str()) {
            self.cache
                .invalidate(&CacheKey::Messages(insert.thread_id.clone()));
            self.cache.invalidate(&CacheKey::Threads);

            if let Err(e) = self.refresh_messages(&insert.thread_id).await {
                warn!(error = %e, "message refresh after insert failed");
            }
            if from_counterparty {
                self.mark_read(&insert.thread_id).await;
            } else if let Err(e) = self.refresh_threads().await {
                warn!(error = %e, "thread refresh after insert failed");
            }
        } else if from_counterparty {
            self.cache.invalidate(&CacheKey::Threads);
            if let Err(e) = self.refresh_threads().await {
                warn!(error = %e, "thread refresh after insert failed");
            }
            let _ = self
                .notices_tx
                .send(Notice::new_message(&insert.sender_name, &insert.content));
        }
    }

    /// Spawn the polling loops and the realtime consumer. Runs until
    /// `shutdown` is called.
    pub fn run(self: &Arc<Self>, mut inserts: mpsc::UnboundedReceiver<MessageInsert>) {
        // Thread-list poll
        {
            let engine = self.clone();
            let mut shutdown_rx = self.shutdown_tx.subscribe();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(engine.config.thread_poll);
                loop {
                    tokio::select! {
                        _ = shutdown_rx.recv() => {
                            info!("Thread poll stopping");
                            break;
                        }
                        _ = ticker.tick() => {
                            if let Err(e) = engine.refresh_threads().await {
                                warn!(error = %e, "thread poll failed");
                            }
                        }
                    }
                }
            });
        }

        // Open-thread message poll; switching threads retargets the fetch
        // through the selection handle.
        {
            let engine = self.clone();
            let mut shutdown_rx = self.shutdown_tx.subscribe();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(engine.config.message_poll);
                loop {
                    tokio::select! {
                        _ = shutdown_rx.recv() => {
                            info!("Message poll stopping");
                            break;
                        }
                        _ = ticker.tick() => {
                            let selected = engine.selected_thread();
                            if let Some(thread_id) = selected {
                                if let Err(e) = engine.refresh_messages(&thread_id).await {
                                    warn!(thread_id = %thread_id, error = %e, "message poll failed");
                                }
                            }
                        }
                    }
                }
            });
        }

        // Realtime consumer
        {
            let engine = self.clone();
            let mut shutdown_rx = self.shutdown_tx.subscribe();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = shutdown_rx.recv() => {
                            info!("Realtime consumer stopping");
                            break;
                        }
                        insert = inserts.recv() => {
                            match insert {
                                Some(row) => engine.handle_insert(&row).await,
                                None => {
                                    info!("Realtime feed closed");
                                    break;
                                }
                            }
                        }
                    }
                }
            });
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}
