//! Contract expected of the managed backend.
//!
//! All persisted entities are owned by the backend; the client treats them as
//! eventually-consistent cached projections and reaches them only through
//! these traits.

mod http;
mod local;

use async_trait::async_trait;

pub use http::{HttpBackend, HttpStorage};
pub use local::{LocalBackend, LocalStorage};

use crate::error::Result;
use crate::models::{Inquiry, Message, Thread};

#[async_trait]
pub trait Backend: Send + Sync {
    /// Full set of thread summaries for the vendor, with embedded
    /// last-message snapshot and unread count.
    async fn fetch_threads(&self, vendor_id: &str) -> Result<Vec<Thread>>;

    /// All messages of a thread, ordered by creation time.
    async fn fetch_messages(&self, thread_id: &str) -> Result<Vec<Message>>;

    /// Persist a message and return it as stored.
    async fn send_message(
        &self,
        thread_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<Message>;

    /// Idempotent bulk read-mark of counterparty messages in a thread.
    /// Returns the ids that were newly marked.
    async fn mark_read(&self, thread_id: &str, reader_id: &str) -> Result<Vec<String>>;

    /// Read-only inquiry context for a vendor/customer pair.
    async fn fetch_inquiries(&self, vendor_id: &str, customer_id: &str) -> Result<Vec<Inquiry>>;
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Upload a file and resolve its public URL.
    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>, mime: &str)
        -> Result<String>;
}
