//! Draft state for the message composer.
//!
//! Per-attachment state machine: selected -> uploading -> {uploaded | failed}.
//! Only uploaded attachments are eligible for a send; failed ones are dropped
//! and their preview released. A message is sent only once every pending
//! attachment has resolved to an uploaded URL or been dropped.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::backend::{Backend, Storage};
use crate::error::{InboxError, Result};
use crate::models::input::{SendMessageInput, ValidateExt};
use crate::models::{attachment_marker, Message};

pub const MAX_ATTACHMENT_BYTES: usize = 5 * 1024 * 1024;

/// Which attach affordance the user invoked. The image affordance requires
/// an image MIME type; the generic one accepts any file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affordance {
    Image,
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentState {
    Selected,
    Uploading,
    Uploaded { url: String },
    Failed,
}

/// A file picked by the user, before upload.
#[derive(Debug, Clone)]
pub struct AttachmentFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct PendingAttachment {
    pub id: String,
    pub file_name: String,
    pub mime: String,
    pub size: usize,
    pub preview_url: String,
    pub state: AttachmentState,
    bytes: Vec<u8>,
}

impl PendingAttachment {
    pub fn uploaded_url(&self) -> Option<&str> {
        match &self.state {
            AttachmentState::Uploaded { url } => Some(url),
            _ => None,
        }
    }
}

/// Client-local preview resources (object URLs in the browser embedding).
/// Previews are explicitly released on removal, upload failure, and
/// successful send.
pub trait PreviewRegistry: Send + Sync {
    fn create(&self, file_name: &str) -> String;
    fn revoke(&self, preview_url: &str);
}

/// Registry tracking live preview URLs in memory; the test suites assert
/// release through it.
#[derive(Default)]
pub struct MemoryPreviews {
    live: Mutex<HashSet<String>>,
}

impl MemoryPreviews {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_live(&self, preview_url: &str) -> bool {
        self.live.lock().map(|l| l.contains(preview_url)).unwrap_or(false)
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().map(|l| l.len()).unwrap_or(0)
    }
}

impl PreviewRegistry for MemoryPreviews {
    fn create(&self, _file_name: &str) -> String {
        let url = format!("preview://{}", uuid::Uuid::new_v4());
        if let Ok(mut live) = self.live.lock() {
            live.insert(url.clone());
        }
        url
    }

    fn revoke(&self, preview_url: &str) {
        if let Ok(mut live) = self.live.lock() {
            live.remove(preview_url);
        }
    }
}

pub struct Composer {
    text: String,
    attachments: Vec<PendingAttachment>,
    sending: bool,
    storage: Arc<dyn Storage>,
    previews: Arc<dyn PreviewRegistry>,
    bucket: String,
}

impl Composer {
    pub fn new(storage: Arc<dyn Storage>, previews: Arc<dyn PreviewRegistry>, bucket: &str) -> Self {
        Self {
            text: String::new(),
            attachments: Vec::new(),
            sending: false,
            storage,
            previews,
            bucket: bucket.to_string(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
    }

    pub fn attachments(&self) -> &[PendingAttachment] {
        &self.attachments
    }

    /// Admit a file into the pending set. Size and (for the image
    /// affordance) MIME type are checked before anything touches the network.
    pub fn attach(&mut self, file: AttachmentFile, affordance: Affordance) -> Result<String> {
        if file.bytes.len() > MAX_ATTACHMENT_BYTES {
            return Err(InboxError::Attachment(format!(
                "{} exceeds the 5MB limit",
                file.name
            )));
        }
        if affordance == Affordance::Image && !file.mime.starts_with("image/") {
            return Err(InboxError::Attachment(format!(
                "{} is not an image ({})",
                file.name, file.mime
            )));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let preview_url = self.previews.create(&file.name);
        self.attachments.push(PendingAttachment {
            id: id.clone(),
            file_name: file.name,
            mime: file.mime,
            size: file.bytes.len(),
            preview_url,
            state: AttachmentState::Selected,
            bytes: file.bytes,
        });
        Ok(id)
    }

    /// Drop an attachment from the pending set and release its preview.
    pub fn remove_attachment(&mut self, id: &str) {
        if let Some(pos) = self.attachments.iter().position(|a| a.id == id) {
            let attachment = self.attachments.remove(pos);
            self.previews.revoke(&attachment.preview_url);
        }
    }

    /// Upload every selected attachment. Failed uploads are removed from the
    /// pending set with their previews released; the first failure is
    /// reported after all uploads have been attempted.
    pub async fn upload_pending(&mut self) -> Result<()> {
        let mut first_error = None;

        let mut index = 0;
        while index < self.attachments.len() {
            if self.attachments[index].state != AttachmentState::Selected {
                index += 1;
                continue;
            }

            self.attachments[index].state = AttachmentState::Uploading;
            let path = format!(
                "{}-{}",
                uuid::Uuid::new_v4(),
                self.attachments[index].file_name
            );
            let bytes = self.attachments[index].bytes.clone();
            let mime = self.attachments[index].mime.clone();

            match self.storage.upload(&self.bucket, &path, bytes, &mime).await {
                Ok(url) => {
                    self.attachments[index].state = AttachmentState::Uploaded { url };
                    index += 1;
                }
                Err(e) => {
                    warn!(file = %self.attachments[index].file_name, error = %e, "attachment upload failed");
                    self.attachments[index].state = AttachmentState::Failed;
                    let failed = self.attachments.remove(index);
                    self.previews.revoke(&failed.preview_url);
                    if first_error.is_none() {
                        first_error = Some(InboxError::Storage(format!(
                            "failed to upload {}",
                            failed.file_name
                        )));
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn has_upload_in_flight(&self) -> bool {
        self.attachments
            .iter()
            .any(|a| matches!(a.state, AttachmentState::Uploading | AttachmentState::Selected))
    }

    fn uploaded_urls(&self) -> Vec<String> {
        self.attachments
            .iter()
            .filter_map(|a| a.uploaded_url().map(String::from))
            .collect()
    }

    /// Whether a submit would be accepted right now.
    pub fn can_send(&self) -> bool {
        !self.sending
            && !self.has_upload_in_flight()
            && (!self.text.trim().is_empty() || !self.uploaded_urls().is_empty())
    }

    /// Final message content: trimmed text followed by one image marker per
    /// uploaded attachment, blank-line separated.
    pub fn build_content(&self) -> String {
        let mut parts = Vec::new();
        let trimmed = self.text.trim();
        if !trimmed.is_empty() {
            parts.push(trimmed.to_string());
        }
        for url in self.uploaded_urls() {
            parts.push(attachment_marker(&url));
        }
        parts.join("\n\n")
    }

    /// Submit the draft. On success the draft is cleared and previews are
    /// released; on failure composer state is left intact so the user can
    /// retry.
    pub async fn send(
        &mut self,
        backend: &dyn Backend,
        thread_id: &str,
        sender_id: &str,
    ) -> Result<Message> {
        if self.sending {
            return Err(InboxError::Busy);
        }
        if !self.can_send() {
            return Err(InboxError::EmptyDraft);
        }

        let input = SendMessageInput {
            thread_id: thread_id.to_string(),
            sender_id: sender_id.to_string(),
            content: self.build_content(),
        };
        input.validate_input()?;

        self.sending = true;
        let result = backend
            .send_message(&input.thread_id, &input.sender_id, &input.content)
            .await;
        self.sending = false;

        let message = result?;

        self.text.clear();
        for attachment in self.attachments.drain(..) {
            self.previews.revoke(&attachment.preview_url);
        }

        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::backend::LocalStorage;
    use crate::models::{Inquiry, Thread};

    struct StubStorage {
        fail: AtomicBool,
    }

    impl StubStorage {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                fail: AtomicBool::new(false),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                fail: AtomicBool::new(true),
            })
        }
    }

    #[async_trait]
    impl Storage for StubStorage {
        async fn upload(
            &self,
            _bucket: &str,
            _path: &str,
            _bytes: Vec<u8>,
            _mime: &str,
        ) -> Result<String> {
            if self.fail.load(Ordering::SeqCst) {
                Err(InboxError::Storage("upstream rejected".to_string()))
            } else {
                Ok("https://x/img.png".to_string())
            }
        }
    }

    struct StubBackend {
        fail: bool,
    }

    #[async_trait]
    impl Backend for StubBackend {
        async fn fetch_threads(&self, _vendor_id: &str) -> Result<Vec<Thread>> {
            Ok(Vec::new())
        }

        async fn fetch_messages(&self, _thread_id: &str) -> Result<Vec<Message>> {
            Ok(Vec::new())
        }

        async fn send_message(
            &self,
            thread_id: &str,
            sender_id: &str,
            content: &str,
        ) -> Result<Message> {
            if self.fail {
                return Err(InboxError::Backend("send rejected".to_string()));
            }
            Ok(Message {
                id: "m1".to_string(),
                thread_id: thread_id.to_string(),
                sender_id: sender_id.to_string(),
                content: content.to_string(),
                created_at: 1,
                read_at: None,
            })
        }

        async fn mark_read(&self, _thread_id: &str, _reader_id: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn fetch_inquiries(
            &self,
            _vendor_id: &str,
            _customer_id: &str,
        ) -> Result<Vec<Inquiry>> {
            Ok(Vec::new())
        }
    }

    fn image_file(name: &str, size: usize) -> AttachmentFile {
        AttachmentFile {
            name: name.to_string(),
            mime: "image/png".to_string(),
            bytes: vec![0u8; size],
        }
    }

    #[test]
    fn test_empty_draft_cannot_send() {
        let composer = Composer::new(StubStorage::ok(), Arc::new(MemoryPreviews::new()), "attachments");
        assert!(!composer.can_send());
    }

    #[tokio::test]
    async fn test_empty_submit_is_rejected() {
        let mut composer =
            Composer::new(StubStorage::ok(), Arc::new(MemoryPreviews::new()), "attachments");
        composer.set_text("   ");
        let err = composer
            .send(&StubBackend { fail: false }, "t1", "vendor-1")
            .await
            .unwrap_err();
        assert!(matches!(err, InboxError::EmptyDraft));
    }

    #[test]
    fn test_oversized_attachment_rejected_before_upload() {
        let mut composer =
            Composer::new(StubStorage::ok(), Arc::new(MemoryPreviews::new()), "attachments");
        let err = composer
            .attach(image_file("big.png", MAX_ATTACHMENT_BYTES + 1), Affordance::Any)
            .unwrap_err();
        assert!(matches!(err, InboxError::Attachment(_)));
        assert!(composer.attachments().is_empty());
    }

    #[test]
    fn test_image_affordance_requires_image_mime() {
        let mut composer =
            Composer::new(StubStorage::ok(), Arc::new(MemoryPreviews::new()), "attachments");
        let pdf = AttachmentFile {
            name: "quote.pdf".to_string(),
            mime: "application/pdf".to_string(),
            bytes: vec![0u8; 10],
        };
        assert!(composer.attach(pdf.clone(), Affordance::Image).is_err());
        // The generic affordance accepts any type.
        assert!(composer.attach(pdf, Affordance::Any).is_ok());
    }

    #[tokio::test]
    async fn test_failed_upload_removes_attachment_and_revokes_preview() {
        let previews = Arc::new(MemoryPreviews::new());
        let mut composer = Composer::new(StubStorage::failing(), previews.clone(), "attachments");

        composer
            .attach(image_file("a.png", 16), Affordance::Image)
            .unwrap();
        let preview_url = composer.attachments()[0].preview_url.clone();
        assert!(previews.is_live(&preview_url));

        assert!(composer.upload_pending().await.is_err());
        assert!(composer.attachments().is_empty());
        assert!(!previews.is_live(&preview_url), "preview must be released");
    }

    #[tokio::test]
    async fn test_send_blocked_while_attachment_not_uploaded() {
        let mut composer =
            Composer::new(StubStorage::ok(), Arc::new(MemoryPreviews::new()), "attachments");
        composer.set_text("Hello");
        composer
            .attach(image_file("a.png", 16), Affordance::Image)
            .unwrap();
        assert!(!composer.can_send(), "selected attachment blocks send");

        composer.upload_pending().await.unwrap();
        assert!(composer.can_send());
    }

    #[tokio::test]
    async fn test_content_appends_marker_after_text() {
        let mut composer =
            Composer::new(StubStorage::ok(), Arc::new(MemoryPreviews::new()), "attachments");
        composer.set_text("Hello");
        composer
            .attach(image_file("img.png", 16), Affordance::Image)
            .unwrap();
        composer.upload_pending().await.unwrap();

        assert_eq!(
            composer.build_content(),
            "Hello\n\n![attachment](https://x/img.png)"
        );
    }

    #[tokio::test]
    async fn test_attachment_only_content_has_no_leading_blank() {
        let mut composer =
            Composer::new(StubStorage::ok(), Arc::new(MemoryPreviews::new()), "attachments");
        composer
            .attach(image_file("img.png", 16), Affordance::Image)
            .unwrap();
        composer.upload_pending().await.unwrap();

        assert_eq!(composer.build_content(), "![attachment](https://x/img.png)");
    }

    #[tokio::test]
    async fn test_local_storage_uploads_resolve_to_bucket_urls() {
        let mut composer = Composer::new(
            Arc::new(LocalStorage),
            Arc::new(MemoryPreviews::new()),
            "attachments",
        );
        composer
            .attach(image_file("img.png", 16), Affordance::Image)
            .unwrap();
        composer.upload_pending().await.unwrap();

        let content = composer.build_content();
        assert!(content.starts_with("![attachment](local://attachments/"));
        assert!(content.ends_with("img.png)"));
    }

    #[tokio::test]
    async fn test_successful_send_clears_draft_and_releases_previews() {
        let previews = Arc::new(MemoryPreviews::new());
        let mut composer = Composer::new(StubStorage::ok(), previews.clone(), "attachments");
        composer.set_text("  Hello  ");
        composer
            .attach(image_file("img.png", 16), Affordance::Image)
            .unwrap();
        composer.upload_pending().await.unwrap();

        let message = composer
            .send(&StubBackend { fail: false }, "t1", "vendor-1")
            .await
            .unwrap();
        assert_eq!(message.content, "Hello\n\n![attachment](https://x/img.png)");

        assert!(composer.text().is_empty());
        assert!(composer.attachments().is_empty());
        assert_eq!(previews.live_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_send_preserves_draft_for_retry() {
        let previews = Arc::new(MemoryPreviews::new());
        let mut composer = Composer::new(StubStorage::ok(), previews.clone(), "attachments");
        composer.set_text("Hello");
        composer
            .attach(image_file("img.png", 16), Affordance::Image)
            .unwrap();
        composer.upload_pending().await.unwrap();

        let err = composer
            .send(&StubBackend { fail: true }, "t1", "vendor-1")
            .await
            .unwrap_err();
        assert!(matches!(err, InboxError::Backend(_)));

        assert_eq!(composer.text(), "Hello");
        assert_eq!(composer.attachments().len(), 1);
        assert_eq!(previews.live_count(), 1);
        assert!(composer.can_send(), "retry stays possible");
    }

    #[tokio::test]
    async fn test_remove_attachment_releases_preview() {
        let previews = Arc::new(MemoryPreviews::new());
        let mut composer = Composer::new(StubStorage::ok(), previews.clone(), "attachments");
        let id = composer
            .attach(image_file("img.png", 16), Affordance::Image)
            .unwrap();

        composer.remove_attachment(&id);
        assert!(composer.attachments().is_empty());
        assert_eq!(previews.live_count(), 0);
    }
}
