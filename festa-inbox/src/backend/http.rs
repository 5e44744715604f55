//! reqwest client for the hosted backend.
//!
//! Endpoint shapes follow the managed API: thread summaries arrive with the
//! last-message snapshot and unread count already embedded, and storage
//! uploads resolve to a public URL.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{Backend, Storage};
use crate::error::{InboxError, Result};
use crate::models::{Inquiry, Message, Thread};

pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
    api_key: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.get(format!("{}{}", self.base_url, path)))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.post(format!("{}{}", self.base_url, path)))
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_threads(&self, vendor_id: &str) -> Result<Vec<Thread>> {
        let threads = self
            .get(&format!("/vendors/{}/threads", vendor_id))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(threads)
    }

    async fn fetch_messages(&self, thread_id: &str) -> Result<Vec<Message>> {
        let messages = self
            .get(&format!("/threads/{}/messages", thread_id))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(messages)
    }

    async fn send_message(
        &self,
        thread_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<Message> {
        let message = self
            .post(&format!("/threads/{}/messages", thread_id))
            .json(&json!({ "sender_id": sender_id, "content": content }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(message)
    }

    async fn mark_read(&self, thread_id: &str, reader_id: &str) -> Result<Vec<String>> {
        let marked = self
            .post(&format!("/threads/{}/read", thread_id))
            .json(&json!({ "reader_id": reader_id }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(marked)
    }

    async fn fetch_inquiries(&self, vendor_id: &str, customer_id: &str) -> Result<Vec<Inquiry>> {
        let inquiries = self
            .get(&format!(
                "/vendors/{}/inquiries/{}",
                vendor_id, customer_id
            ))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(inquiries)
    }
}

/// Object-storage client: uploads bytes and resolves the public URL.
pub struct HttpStorage {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct UploadResponse {
    url: String,
}

impl HttpStorage {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Storage for HttpStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        mime: &str,
    ) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/storage/{}/{}", self.base_url, bucket, path))
            .header("content-type", mime.to_string())
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(InboxError::Storage(format!(
                "upload failed with status {}",
                response.status()
            )));
        }

        let parsed: UploadResponse = response.json().await?;
        Ok(parsed.url)
    }
}
