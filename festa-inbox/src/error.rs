use thiserror::Error;

/// Errors surfaced by the inbox engine and its collaborators.
///
/// Nothing here is fatal: validation and attachment errors are rejected
/// before any network call, send failures leave the composer intact for
/// retry, and read-mark failures are logged and absorbed.
#[derive(Debug, Error)]
pub enum InboxError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("attachment rejected: {0}")]
    Attachment(String),

    #[error("draft is empty")]
    EmptyDraft,

    #[error("an upload or send is still in flight")]
    Busy,

    #[error("backend error: {0}")]
    Backend(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, InboxError>;
