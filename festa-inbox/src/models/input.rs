//! Input DTOs with garde validation.
//!
//! These structs validate caller data before anything reaches the backend.

use garde::Validate;
use serde::Deserialize;

use crate::error::InboxError;

/// Validation constants
const MAX_ID_LENGTH: usize = 128;
const MAX_MESSAGE_LENGTH: usize = 10000;
const MAX_SEARCH_QUERY_LENGTH: usize = 200;

/// Input for sending a message to a thread
#[derive(Debug, Deserialize, Validate)]
#[garde(context(()))]
pub struct SendMessageInput {
    #[garde(length(min = 1, max = MAX_ID_LENGTH))]
    pub thread_id: String,
    #[garde(length(min = 1, max = MAX_ID_LENGTH))]
    pub sender_id: String,
    #[garde(length(min = 1, max = MAX_MESSAGE_LENGTH))]
    pub content: String,
}

/// Input for marking a thread's messages as read
#[derive(Debug, Deserialize, Validate)]
#[garde(context(()))]
pub struct MarkReadInput {
    #[garde(length(min = 1, max = MAX_ID_LENGTH))]
    pub thread_id: String,
    #[garde(length(min = 1, max = MAX_ID_LENGTH))]
    pub reader_id: String,
}

/// Input for narrowing the thread list
#[derive(Debug, Deserialize, Validate)]
#[garde(context(()))]
pub struct SearchThreadsInput {
    #[garde(length(max = MAX_SEARCH_QUERY_LENGTH))]
    pub query: String,
}

/// Helper trait to convert garde validation errors to the crate error type
pub trait ValidateExt {
    fn validate_input(&self) -> Result<(), InboxError>;
}

impl<T: Validate<Context = ()>> ValidateExt for T {
    fn validate_input(&self) -> Result<(), InboxError> {
        self.validate()
            .map_err(|e| InboxError::Validation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_message_input_rejects_empty_content() {
        let input = SendMessageInput {
            thread_id: "t1".to_string(),
            sender_id: "u1".to_string(),
            content: String::new(),
        };
        assert!(input.validate_input().is_err());
    }

    #[test]
    fn test_send_message_input_rejects_oversized_content() {
        let input = SendMessageInput {
            thread_id: "t1".to_string(),
            sender_id: "u1".to_string(),
            content: "x".repeat(MAX_MESSAGE_LENGTH + 1),
        };
        assert!(input.validate_input().is_err());
    }

    #[test]
    fn test_mark_read_input_accepts_valid_ids() {
        let input = MarkReadInput {
            thread_id: "t1".to_string(),
            reader_id: "vendor-1".to_string(),
        };
        assert!(input.validate_input().is_ok());
    }

    #[test]
    fn test_search_input_allows_empty_query() {
        let input = SearchThreadsInput {
            query: String::new(),
        };
        assert!(input.validate_input().is_ok());
    }
}
