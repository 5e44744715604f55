use serde::{Deserialize, Serialize};

/// A newly inserted message row, as published by the backend writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: String,
    pub thread_id: String,
    pub vendor_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub content: String,
    pub created_at: i64,
}

/// What a subscription listens for: a single thread, or every thread of a
/// vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope")]
pub enum SubScope {
    #[serde(rename = "thread")]
    Thread { thread_id: String },
    #[serde(rename = "vendor")]
    Vendor { vendor_id: String },
}

impl SubScope {
    /// Whether a row falls inside this scope.
    pub fn matches(&self, row: &MessageRow) -> bool {
        match self {
            SubScope::Thread { thread_id } => *thread_id == row.thread_id,
            SubScope::Vendor { vendor_id } => *vendor_id == row.vendor_id,
        }
    }
}

/// Relay wire protocol (shared between relay and clients)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RelayMessage {
    #[serde(rename = "connect")]
    Connect {
        client_id: String,
        token: Option<String>,
    },
    #[serde(rename = "auth_response")]
    AuthResponse { success: bool, message: String },
    #[serde(rename = "subscribe")]
    Subscribe {
        #[serde(flatten)]
        scope: SubScope,
    },
    #[serde(rename = "sub_ack")]
    SubAck {
        #[serde(flatten)]
        scope: SubScope,
        success: bool,
    },
    #[serde(rename = "publish")]
    Publish { row: MessageRow },
    #[serde(rename = "insert")]
    Insert { row: MessageRow },
    #[serde(rename = "error")]
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(thread_id: &str, vendor_id: &str) -> MessageRow {
        MessageRow {
            id: "m1".to_string(),
            thread_id: thread_id.to_string(),
            vendor_id: vendor_id.to_string(),
            sender_id: "c1".to_string(),
            sender_name: "Casey".to_string(),
            content: "hello".to_string(),
            created_at: 42,
        }
    }

    #[test]
    fn test_thread_scope_matching() {
        let scope = SubScope::Thread {
            thread_id: "t1".to_string(),
        };
        assert!(scope.matches(&row("t1", "v1")));
        assert!(!scope.matches(&row("t2", "v1")));
    }

    #[test]
    fn test_vendor_scope_matching() {
        let scope = SubScope::Vendor {
            vendor_id: "v1".to_string(),
        };
        assert!(scope.matches(&row("t1", "v1")));
        assert!(scope.matches(&row("t2", "v1")));
        assert!(!scope.matches(&row("t1", "v2")));
    }

    #[test]
    fn test_connect_serialization() {
        let msg = RelayMessage::Connect {
            client_id: "client-1".to_string(),
            token: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"connect\""));
        assert!(json.contains("\"client_id\":\"client-1\""));

        let parsed: RelayMessage = serde_json::from_str(&json).unwrap();
        if let RelayMessage::Connect { client_id, .. } = parsed {
            assert_eq!(client_id, "client-1");
        } else {
            panic!("Expected Connect");
        }
    }

    #[test]
    fn test_publish_insert_round_trip() {
        let msg = RelayMessage::Publish {
            row: row("t1", "v1"),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"publish\""));

        let parsed: RelayMessage = serde_json::from_str(&json).unwrap();
        if let RelayMessage::Publish { row } = parsed {
            assert_eq!(row.thread_id, "t1");
            assert_eq!(row.content, "hello");
        } else {
            panic!("Expected Publish");
        }
    }

    #[test]
    fn test_subscribe_flattened_scope() {
        let json = r#"{"type":"subscribe","scope":"thread","thread_id":"t7"}"#;
        let msg: RelayMessage = serde_json::from_str(json).unwrap();
        if let RelayMessage::Subscribe { scope } = msg {
            assert_eq!(
                scope,
                SubScope::Thread {
                    thread_id: "t7".to_string()
                }
            );
        } else {
            panic!("Expected Subscribe");
        }
    }

    #[test]
    fn test_sub_ack_serialization() {
        let msg = RelayMessage::SubAck {
            scope: SubScope::Vendor {
                vendor_id: "v1".to_string(),
            },
            success: true,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"sub_ack\""));
        assert!(json.contains("\"scope\":\"vendor\""));
        assert!(json.contains("\"success\":true"));
    }
}
