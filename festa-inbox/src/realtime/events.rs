use serde::{Deserialize, Serialize};

/// A newly inserted message row as delivered by the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageInsert {
    pub id: String,
    pub thread_id: String,
    pub vendor_id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub content: String,
    pub created_at: i64,
}

/// Subscription scope: one open-thread feed plus one all-threads feed per
/// vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope")]
pub enum SubScope {
    #[serde(rename = "thread")]
    Thread { thread_id: String },
    #[serde(rename = "vendor")]
    Vendor { vendor_id: String },
}

/// Client-side view of the relay wire protocol (the relay crate carries its
/// own copy of the full enum).
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
    #[serde(rename = "insert")]
    Insert { row: MessageInsert },
    #[serde(rename = "error")]
    Error { message: String },
}
