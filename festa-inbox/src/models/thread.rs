use serde::{Deserialize, Serialize};

use super::participant::Participant;

/// A persistent conversation between one vendor and one customer.
///
/// Threads are created externally (on the first customer inquiry) and are
/// never deleted by this code; the client holds them only as cached
/// projections of backend state.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Thread {
    pub id: String,
    pub vendor_id: String,
    pub participant: Participant,
    pub last_message: Option<LastMessage>,
    /// Messages from the counterparty not yet marked read by the vendor.
    pub unread_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Snapshot of the newest message, embedded in the thread summary.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LastMessage {
    pub content: String,
    pub created_at: i64,
}
