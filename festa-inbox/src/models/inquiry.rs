use serde::{Deserialize, Serialize};

/// Event metadata for a vendor/customer pair, shown beside the open thread.
///
/// Read-only context: fetched independently and never mutated by the inbox.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Inquiry {
    pub id: String,
    pub vendor_id: String,
    pub customer_id: String,
    pub event_name: String,
    pub event_date: Option<String>,
    pub guest_count: Option<i64>,
    pub note: Option<String>,
    pub created_at: i64,
}
