use serde::{Deserialize, Serialize};

/// The customer on the other side of a thread.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Participant {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}
