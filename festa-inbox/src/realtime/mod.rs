mod client;
mod events;

pub use client::RealtimeClient;
pub use events::{MessageInsert, RelayMessage, SubScope};
