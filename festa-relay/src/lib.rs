//! Festa realtime relay library
//!
//! Exposes the relay components for use in integration tests.

mod connection;
mod messages;
mod state;

pub use connection::handle_connection;
pub use connection::handle_message;
pub use messages::{MessageRow, RelayMessage, SubScope};
pub use state::RelayState;
