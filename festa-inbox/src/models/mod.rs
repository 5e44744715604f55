pub mod input;
mod inquiry;
mod message;
mod participant;
mod thread;

pub use inquiry::Inquiry;
pub use message::{attachment_marker, split_content, Message, MessagePart};
pub use participant::Participant;
pub use thread::{LastMessage, Thread};
