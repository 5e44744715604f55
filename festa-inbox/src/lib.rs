//! Vendor-side messaging inbox for the Festa vendor portal.
//!
//! The engine keeps a shared query cache of thread and message projections,
//! fed by two independent update sources: fixed-interval polling and a
//! realtime insert subscription. All persisted entities are owned by the
//! backend behind the [`backend::Backend`] trait; the client owns only its
//! composer draft state.

pub mod backend;
pub mod cache;
pub mod composer;
pub mod error;
pub mod identity;
pub mod models;
pub mod realtime;
pub mod sync;

pub use composer::{Affordance, AttachmentFile, Composer, MemoryPreviews, PreviewRegistry};
pub use error::{InboxError, Result};
pub use sync::{InboxSync, Notice, SyncConfig, ThreadFilter};
