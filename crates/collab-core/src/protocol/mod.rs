//! Wire protocol: edit framing and fixed server notices.
//!
//! The service speaks raw bytes with no header or length prefix.  What turns
//! a byte stream into discrete edits is the [`Framing`] mode chosen at
//! server startup.

pub mod framing;
pub mod notices;

pub use framing::{encode_for_peers, EditDecoder, Framing, FramingError};
pub use notices::{PERSIST_FAILURE_NOTICE, REJECTION_NOTICE};
