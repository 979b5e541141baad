//! # collab-core
//!
//! Shared library for the collaborative document service.  It contains the
//! authoritative document model, the edit framing codec, and the connection
//! lifecycle state machine.
//!
//! This crate is used by both the server and the terminal client.
//! It has zero dependencies on network sockets, files, or async runtimes.
//!
//! # Architecture overview
//!
//! Clients connect to the server over TCP, receive the whole document on
//! join, and from then on every edit one client sends is appended to the
//! shared document and forwarded to every other client.
//!
//! - **`domain`** – The [`Document`] itself (an append-only byte log with
//!   acceptance sequence numbers), the [`Edit`] unit, client identity, and
//!   the [`ConnectionPhase`] state machine every connection walks through.
//!
//! - **`protocol`** – How edits travel over a raw byte stream.  The service
//!   has no message header: either every socket read is one edit
//!   ([`Framing::Chunk`]) or edits are newline-delimited ([`Framing::Line`]).
//!   The fixed human-readable notices sent by the server also live here.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `collab_core::Document` instead of `collab_core::domain::document::Document`.
pub use domain::document::{Document, DocumentSnapshot};
pub use domain::edit::{ClientId, Edit};
pub use domain::session::{ConnectionPhase, PhaseError};
pub use protocol::framing::{encode_for_peers, EditDecoder, Framing, FramingError};
