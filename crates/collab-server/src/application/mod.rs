//! Application layer for collab-server.
//!
//! Owns the two shared mutable resources of the service, the document and
//! the client registry, and the ordered broadcast that connects them.  Every
//! access goes through the operations defined here; no other module touches
//! the underlying maps, buffers, or locks.
//!
//! # Lock discipline
//!
//! - The document lock is never held while the registry lock is acquired or
//!   while any socket I/O happens.  Handing an accepted edit to the
//!   broadcaster is a non-blocking channel send.
//! - The registry lock only guards in-memory map operations.  Snapshots are
//!   cloned out so fan-out happens without it.

pub mod broadcast;
pub mod client_handle;
pub mod client_registry;
pub mod document_state;
pub mod edit_store;

pub use broadcast::{Broadcaster, FanOutReport};
pub use client_handle::{ClientHandle, DeliveryError, Outbound};
pub use client_registry::{AdmissionError, ClientRegistry};
pub use document_state::{AcceptedEdit, CommitError, DocumentState};
pub use edit_store::{EditStore, StoreError};
