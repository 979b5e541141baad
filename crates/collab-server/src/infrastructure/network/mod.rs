//! Network infrastructure: TCP listener, admission, and connection handlers.
//!
//! - `listener`: binds the endpoint, enforces `max_clients`, and spawns one
//!   task per admitted connection.  Also owns graceful shutdown.
//! - `connection`: the per-connection lifecycle, from onboarding snapshot
//!   through the read loop to teardown.

pub mod connection;
pub mod listener;

pub use connection::{CloseReason, ConnectionError};
pub use listener::{run_server, CollabServer, ServerError};
