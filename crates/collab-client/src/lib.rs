//! collab-client library crate.
//!
//! A line-oriented terminal client for the collaborative document server.
//! Two pumps run concurrently over one TCP connection:
//!
//! ```text
//!  stdin lines ──► pump_edits ──► socket ──► server
//!  terminal   ◄── pump_updates ◄── socket ◄── server
//! ```
//!
//! The binary wires them to the real terminal; tests drive them with
//! `tokio_test::io` mocks.

pub mod session;

pub use session::{
    connect, pump_edits, pump_updates, ClientError, CONNECT_FAILED_MESSAGE, GREETING,
    UPDATE_PREFIX,
};
