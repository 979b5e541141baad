//! Domain entities for the collaborative document service.
//!
//! Pure business logic with no infrastructure dependencies: nothing in here
//! opens a socket, touches the filesystem, or needs an async runtime, so
//! every rule can be unit-tested in isolation.

/// The authoritative, append-only document.
pub mod document;

/// A single client-submitted edit and client identity.
pub mod edit;

/// Per-connection lifecycle states.
pub mod session;
