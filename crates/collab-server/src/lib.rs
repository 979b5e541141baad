//! collab-server library crate.
//!
//! A small real-time collaborative document service.  Clients connect over
//! TCP, receive the current document on join, and from then on every edit a
//! client sends is appended to the shared document, written to an
//! append-only log on disk, and forwarded to every other connected client.
//!
//! # Architecture
//!
//! ```text
//! TCP clients
//!      ↕
//! [collab-server]
//!   ├── domain/            ServerConfig (plain data, no I/O)
//!   ├── application/
//!   │     ├── document_state   Document + persistent log, one exclusive region
//!   │     ├── client_registry  Bounded set of live client handles
//!   │     ├── client_handle    Identity, address, outbound queue, close signal
//!   │     ├── broadcast        Ordered fan-out of accepted edits
//!   │     └── edit_store       Persistence trait seam
//!   └── infrastructure/
//!         ├── network/     Accept loop + admission, per-connection handler
//!         └── storage/     Append-only edit log file, TOML config file
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` owns all shared mutable state; every access goes through
//!   its public operations.  It depends on `tokio` only for locks and
//!   channels, never for sockets or files.
//! - `infrastructure` does the socket and file work.

/// Domain layer: runtime configuration.
pub mod domain;

/// Application layer: shared document, client registry, broadcast.
pub mod application;

/// Infrastructure layer: TCP listener, connection handler, file storage.
pub mod infrastructure;

pub use domain::ServerConfig;
pub use infrastructure::network::{run_server, CollabServer, ServerError};
