//! Infrastructure layer for collab-server.
//!
//! Contains the OS-facing adapters: the TCP listener and per-connection
//! handlers, the append-only edit log file, and the TOML config file.
//!
//! **Dependency rule**: this layer may depend on `application`, `domain`,
//! and `collab_core`, but MUST NOT be imported by them.

pub mod network;
pub mod storage;
