//! Domain layer for collab-server.
//!
//! Plain configuration types with no dependency on sockets, files, or the
//! async runtime.  The infrastructure layer fills them in from the TOML file
//! and command-line flags.

pub mod config;

pub use config::ServerConfig;
