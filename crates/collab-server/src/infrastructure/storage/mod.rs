//! Storage infrastructure: the persistent edit log and the config file.
//!
//! - `edit_log` implements [`EditStore`](crate::application::EditStore) on
//!   an append-only file.  Its bytes are exactly the document.
//! - `config` reads the optional TOML file that seeds [`ServerConfig`].
//!
//! [`ServerConfig`]: crate::domain::ServerConfig

pub mod config;
pub mod edit_log;

pub use edit_log::FileEditLog;
