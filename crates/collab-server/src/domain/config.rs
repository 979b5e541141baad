//! Server runtime configuration.
//!
//! [`ServerConfig`] is the single source of truth for all runtime settings.
//! It is built once at startup (defaults, then the TOML file, then CLI
//! flags) and shared read-only with every connection handler behind an `Arc`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use collab_core::Framing;

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8080;
/// Default admission bound.
pub const DEFAULT_MAX_CLIENTS: usize = 10;
/// Default size of one socket read, and therefore of one chunk-framed edit.
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 1024;
/// Default per-client broadcast queue depth.
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 256;
/// Default number of extra attempts for a failed log append.
pub const DEFAULT_APPEND_RETRIES: u32 = 2;
/// Default persistent log location, relative to the working directory.
pub const DEFAULT_LOG_PATH: &str = "document.log";

/// All runtime configuration for the collaborative document server.
///
/// # Example
///
/// ```rust
/// use collab_server::domain::ServerConfig;
///
/// let cfg = ServerConfig::default();
/// assert_eq!(cfg.bind_addr.port(), 8080);
/// assert_eq!(cfg.max_clients, 10);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address and port the listener binds to.
    pub bind_addr: SocketAddr,

    /// Maximum number of concurrently connected clients.  Connection
    /// attempts beyond this are refused with a notice, not queued.
    pub max_clients: usize,

    /// Append-only file holding every accepted edit, one record per edit.
    pub log_path: PathBuf,

    /// How the inbound byte stream is split into edits.
    pub framing: Framing,

    /// Bytes requested per socket read.  In line mode this is also the
    /// longest accepted line.
    pub recv_buffer_size: usize,

    /// Close a connection that sends nothing for this long.  `None` keeps
    /// silent clients connected indefinitely.
    pub idle_timeout: Option<Duration>,

    /// Per-client queue of edits waiting to be written to that client's
    /// socket.  A client whose queue overflows is disconnected.
    pub outbound_queue_capacity: usize,

    /// Extra attempts made when appending to the log fails, before the edit
    /// is rejected.
    pub append_retries: u32,
}

impl Default for ServerConfig {
    /// | Field                   | Default          |
    /// |-------------------------|------------------|
    /// | bind_addr               | `0.0.0.0:8080`   |
    /// | max_clients             | 10               |
    /// | log_path                | `document.log`   |
    /// | framing                 | chunk            |
    /// | recv_buffer_size        | 1024             |
    /// | idle_timeout            | none             |
    /// | outbound_queue_capacity | 256              |
    /// | append_retries          | 2                |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_clients: DEFAULT_MAX_CLIENTS,
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            framing: Framing::Chunk,
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            idle_timeout: None,
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            append_retries: DEFAULT_APPEND_RETRIES,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
