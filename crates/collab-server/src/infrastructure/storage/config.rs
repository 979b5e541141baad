//! TOML configuration file for the server.
//!
//! The file is optional.  Every key has a serde default, so a missing file,
//! an empty file, and a file that only sets one key are all valid:
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0"
//! port = 8080
//! max_clients = 10
//! framing = "chunk"          # or "line"
//! recv_buffer_size = 1024
//! idle_timeout_secs = 0      # 0 disables the idle timeout
//! outbound_queue_capacity = 256
//!
//! [storage]
//! log_path = "document.log"
//! append_retries = 2
//!
//! [logging]
//! level = "info"
//! ```
//!
//! [`FileConfig::into_server_config`] validates the values and produces the
//! runtime [`ServerConfig`].  CLI flags are applied on top of that by the
//! binary.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use collab_core::Framing;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::config::{
    ServerConfig, DEFAULT_APPEND_RETRIES, DEFAULT_LOG_PATH, DEFAULT_MAX_CLIENTS,
    DEFAULT_OUTBOUND_QUEUE_CAPACITY, DEFAULT_PORT, DEFAULT_RECV_BUFFER_SIZE,
};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `bind_address` is not an IP address.
    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),

    /// A value is out of range.
    #[error("invalid config value: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// On-disk configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Listener, admission, and per-connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSection {
    /// IP address to bind.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    #[serde(default)]
    pub framing: Framing,
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,
    /// Seconds without inbound bytes before a connection is closed.  `0`
    /// disables the timeout.
    #[serde(default)]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,
}

/// Persistent log settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageSection {
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
    #[serde(default = "default_append_retries")]
    pub append_retries: u32,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSection {
    /// `tracing` filter directive used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_max_clients() -> usize {
    DEFAULT_MAX_CLIENTS
}
fn default_recv_buffer_size() -> usize {
    DEFAULT_RECV_BUFFER_SIZE
}
fn default_outbound_queue_capacity() -> usize {
    DEFAULT_OUTBOUND_QUEUE_CAPACITY
}
fn default_log_path() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_PATH)
}
fn default_append_retries() -> u32 {
    DEFAULT_APPEND_RETRIES
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            max_clients: default_max_clients(),
            framing: Framing::default(),
            recv_buffer_size: default_recv_buffer_size(),
            idle_timeout_secs: 0,
            outbound_queue_capacity: default_outbound_queue_capacity(),
        }
    }
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
            append_retries: default_append_retries(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl FileConfig {
    /// Validates the file values and builds the runtime configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBindAddress`] if `bind_address` is not
    /// an IP address, and [`ConfigError::Invalid`] if `max_clients`,
    /// `recv_buffer_size`, or `outbound_queue_capacity` is zero.
    pub fn into_server_config(self) -> Result<ServerConfig, ConfigError> {
        let server = self.server;
        let ip: IpAddr = server
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(server.bind_address.clone()))?;

        let config = ServerConfig {
            bind_addr: SocketAddr::new(ip, server.port),
            max_clients: server.max_clients,
            log_path: self.storage.log_path,
            framing: server.framing,
            recv_buffer_size: server.recv_buffer_size,
            idle_timeout: (server.idle_timeout_secs > 0)
                .then(|| Duration::from_secs(server.idle_timeout_secs)),
            outbound_queue_capacity: server.outbound_queue_capacity,
            append_retries: self.storage.append_retries,
        };
        validate(&config)?;
        Ok(config)
    }

    /// Renders the config as pretty TOML, for `--print-config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl From<&ServerConfig> for FileConfig {
    fn from(cfg: &ServerConfig) -> Self {
        Self {
            server: ServerSection {
                bind_address: cfg.bind_addr.ip().to_string(),
                port: cfg.bind_addr.port(),
                max_clients: cfg.max_clients,
                framing: cfg.framing,
                recv_buffer_size: cfg.recv_buffer_size,
                idle_timeout_secs: cfg.idle_timeout.map_or(0, |d| d.as_secs()),
                outbound_queue_capacity: cfg.outbound_queue_capacity,
            },
            storage: StorageSection {
                log_path: cfg.log_path.clone(),
                append_retries: cfg.append_retries,
            },
            logging: LoggingSection::default(),
        }
    }
}

/// Checks the invariants every [`ServerConfig`] must satisfy, wherever its
/// values came from.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] naming the first offending field.
pub fn validate(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.max_clients == 0 {
        return Err(ConfigError::Invalid("max_clients must be at least 1".into()));
    }
    if config.recv_buffer_size == 0 {
        return Err(ConfigError::Invalid(
            "recv_buffer_size must be at least 1".into(),
        ));
    }
    if config.outbound_queue_capacity == 0 {
        return Err(ConfigError::Invalid(
            "outbound_queue_capacity must be at least 1".into(),
        ));
    }
    Ok(())
}

// ── Config loading ────────────────────────────────────────────────────────────

/// Loads the config file at `path`, returning defaults if it does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_server_config_defaults() {
        let cfg = FileConfig::default().into_server_config().unwrap();
        assert_eq!(cfg, ServerConfig::default());
    }

    #[test]
    fn test_default_log_level_is_info() {
        assert_eq!(FileConfig::default().logging.level, "info");
    }

    #[test]
    fn test_empty_file_uses_every_default() {
        let cfg: FileConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, FileConfig::default());
    }

    #[test]
    fn test_partial_file_overrides_only_given_keys() {
        // Arrange
        let text = r#"
            [server]
            port = 9100
            framing = "line"

            [storage]
            log_path = "/var/lib/collab/doc.log"
        "#;

        // Act
        let cfg = toml::from_str::<FileConfig>(text)
            .unwrap()
            .into_server_config()
            .unwrap();

        // Assert
        assert_eq!(cfg.bind_addr.port(), 9100);
        assert_eq!(cfg.framing, Framing::Line);
        assert_eq!(cfg.log_path, PathBuf::from("/var/lib/collab/doc.log"));
        assert_eq!(cfg.max_clients, 10);
        assert_eq!(cfg.append_retries, 2);
    }

    #[test]
    fn test_idle_timeout_zero_means_disabled() {
        let mut file = FileConfig::default();
        file.server.idle_timeout_secs = 0;
        assert!(file.clone().into_server_config().unwrap().idle_timeout.is_none());

        file.server.idle_timeout_secs = 30;
        assert_eq!(
            file.into_server_config().unwrap().idle_timeout,
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_invalid_bind_address_is_rejected() {
        let mut file = FileConfig::default();
        file.server.bind_address = "not-an-ip".to_string();

        let result = file.into_server_config();

        assert!(matches!(result, Err(ConfigError::InvalidBindAddress(a)) if a == "not-an-ip"));
    }

    #[test]
    fn test_zero_max_clients_is_rejected() {
        let mut file = FileConfig::default();
        file.server.max_clients = 0;

        assert!(matches!(
            file.into_server_config(),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_unknown_framing_is_a_parse_error() {
        let result = toml::from_str::<FileConfig>("[server]\nframing = \"json\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let original = ServerConfig {
            max_clients: 4,
            framing: Framing::Line,
            idle_timeout: Some(Duration::from_secs(90)),
            ..ServerConfig::default()
        };

        let text = FileConfig::from(&original).to_toml_string().unwrap();
        let restored = toml::from_str::<FileConfig>(&text)
            .unwrap()
            .into_server_config()
            .unwrap();

        assert_eq!(restored, original);
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, FileConfig::default());
    }

    #[test]
    fn test_load_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_reads_values_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collab.toml");
        std::fs::write(&path, "[server]\nmax_clients = 3\n[logging]\nlevel = \"debug\"\n").unwrap();

        let cfg = load_config(&path).unwrap();

        assert_eq!(cfg.server.max_clients, 3);
        assert_eq!(cfg.logging.level, "debug");
    }
}
