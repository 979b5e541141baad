//! Collab server entry point.
//!
//! # Usage
//!
//! ```text
//! collab-server [OPTIONS]
//!
//! Options:
//!   --config <PATH>              TOML config file (optional)
//!   --bind <IP>                  Address to bind [default: 0.0.0.0]
//!   --port <PORT>                Listening port [default: 8080]
//!   --max-clients <N>            Concurrent client bound [default: 10]
//!   --log-path <PATH>            Persistent edit log [default: document.log]
//!   --framing <chunk|line>       Edit framing [default: chunk]
//!   --idle-timeout-secs <SECS>   Close silent connections (0 = never)
//!   --log-level <FILTER>         Log filter when RUST_LOG is unset
//!   --print-config               Print the effective config as TOML and exit
//! ```
//!
//! # Precedence
//!
//! Built-in defaults, then the config file, then environment variables,
//! then command-line flags.
//!
//! | Variable                     | Flag                  |
//! |------------------------------|-----------------------|
//! | `COLLAB_CONFIG`              | `--config`            |
//! | `COLLAB_BIND`                | `--bind`              |
//! | `COLLAB_PORT`                | `--port`              |
//! | `COLLAB_MAX_CLIENTS`         | `--max-clients`       |
//! | `COLLAB_LOG_PATH`            | `--log-path`          |
//! | `COLLAB_FRAMING`             | `--framing`           |
//! | `COLLAB_IDLE_TIMEOUT_SECS`   | `--idle-timeout-secs` |
//! | `COLLAB_LOG_LEVEL`           | `--log-level`         |
//!
//! `RUST_LOG`, when set, overrides every log level setting.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use collab_core::Framing;
use collab_server::infrastructure::storage::config::{load_config, validate, FileConfig};
use collab_server::{run_server, ServerConfig};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Real-time collaborative document server.
///
/// Every edit a client sends is appended to the shared document, written to
/// the edit log, and forwarded to every other connected client.
#[derive(Debug, Parser)]
#[command(
    name = "collab-server",
    about = "Real-time collaborative document server",
    version
)]
struct Cli {
    /// TOML config file.  A missing file means built-in defaults.
    #[arg(long, env = "COLLAB_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to bind.  `0.0.0.0` accepts connections on every interface.
    #[arg(long, env = "COLLAB_BIND")]
    bind: Option<IpAddr>,

    /// TCP port to listen on.
    #[arg(long, env = "COLLAB_PORT")]
    port: Option<u16>,

    /// Maximum number of concurrently connected clients.
    #[arg(long, env = "COLLAB_MAX_CLIENTS")]
    max_clients: Option<usize>,

    /// Append-only file holding every accepted edit.
    #[arg(long, env = "COLLAB_LOG_PATH")]
    log_path: Option<PathBuf>,

    /// `chunk`: every socket read is one edit.  `line`: one edit per line.
    #[arg(long, env = "COLLAB_FRAMING")]
    framing: Option<Framing>,

    /// Close a connection after this many silent seconds.  `0` disables it.
    #[arg(long, env = "COLLAB_IDLE_TIMEOUT_SECS")]
    idle_timeout_secs: Option<u64>,

    /// `tracing` filter used when `RUST_LOG` is not set.
    #[arg(long, env = "COLLAB_LOG_LEVEL")]
    log_level: Option<String>,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,
}

/// Fully resolved startup settings.
#[derive(Debug)]
struct Settings {
    server: ServerConfig,
    log_level: String,
}

impl Cli {
    /// Merges the config file with the command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or the
    /// merged configuration is invalid.
    fn into_settings(self) -> anyhow::Result<Settings> {
        let file = match &self.config {
            Some(path) => load_config(path)
                .with_context(|| format!("failed to load config file {}", path.display()))?,
            None => FileConfig::default(),
        };
        let log_level = self
            .log_level
            .unwrap_or_else(|| file.logging.level.clone());
        let mut server = file
            .into_server_config()
            .context("invalid config file")?;

        if let Some(ip) = self.bind {
            server.bind_addr.set_ip(ip);
        }
        if let Some(port) = self.port {
            server.bind_addr.set_port(port);
        }
        if let Some(max) = self.max_clients {
            server.max_clients = max;
        }
        if let Some(path) = self.log_path {
            server.log_path = path;
        }
        if let Some(framing) = self.framing {
            server.framing = framing;
        }
        if let Some(secs) = self.idle_timeout_secs {
            server.idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        validate(&server).context("invalid command-line option")?;
        Ok(Settings { server, log_level })
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let print_only = cli.print_config;
    let settings = cli.into_settings()?;

    if print_only {
        let mut file = FileConfig::from(&settings.server);
        file.logging.level = settings.log_level;
        println!("{}", file.to_toml_string()?);
        return Ok(());
    }

    init_tracing(&settings.log_level);
    info!(
        "collab server starting: bind={}, max_clients={}, log={}",
        settings.server.bind_addr,
        settings.server.max_clients,
        settings.server.log_path.display()
    );

    // ── Graceful shutdown ─────────────────────────────────────────────────────
    let shutdown = CancellationToken::new();
    let on_ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C; initiating graceful shutdown");
                on_ctrl_c.cancel();
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    run_server(settings.server, shutdown).await
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_without_arguments_uses_defaults() {
        // Arrange
        let cli = Cli::parse_from(["collab-server"]);

        // Act
        let settings = cli.into_settings().unwrap();

        // Assert
        assert_eq!(settings.server, ServerConfig::default());
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_cli_port_override() {
        let cli = Cli::parse_from(["collab-server", "--port", "9999"]);
        let settings = cli.into_settings().unwrap();
        assert_eq!(settings.server.bind_addr.port(), 9999);
    }

    #[test]
    fn test_cli_bind_override() {
        let cli = Cli::parse_from(["collab-server", "--bind", "127.0.0.1"]);
        let settings = cli.into_settings().unwrap();
        assert_eq!(settings.server.bind_addr.to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn test_cli_rejects_invalid_bind_address() {
        let result = Cli::try_parse_from(["collab-server", "--bind", "not.an.ip"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_framing_is_case_insensitive() {
        let cli = Cli::parse_from(["collab-server", "--framing", "LINE"]);
        assert_eq!(cli.framing, Some(Framing::Line));
    }

    #[test]
    fn test_cli_rejects_unknown_framing() {
        let result = Cli::try_parse_from(["collab-server", "--framing", "json"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_idle_timeout_zero_disables_timeout() {
        let cli = Cli::parse_from(["collab-server", "--idle-timeout-secs", "0"]);
        assert!(cli.into_settings().unwrap().server.idle_timeout.is_none());

        let cli = Cli::parse_from(["collab-server", "--idle-timeout-secs", "45"]);
        assert_eq!(
            cli.into_settings().unwrap().server.idle_timeout,
            Some(Duration::from_secs(45))
        );
    }

    #[test]
    fn test_cli_zero_max_clients_is_an_error() {
        let cli = Cli::parse_from(["collab-server", "--max-clients", "0"]);
        assert!(cli.into_settings().is_err());
    }

    #[test]
    fn test_cli_flags_override_config_file() {
        // Arrange: a file that sets the port and max_clients.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collab.toml");
        std::fs::write(
            &path,
            "[server]\nport = 7000\nmax_clients = 4\n[logging]\nlevel = \"debug\"\n",
        )
        .unwrap();

        // Act: the flag overrides only max_clients.
        let cli = Cli::parse_from([
            "collab-server",
            "--config",
            path.to_str().unwrap(),
            "--max-clients",
            "6",
        ]);
        let settings = cli.into_settings().unwrap();

        // Assert
        assert_eq!(settings.server.bind_addr.port(), 7000);
        assert_eq!(settings.server.max_clients, 6);
        assert_eq!(settings.log_level, "debug");
    }

    #[test]
    fn test_cli_log_level_flag_beats_config_file() {
        let cli = Cli::parse_from(["collab-server", "--log-level", "trace"]);
        assert_eq!(cli.into_settings().unwrap().log_level, "trace");
    }

    #[test]
    fn test_cli_missing_config_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let cli = Cli::parse_from(["collab-server", "--config", missing.to_str().unwrap()]);

        assert_eq!(cli.into_settings().unwrap().server, ServerConfig::default());
    }

    #[test]
    fn test_cli_malformed_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "not = [valid").unwrap();
        let cli = Cli::parse_from(["collab-server", "--config", path.to_str().unwrap()]);

        assert!(cli.into_settings().is_err());
    }
}
