//! Collab client entry point.
//!
//! ```text
//! collab-client [--host <HOST>] [--port <PORT>] [--line-framing]
//! ```
//!
//! Prints the current document and every edit made by other clients, and
//! sends each line typed on stdin as one edit.  Exits when the server closes
//! the connection or stdin reaches end of file.

use std::io::BufRead;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use collab_client::{connect, pump_edits, pump_updates, ClientError, CONNECT_FAILED_MESSAGE, GREETING};
use collab_core::Framing;

/// Terminal client for the collaborative document server.
#[derive(Debug, Parser)]
#[command(
    name = "collab-client",
    about = "Edit a shared document from the terminal",
    version
)]
struct Cli {
    /// Hostname or IP address of the server.
    #[arg(long, default_value = "127.0.0.1", env = "COLLAB_HOST")]
    host: String,

    /// TCP port of the server.
    #[arg(long, default_value_t = 8080, env = "COLLAB_PORT")]
    port: u16,

    /// Send each line with its newline, for servers running `--framing line`.
    #[arg(long)]
    line_framing: bool,
}

impl Cli {
    fn framing(&self) -> Framing {
        if self.line_framing {
            Framing::Line
        } else {
            Framing::Chunk
        }
    }
}

/// Reads stdin on a plain thread so a blocked read never holds up exit.
fn stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Quiet by default: the terminal belongs to the document.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let framing = cli.framing();

    let stream = match connect(&cli.host, cli.port).await {
        Ok(stream) => stream,
        Err(ClientError::Refused { .. }) => {
            println!("{CONNECT_FAILED_MESSAGE}");
            return Ok(());
        }
        Err(e) => return Err(e).context("could not reach the collab server"),
    };
    println!("{GREETING}");

    let (reader, writer) = stream.into_split();
    let updates = pump_updates(reader, tokio::io::stdout());
    let edits = pump_edits(stdin_lines(), writer, framing);

    tokio::select! {
        result = updates => {
            if let Err(e) = result {
                warn!("lost connection to server: {e}");
            }
        }
        result = edits => {
            result.context("failed to send edit")?;
        }
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_target_local_server() {
        let cli = Cli::parse_from(["collab-client"]);
        assert_eq!(cli.host, "127.0.0.1");
        assert_eq!(cli.port, 8080);
        assert_eq!(cli.framing(), Framing::Chunk);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "collab-client",
            "--host",
            "10.0.0.7",
            "--port",
            "9100",
            "--line-framing",
        ]);
        assert_eq!(cli.host, "10.0.0.7");
        assert_eq!(cli.port, 9100);
        assert_eq!(cli.framing(), Framing::Line);
    }
}
