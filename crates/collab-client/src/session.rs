//! One client session: connect, then pump edits out and updates in.

use std::io;

use collab_core::{encode_for_peers, Edit, Framing};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::debug;

/// Printed when the server refuses the connection.
pub const CONNECT_FAILED_MESSAGE: &str = "Connection failed. Please check the server and try again";
/// Printed once connected.
pub const GREETING: &str = "Connected to the server. Start typing to edit the document:";
/// Prefix of every line printed for data received from the server.
pub const UPDATE_PREFIX: &str = "Document updated: ";

const RECV_BUFFER_SIZE: usize = 1024;

/// Error type for client sessions.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Nothing is listening at the address.
    #[error("connection to {addr} refused")]
    Refused { addr: String },

    #[error("could not connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("receive failed: {0}")]
    Receive(#[source] io::Error),

    #[error("send failed: {0}")]
    Send(#[source] io::Error),

    #[error("could not write to the terminal: {0}")]
    Output(#[source] io::Error),
}

/// Opens the TCP connection to `host:port`.
///
/// # Errors
///
/// Returns [`ClientError::Refused`] when the server is not running, and
/// [`ClientError::Connect`] for any other failure.
pub async fn connect(host: &str, port: u16) -> Result<TcpStream, ClientError> {
    let addr = format!("{host}:{port}");
    match TcpStream::connect(&addr).await {
        Ok(stream) => {
            debug!("connected to {addr}");
            Ok(stream)
        }
        Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => Err(ClientError::Refused { addr }),
        Err(source) => Err(ClientError::Connect { addr, source }),
    }
}

/// Copies everything the server sends to `out`, one
/// `Document updated: <text>` line per read.
///
/// The first read after connecting carries the current document; later reads
/// carry other clients' edits.  Returns the number of updates printed once
/// the server closes the connection.
///
/// # Errors
///
/// Returns [`ClientError::Receive`] on a socket error and
/// [`ClientError::Output`] if `out` cannot be written.
pub async fn pump_updates<R, W>(mut reader: R, mut out: W) -> Result<usize, ClientError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];
    let mut updates = 0;
    loop {
        let n = reader.read(&mut buf).await.map_err(ClientError::Receive)?;
        if n == 0 {
            debug!("server closed the connection after {updates} update(s)");
            return Ok(updates);
        }
        let line = format!("{UPDATE_PREFIX}{}\n", String::from_utf8_lossy(&buf[..n]));
        out.write_all(line.as_bytes())
            .await
            .map_err(ClientError::Output)?;
        out.flush().await.map_err(ClientError::Output)?;
        updates += 1;
    }
}

/// Sends each line from `lines` as one edit until the channel closes, then
/// half-closes the connection.
///
/// Empty lines are skipped.  With [`Framing::Line`] each edit is sent with
/// its terminating newline; with [`Framing::Chunk`] the bare text is sent
/// and the server treats each read as one edit.
///
/// # Errors
///
/// Returns [`ClientError::Send`] if the socket write fails.
pub async fn pump_edits<W>(
    mut lines: mpsc::Receiver<String>,
    mut writer: W,
    framing: Framing,
) -> Result<usize, ClientError>
where
    W: AsyncWrite + Unpin,
{
    let mut sent = 0;
    while let Some(line) = lines.recv().await {
        if line.is_empty() {
            continue;
        }
        let bytes = encode_for_peers(framing, &Edit::from(line.as_str()));
        writer.write_all(&bytes).await.map_err(ClientError::Send)?;
        sent += 1;
    }
    writer.shutdown().await.map_err(ClientError::Send)?;
    Ok(sent)
}
