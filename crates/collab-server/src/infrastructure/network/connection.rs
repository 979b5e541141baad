//! Per-connection handler.
//!
//! Every admitted client gets one task running [`handle_connection`], which
//! walks the connection through its lifecycle:
//!
//! ```text
//! ADMITTED ─► ONBOARDING ─► ACTIVE ⟲ (one commit per decoded edit)
//!                 │            │
//!                 └────────────┴─► CLOSING ─► CLOSED
//! ```
//!
//! - **ONBOARDING**: take a document snapshot and write it to the socket.
//! - **ACTIVE**: a writer task drains the client's outbound queue onto the
//!   socket while this task reads, decodes, and commits edits.
//! - **CLOSING/CLOSED**: deregister, close the handle (which stops the
//!   writer), and drop the socket.  Runs exactly once, whatever ended the
//!   connection.
//!
//! The handle was registered before onboarding began, so edits accepted
//! while the snapshot is taken are already queued for this client.  The
//! writer skips every queued edit whose sequence number is covered by the
//! snapshot; the client sees each edit exactly once.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use collab_core::protocol::PERSIST_FAILURE_NOTICE;
use collab_core::{ConnectionPhase, Edit, EditDecoder, FramingError, PhaseError};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::application::{ClientHandle, ClientRegistry, DocumentState, Outbound};
use crate::domain::ServerConfig;

/// Why a connection ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The client closed its end of the stream.
    PeerClosed,
    /// Nothing was received within the configured idle timeout.
    IdleTimeout,
    /// The handle was closed by the server: shutdown, or the client fell
    /// too far behind on broadcasts.
    Cancelled,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CloseReason::PeerClosed => "peer closed the connection",
            CloseReason::IdleTimeout => "idle timeout",
            CloseReason::Cancelled => "closed by server",
        };
        f.write_str(text)
    }
}

/// Errors that end one connection.  None of them affect other clients.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to send initial document: {0}")]
    Onboarding(#[source] io::Error),

    #[error("read failed: {0}")]
    Read(#[source] io::Error),

    #[error(transparent)]
    Framing(#[from] FramingError),

    #[error(transparent)]
    Phase(#[from] PhaseError),
}

/// Shared state every connection handler needs.
#[derive(Clone)]
pub(crate) struct SessionContext {
    pub document: Arc<DocumentState>,
    pub registry: Arc<ClientRegistry>,
    pub config: Arc<ServerConfig>,
}

/// Runs one admitted connection to completion and tears it down.
///
/// Wraps [`run_connection`] so teardown happens on every exit path.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    handle: ClientHandle,
    outbound_rx: mpsc::Receiver<Outbound>,
    ctx: SessionContext,
) {
    let id = handle.id();
    let addr = handle.addr();
    let mut phase = ConnectionPhase::Admitted;

    match run_connection(stream, &handle, outbound_rx, &ctx, &mut phase).await {
        Ok(reason) => info!("client {id} ({addr}) disconnected: {reason}"),
        Err(e) => warn!("client {id} ({addr}) closed with error: {e}"),
    }

    advance(&mut phase, ConnectionPhase::Closing, &handle);
    ctx.registry.deregister(id).await;
    handle.close();
    advance(&mut phase, ConnectionPhase::Closed, &handle);
    debug!(
        "client {id} released ({} client(s) remain)",
        ctx.registry.count().await
    );
}

fn advance(phase: &mut ConnectionPhase, next: ConnectionPhase, handle: &ClientHandle) {
    match phase.transition(next) {
        Ok(()) => debug!("client {} -> {next}", handle.id()),
        Err(e) => debug!("client {}: {e}", handle.id()),
    }
}

async fn run_connection(
    stream: TcpStream,
    handle: &ClientHandle,
    outbound_rx: mpsc::Receiver<Outbound>,
    ctx: &SessionContext,
    phase: &mut ConnectionPhase,
) -> Result<CloseReason, ConnectionError> {
    let (mut reader, mut writer) = stream.into_split();

    // ── Onboarding ────────────────────────────────────────────────────────────
    phase.transition(ConnectionPhase::Onboarding)?;
    let snapshot = ctx.document.snapshot().await;
    // A peer that never reads can stall this write forever.
    tokio::select! {
        _ = handle.closed() => return Ok(CloseReason::Cancelled),
        written = writer.write_all(&snapshot.content) => {
            written.map_err(ConnectionError::Onboarding)?;
        }
    }
    debug!(
        "client {} onboarded with {} bytes at edit #{}",
        handle.id(),
        snapshot.content.len(),
        snapshot.sequence
    );

    // ── Active ────────────────────────────────────────────────────────────────
    phase.transition(ConnectionPhase::Active)?;
    let writer_task = tokio::spawn(write_outbound(
        writer,
        outbound_rx,
        snapshot.sequence,
        handle.clone(),
    ));

    let result = read_edits(&mut reader, handle, ctx).await;

    handle.close();
    if let Err(e) = writer_task.await {
        error!("writer task for client {} failed: {e}", handle.id());
    }
    result
}

/// Reads, decodes, and commits edits until the connection ends.
async fn read_edits(
    reader: &mut OwnedReadHalf,
    handle: &ClientHandle,
    ctx: &SessionContext,
) -> Result<CloseReason, ConnectionError> {
    let mut decoder = EditDecoder::new(ctx.config.framing, ctx.config.recv_buffer_size);
    let mut buf = vec![0u8; ctx.config.recv_buffer_size.max(1)];
    let mut edits = Vec::new();

    loop {
        let read = tokio::select! {
            _ = handle.closed() => return Ok(CloseReason::Cancelled),
            read = read_chunk(reader, &mut buf, ctx.config.idle_timeout) => read,
        };

        let n = match read {
            Ok(Some(n)) => n,
            Ok(None) => return Ok(CloseReason::IdleTimeout),
            Err(e) => return Err(ConnectionError::Read(e)),
        };

        if n == 0 {
            if let Some(edit) = decoder.finish() {
                commit_edit(handle, ctx, edit).await;
            }
            return Ok(CloseReason::PeerClosed);
        }

        // Lines completed before an oversized one are still committed.
        let decoded = decoder.decode_into(&buf[..n], &mut edits);
        for edit in edits.drain(..) {
            commit_edit(handle, ctx, edit).await;
        }
        decoded?;
    }
}

/// One socket read.  `Ok(None)` means the idle timeout elapsed first.
async fn read_chunk(
    reader: &mut OwnedReadHalf,
    buf: &mut [u8],
    idle_timeout: Option<Duration>,
) -> io::Result<Option<usize>> {
    match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, reader.read(buf)).await {
            Ok(read) => read.map(Some),
            Err(_) => Ok(None),
        },
        None => reader.read(buf).await.map(Some),
    }
}

async fn commit_edit(handle: &ClientHandle, ctx: &SessionContext, edit: Edit) {
    let len = edit.len();
    match ctx.document.commit(handle.id(), edit).await {
        Ok(Some(sequence)) => {
            debug!("client {} edit #{sequence} accepted ({len} bytes)", handle.id());
        }
        Ok(None) => debug!("client {} sent an empty edit; ignored", handle.id()),
        Err(e) => {
            error!("client {}: {e}", handle.id());
            if let Err(d) = handle.deliver(Outbound::Notice(PERSIST_FAILURE_NOTICE)) {
                warn!("could not notify client {} of failed save: {d}", handle.id());
            }
        }
    }
}

/// Drains `rx` onto the socket until the handle is closed.
///
/// Edits with a sequence number at or below `joined_at` are already part of
/// the snapshot this client received and are skipped.  A failed write
/// closes the handle, which ends the read loop as well.  Closing the handle
/// also abandons a write that is blocked on a peer that stopped reading.
async fn write_outbound(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::Receiver<Outbound>,
    joined_at: u64,
    handle: ClientHandle,
) {
    loop {
        let msg = tokio::select! {
            _ = handle.closed() => break,
            msg = rx.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        let bytes: &[u8] = match &msg {
            Outbound::Edit { sequence, .. } if *sequence <= joined_at => continue,
            Outbound::Edit { bytes, .. } => &**bytes,
            Outbound::Notice(text) => *text,
        };

        let written = tokio::select! {
            _ = handle.closed() => break,
            written = writer.write_all(bytes) => written,
        };
        if let Err(e) = written {
            warn!("send to client {} ({}) failed: {e}", handle.id(), handle.addr());
            handle.close();
            break;
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!("client {} socket shutdown: {e}", handle.id());
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
