//! Listener and admission controller.
//!
//! [`CollabServer`] owns the listening socket and the shared state.  Its
//! accept loop never waits on an individual connection: each admitted
//! connection runs in its own task, and a rejected one is answered with the
//! rejection notice from a short-lived task of its own.
//!
//! # Startup order
//!
//! The edit log is opened and loaded *before* the socket is bound.  A log
//! that cannot be read is fatal, so the service never listens with an
//! unknown document.
//!
//! # Shutdown
//!
//! Cancelling the shutdown token stops the accept loop.  Every client handle
//! holds a child of that token, so each connection handler observes it even
//! while blocked on a read or a write, and tears down.  [`CollabServer::run`] returns once
//! every connection task and the broadcaster have finished.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use collab_core::protocol::REJECTION_NOTICE;

use super::connection::{handle_connection, SessionContext};
use crate::application::{
    AdmissionError, Broadcaster, ClientHandle, ClientRegistry, DocumentState, EditStore,
    StoreError,
};
use crate::domain::ServerConfig;
use crate::infrastructure::storage::config::{validate, ConfigError};
use crate::infrastructure::storage::FileEditLog;

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Errors that prevent the server from starting.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("edit log unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("failed to bind listener on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("could not read listener address: {0}")]
    LocalAddr(#[source] std::io::Error),
}

/// A bound, loaded, not-yet-running collaborative document server.
pub struct CollabServer {
    listener: TcpListener,
    ctx: SessionContext,
    broadcaster: Broadcaster,
    shutdown: CancellationToken,
}

impl CollabServer {
    /// Opens the edit log at `config.log_path`, loads the document, and
    /// binds the listener.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Store`] if the log cannot be opened or read,
    /// and [`ServerError::Bind`] if the address is unavailable.
    pub async fn bind(config: ServerConfig, shutdown: CancellationToken) -> Result<Self, ServerError> {
        let store = FileEditLog::open(&config.log_path).await?;
        info!("persisting edits to {}", store.path().display());
        Self::bind_with_store(config, Arc::new(store), shutdown).await
    }

    /// Like [`bind`](Self::bind) but persists through `store`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] for an invalid configuration,
    /// [`ServerError::Store`] if the document cannot be loaded, and
    /// [`ServerError::Bind`] if the address is unavailable.
    pub async fn bind_with_store(
        config: ServerConfig,
        store: Arc<dyn EditStore>,
        shutdown: CancellationToken,
    ) -> Result<Self, ServerError> {
        validate(&config)?;

        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        let document = Arc::new(DocumentState::open(store, accepted_tx, config.append_retries).await?);
        let registry = Arc::new(ClientRegistry::new(config.max_clients));
        let broadcaster = Broadcaster::new(Arc::clone(&registry), config.framing, accepted_rx);

        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr,
                source,
            })?;

        Ok(Self {
            listener,
            ctx: SessionContext {
                document,
                registry,
                config: Arc::new(config),
            },
            broadcaster,
            shutdown,
        })
    }

    /// The address actually bound; useful when the configured port was 0.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::LocalAddr`] if the OS cannot report it.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::LocalAddr)
    }

    pub fn document(&self) -> Arc<DocumentState> {
        Arc::clone(&self.ctx.document)
    }

    pub fn registry(&self) -> Arc<ClientRegistry> {
        Arc::clone(&self.ctx.registry)
    }

    /// Accepts connections until the shutdown token is cancelled, then
    /// waits for every connection to finish its teardown.
    pub async fn run(self) {
        let CollabServer {
            listener,
            ctx,
            broadcaster,
            shutdown,
        } = self;

        match listener.local_addr() {
            Ok(addr) => info!(
                "collab server listening on {addr} (max {} clients, {} framing)",
                ctx.config.max_clients, ctx.config.framing
            ),
            Err(e) => warn!("collab server listening on unknown address: {e}"),
        }

        let broadcast_task = tokio::spawn(broadcaster.run(shutdown.clone()));
        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutdown requested; no longer accepting connections");
                    break;
                }
                Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = finished {
                        error!("connection task failed: {e}");
                    }
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => admit(stream, addr, &ctx, &shutdown, &mut sessions).await,
                    Err(e) => {
                        // Typically fd exhaustion; keep serving existing clients.
                        error!("accept error: {e}");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
            }
        }

        drop(listener);
        let pending = sessions.len();
        if pending > 0 {
            info!("waiting for {pending} connection(s) to close");
        }
        while let Some(finished) = sessions.join_next().await {
            if let Err(e) = finished {
                error!("connection task failed: {e}");
            }
        }
        if let Err(e) = broadcast_task.await {
            error!("broadcaster task failed: {e}");
        }
        info!("collab server stopped");
    }
}

/// Admission control for one accepted socket.
///
/// The capacity check and the insertion happen atomically inside
/// [`ClientRegistry::register`], so concurrent accepts can never push the
/// registry past `max_clients`.
async fn admit(
    stream: TcpStream,
    addr: SocketAddr,
    ctx: &SessionContext,
    shutdown: &CancellationToken,
    sessions: &mut JoinSet<()>,
) {
    let (handle, outbound_rx) =
        ClientHandle::channel(addr, ctx.config.outbound_queue_capacity, shutdown);

    match ctx.registry.register(handle.clone()).await {
        Ok(count) => {
            info!(
                "client {} connected from {addr} ({count}/{})",
                handle.id(),
                ctx.registry.max_clients()
            );
            sessions.spawn(handle_connection(stream, handle, outbound_rx, ctx.clone()));
        }
        Err(AdmissionError::Full { max }) => {
            info!("rejecting {addr}: server full ({max} clients)");
            sessions.spawn(reject(stream, addr));
        }
        Err(e) => {
            warn!("rejecting {addr}: {e}");
            sessions.spawn(reject(stream, addr));
        }
    }
}

/// How long a rejected socket is drained before it is dropped.
const REJECT_LINGER: Duration = Duration::from_millis(500);

/// Sends the rejection notice and closes the socket without admitting it.
///
/// Input the client already sent is drained first.  Dropping a socket with
/// unread input resets the connection, and the reset can discard the notice
/// before the client reads it.
async fn reject(mut stream: TcpStream, addr: SocketAddr) {
    if let Err(e) = stream.write_all(REJECTION_NOTICE).await {
        debug!("could not send rejection notice to {addr}: {e}");
    }
    if let Err(e) = stream.shutdown().await {
        debug!("closing rejected connection {addr}: {e}");
    }

    let mut sink = [0u8; 512];
    let drained = tokio::time::timeout(REJECT_LINGER, async {
        loop {
            match stream.read(&mut sink).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
    })
    .await;
    if drained.is_err() {
        debug!("rejected connection {addr} still open after {REJECT_LINGER:?}; dropping it");
    }
}

/// Binds a server for `config` and runs it until `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error if the edit log cannot be opened or loaded, or the
/// listener cannot be bound.  Errors on individual connections are logged
/// and never returned.
pub async fn run_server(config: ServerConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let log_path = config.log_path.clone();
    let bind_addr = config.bind_addr;

    let server = CollabServer::bind(config, shutdown)
        .await
        .with_context(|| {
            format!(
                "failed to start collab server on {bind_addr} with log {}",
                log_path.display()
            )
        })?;
    server.run().await;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
