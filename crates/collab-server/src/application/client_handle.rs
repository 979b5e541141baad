//! ClientHandle: the registry's view of one live connection.
//!
//! A handle is cheap to clone.  One copy lives in the [`ClientRegistry`]
//! (so the broadcaster can reach the client), one in the connection handler
//! that reads from the socket, and one in the writer task that drains the
//! outbound queue onto the socket.
//!
//! ```text
//!                      ┌─────────────────┐
//!  Broadcaster ──try_send──► outbound queue ├──► writer task ──► socket
//!                      └─────────────────┘
//!  close() ── cancels ──► reader loop + writer task observe it
//! ```
//!
//! [`ClientRegistry`]: super::ClientRegistry

use std::net::SocketAddr;
use std::sync::Arc;

use collab_core::ClientId;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use uuid::Uuid;

/// Bytes queued for delivery to one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// An edit accepted from another client, tagged with its sequence number.
    Edit { sequence: u64, bytes: Arc<[u8]> },
    /// A fixed server notice addressed to this client only.
    Notice(&'static [u8]),
}

/// Why a message could not be queued for a client.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The client is not draining its queue fast enough.
    #[error("outbound queue is full")]
    QueueFull,
    /// The client's writer has already stopped.
    #[error("client is disconnected")]
    Disconnected,
}

/// Identity, address, and send capability of one connected client.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: ClientId,
    addr: SocketAddr,
    outbound: mpsc::Sender<Outbound>,
    cancel: CancellationToken,
}

impl ClientHandle {
    /// Creates a handle with a fresh id and its outbound queue.
    ///
    /// The handle's close signal is a child of `parent`, so cancelling the
    /// server-wide shutdown token closes every client, while closing one
    /// client leaves the others alone.
    pub fn channel(
        addr: SocketAddr,
        queue_capacity: usize,
        parent: &CancellationToken,
    ) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let handle = Self {
            id: Uuid::new_v4(),
            addr,
            outbound: tx,
            cancel: parent.child_token(),
        };
        (handle, rx)
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Queues `msg` without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::QueueFull`] when the client is lagging and
    /// [`DeliveryError::Disconnected`] when its writer has gone away.
    pub fn deliver(&self, msg: Outbound) -> Result<(), DeliveryError> {
        self.outbound.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Disconnected,
        })
    }

    /// Asks the connection to shut down.  Safe to call any number of times.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once [`close`](Self::close) has been called on any clone of
    /// this handle, or the server is shutting down.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    #[test]
    fn test_each_handle_gets_a_unique_id() {
        let root = CancellationToken::new();
        let (a, _ra) = ClientHandle::channel(addr(), 4, &root);
        let (b, _rb) = ClientHandle::channel(addr(), 4, &root);
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_deliver_queues_message_for_receiver() {
        let root = CancellationToken::new();
        let (handle, mut rx) = ClientHandle::channel(addr(), 4, &root);

        handle.deliver(Outbound::Notice(b"hi")).unwrap();

        assert_eq!(rx.recv().await, Some(Outbound::Notice(b"hi")));
    }

    #[test]
    fn test_deliver_reports_full_queue() {
        let root = CancellationToken::new();
        let (handle, _rx) = ClientHandle::channel(addr(), 1, &root);
        handle.deliver(Outbound::Notice(b"1")).unwrap();

        assert_eq!(
            handle.deliver(Outbound::Notice(b"2")),
            Err(DeliveryError::QueueFull)
        );
    }

    #[test]
    fn test_deliver_reports_disconnected_receiver() {
        let root = CancellationToken::new();
        let (handle, rx) = ClientHandle::channel(addr(), 1, &root);
        drop(rx);

        assert_eq!(
            handle.deliver(Outbound::Notice(b"x")),
            Err(DeliveryError::Disconnected)
        );
    }

    #[test]
    fn test_close_is_idempotent_and_shared_by_clones() {
        let root = CancellationToken::new();
        let (handle, _rx) = ClientHandle::channel(addr(), 1, &root);
        let clone = handle.clone();

        handle.close();
        handle.close();

        assert!(clone.is_closed());
        assert!(!root.is_cancelled(), "closing one client must not stop the server");
    }

    #[test]
    fn test_server_shutdown_closes_handle() {
        let root = CancellationToken::new();
        let (handle, _rx) = ClientHandle::channel(addr(), 1, &root);

        root.cancel();

        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_closed_future_resolves_after_close() {
        let root = CancellationToken::new();
        let (handle, _rx) = ClientHandle::channel(addr(), 1, &root);
        handle.close();
        tokio::time::timeout(std::time::Duration::from_secs(1), handle.closed())
            .await
            .expect("closed() must resolve once the handle is closed");
    }
}
