//! Broadcaster: ordered fan-out of accepted edits.
//!
//! A single task consumes [`AcceptedEdit`]s in the order the document
//! accepted them.  For each one it takes a registry snapshot that excludes
//! the originator and queues the encoded bytes on every recipient's outbound
//! queue.  Queuing never blocks, so one slow client cannot hold up the edits
//! of everyone else; socket writes happen later in each client's own writer
//! task, which preserves queue order.
//!
//! A recipient whose queue is full has fallen too far behind to keep a
//! consistent copy of the document.  It is disconnected; reconnecting gives
//! it a fresh snapshot.

use std::sync::Arc;

use collab_core::{encode_for_peers, Framing};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client_handle::{DeliveryError, Outbound};
use super::client_registry::ClientRegistry;
use super::document_state::AcceptedEdit;

/// Outcome of broadcasting one edit.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanOutReport {
    /// Recipients whose queue accepted the edit.
    pub delivered: usize,
    /// Recipients that could not take it (lagging or already gone).
    pub dropped: usize,
}

/// Consumes accepted edits and forwards them to every other client.
pub struct Broadcaster {
    registry: Arc<ClientRegistry>,
    framing: Framing,
    accepted_rx: mpsc::UnboundedReceiver<AcceptedEdit>,
}

impl Broadcaster {
    pub fn new(
        registry: Arc<ClientRegistry>,
        framing: Framing,
        accepted_rx: mpsc::UnboundedReceiver<AcceptedEdit>,
    ) -> Self {
        Self {
            registry,
            framing,
            accepted_rx,
        }
    }

    /// Runs until `shutdown` is cancelled or every sender is dropped.
    pub async fn run(mut self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("broadcaster stopping: shutdown requested");
                    break;
                }
                next = self.accepted_rx.recv() => match next {
                    Some(accepted) => {
                        self.fan_out(&accepted).await;
                    }
                    None => {
                        debug!("broadcaster stopping: document closed");
                        break;
                    }
                },
            }
        }
    }

    /// Queues one accepted edit for every registered client except its
    /// originator.
    pub async fn fan_out(&self, accepted: &AcceptedEdit) -> FanOutReport {
        let bytes = encode_for_peers(self.framing, &accepted.edit);
        let recipients = self.registry.snapshot_except(accepted.origin).await;
        let mut report = FanOutReport::default();

        for peer in recipients {
            let msg = Outbound::Edit {
                sequence: accepted.sequence,
                bytes: Arc::clone(&bytes),
            };
            match peer.deliver(msg) {
                Ok(()) => report.delivered += 1,
                Err(DeliveryError::QueueFull) => {
                    warn!(
                        "client {} ({}) is lagging; dropping it at edit #{}",
                        peer.id(),
                        peer.addr(),
                        accepted.sequence
                    );
                    peer.close();
                    report.dropped += 1;
                }
                Err(DeliveryError::Disconnected) => {
                    debug!("client {} already disconnected; skipping", peer.id());
                    report.dropped += 1;
                }
            }
        }

        if report.dropped > 0 {
            info!(
                "edit #{} from {} delivered to {} client(s), {} dropped",
                accepted.sequence, accepted.origin, report.delivered, report.dropped
            );
        } else {
            debug!(
                "edit #{} from {} delivered to {} client(s)",
                accepted.sequence, accepted.origin, report.delivered
            );
        }
        report
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
