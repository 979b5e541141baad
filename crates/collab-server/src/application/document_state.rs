//! DocumentState: the authoritative document and its persistent log.
//!
//! Both live behind a single async mutex.  Committing an edit is one
//! critical section:
//!
//! ```text
//! lock ─► append record to log (durable) ─► apply to Document ─► hand to broadcaster ─► unlock
//!               │ fails after retries
//!               └─► unlock, report error: memory untouched, nothing forwarded
//! ```
//!
//! The log is written *before* memory is updated, so a failed append can
//! never leave the in-memory document ahead of the log, and an edit that was
//! not persisted is never broadcast.  Because the hand-off to the
//! broadcaster happens inside the same critical section, the order edits
//! reach the broadcaster is exactly the order they were applied and logged.

use std::sync::Arc;
use std::time::Duration;

use collab_core::{ClientId, Document, DocumentSnapshot, Edit};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use super::edit_store::{EditStore, StoreError};

const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// An edit that is durable and part of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedEdit {
    /// Position in this process's acceptance order, starting at 1.
    pub sequence: u64,
    /// The client that submitted the edit; excluded from its broadcast.
    pub origin: ClientId,
    pub edit: Edit,
}

/// Why an edit was not accepted.
#[derive(Debug, Error)]
pub enum CommitError {
    #[error("edit not persisted after {attempts} attempt(s): {source}")]
    NotPersisted {
        attempts: u32,
        #[source]
        source: StoreError,
    },
}

/// Shared, lock-protected document plus its persistent log.
pub struct DocumentState {
    document: Mutex<Document>,
    store: Arc<dyn EditStore>,
    accepted_tx: mpsc::UnboundedSender<AcceptedEdit>,
    append_retries: u32,
    retry_backoff: Duration,
}

impl DocumentState {
    /// Loads the document from `store` and prepares it for commits.
    ///
    /// Every accepted edit is sent on `accepted_tx`, in acceptance order.
    ///
    /// # Errors
    ///
    /// Returns the [`StoreError`] if the log cannot be read.  The service
    /// must not start with an unknown document, so callers treat this as
    /// fatal.
    pub async fn open(
        store: Arc<dyn EditStore>,
        accepted_tx: mpsc::UnboundedSender<AcceptedEdit>,
        append_retries: u32,
    ) -> Result<Self, StoreError> {
        let content = store.load().await?;
        info!("loaded document from edit log ({} bytes)", content.len());
        Ok(Self {
            document: Mutex::new(Document::from_persisted(content)),
            store,
            accepted_tx,
            append_retries,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        })
    }

    /// Overrides the linear backoff between append attempts.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Point-in-time copy of the document, never observed mid-commit.
    pub async fn snapshot(&self) -> DocumentSnapshot {
        self.document.lock().await.snapshot()
    }

    /// Persists, applies, and queues `edit` for broadcast.
    ///
    /// Returns the edit's sequence number, or `None` for an empty edit,
    /// which is a no-op: not logged, not applied, not broadcast.
    ///
    /// # Errors
    ///
    /// Returns [`CommitError::NotPersisted`] when every append attempt
    /// failed.  The document is unchanged and nothing is broadcast.
    pub async fn commit(&self, origin: ClientId, edit: Edit) -> Result<Option<u64>, CommitError> {
        if edit.is_empty() {
            return Ok(None);
        }
        let record = Document::record_for(&edit);

        let mut document = self.document.lock().await;
        self.append_with_retry(&record).await?;

        let Some(sequence) = document.apply(&edit) else {
            return Ok(None);
        };

        let accepted = AcceptedEdit {
            sequence,
            origin,
            edit,
        };
        if self.accepted_tx.send(accepted).is_err() {
            debug!("broadcaster stopped; edit #{sequence} accepted without fan-out");
        }
        Ok(Some(sequence))
    }

    async fn append_with_retry(&self, record: &[u8]) -> Result<(), CommitError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.store.append(record).await {
                Ok(()) => return Ok(()),
                Err(e) if attempts <= self.append_retries => {
                    warn!("edit log append failed (attempt {attempts}): {e}; retrying");
                    tokio::time::sleep(self.retry_backoff * attempts).await;
                }
                Err(source) => return Err(CommitError::NotPersisted { attempts, source }),
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
