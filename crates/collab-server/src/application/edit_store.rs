//! Persistence seam for accepted edits.
//!
//! [`DocumentState`](super::DocumentState) talks to storage only through the
//! [`EditStore`] trait.  Production uses the append-only file in
//! `infrastructure::storage`; tests substitute a `mockall` mock to exercise
//! failure paths that are hard to provoke on a real filesystem.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

/// Error type for persistent log operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A file system I/O error occurred.
    #[error("I/O error on edit log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing store refused the operation for a non-I/O reason.
    #[error("edit log unavailable: {0}")]
    Unavailable(String),
}

/// Durable, append-only record of accepted edits.
///
/// Implementations must make `append` durable before returning `Ok`, and
/// must leave no partial record behind when they return `Err`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EditStore: Send + Sync {
    /// Reads the whole log, in file order.
    async fn load(&self) -> Result<Vec<u8>, StoreError>;

    /// Appends one record and flushes it to stable storage.
    async fn append(&self, record: &[u8]) -> Result<(), StoreError>;
}
