//! The edit unit and client identity.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

/// Unique identifier for a connected client, derived from UUID v4.
///
/// A fresh id is minted for every accepted connection, so a client that
/// disconnects and reconnects is a different client as far as the registry
/// and the broadcast exclusion are concerned.
pub type ClientId = Uuid;

/// One client-submitted unit of text appended to the document.
///
/// The payload is kept as raw bytes: the wire carries UTF-8 text, but a
/// chunk boundary may split a multi-byte character, and edits are forwarded
/// to peers verbatim.  The bytes live behind an `Arc` so fanning one edit out
/// to many peers never copies the payload.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Edit {
    bytes: Arc<[u8]>,
}

impl Edit {
    /// Creates an edit from raw bytes.
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Returns the raw edit bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns a cheap shared handle to the edit bytes.
    pub fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    /// Length of the edit in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// An empty edit carries no change and is never accepted.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lossy UTF-8 rendering, for log output only.
    pub fn text_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

impl From<&str> for Edit {
    fn from(text: &str) -> Self {
        Self::new(text.as_bytes())
    }
}

impl From<Vec<u8>> for Edit {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for Edit {
    fn from(bytes: &[u8]) -> Self {
        Self::new(bytes)
    }
}

impl fmt::Debug for Edit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Edit").field(&self.text_lossy()).finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
