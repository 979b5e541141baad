//! The authoritative document.
//!
//! A document is an append-only byte log.  Every accepted edit is stored as
//! one *record*: the edit bytes followed by a newline.  The persistent log on
//! disk is the concatenation of the same records, which is what makes the
//! invariant "memory equals log" hold by construction: both sides append the
//! output of [`Document::record_for`] and nothing else.
//!
//! ```text
//! accepted:  "hello"        "world"
//! records:   "hello\n"      "world\n"
//! content:   "hello\nworld\n"
//! ```
//!
//! Each accepted edit is also assigned a sequence number (starting at 1 for
//! the first edit accepted by this process).  Sequence numbers are how the
//! server keeps broadcast order equal to apply order, and how a joining
//! client tells apart edits already contained in its snapshot from edits it
//! still has to receive.

use crate::domain::edit::Edit;

/// Separator written after every accepted edit.
pub const RECORD_SEPARATOR: u8 = b'\n';

/// A consistent point-in-time copy of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSnapshot {
    /// Full document content at the time of the snapshot.
    pub content: Vec<u8>,
    /// Sequence number of the last edit included in `content`.
    ///
    /// `0` means no edit has been accepted by this process yet (the content
    /// may still be non-empty if it was reloaded from the persistent log).
    pub sequence: u64,
}

/// In-memory authoritative copy of the shared document.
///
/// `Document` is a plain value type.  Mutual exclusion is the owner's job:
/// the server wraps it in a lock together with the persistent log.
#[derive(Debug, Default, Clone)]
pub struct Document {
    content: Vec<u8>,
    last_sequence: u64,
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the document from the raw bytes of the persistent log.
    ///
    /// The log *is* the concatenation of records, so the content is taken
    /// verbatim.  Sequence numbering restarts at 1 for the new process.
    pub fn from_persisted(content: Vec<u8>) -> Self {
        Self {
            content,
            last_sequence: 0,
        }
    }

    /// Builds the record that represents `edit` in the document and the log.
    pub fn record_for(edit: &Edit) -> Vec<u8> {
        let mut record = Vec::with_capacity(edit.len() + 1);
        record.extend_from_slice(edit.as_bytes());
        record.push(RECORD_SEPARATOR);
        record
    }

    /// Appends `edit` and returns the sequence number it was accepted under.
    ///
    /// Returns `None` for an empty edit: there is no meaningful empty edit,
    /// so it is neither stored nor numbered.
    pub fn apply(&mut self, edit: &Edit) -> Option<u64> {
        if edit.is_empty() {
            return None;
        }
        self.content.extend_from_slice(edit.as_bytes());
        self.content.push(RECORD_SEPARATOR);
        self.last_sequence += 1;
        Some(self.last_sequence)
    }

    /// Returns a full copy of the current content with its sequence number.
    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            content: self.content.clone(),
            sequence: self.last_sequence,
        }
    }

    /// Borrowed view of the current content.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Sequence number of the most recently applied edit.
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// Content length in bytes.
    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
