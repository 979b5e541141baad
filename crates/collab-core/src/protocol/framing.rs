//! Edit framing over a raw byte stream.
//!
//! # The framing problem
//!
//! TCP is a *stream* protocol: a single `read()` may return part of what the
//! peer wrote, or several writes glued together.  The service has no message
//! header, so something has to decide where one edit ends.  Two modes exist:
//!
//! - [`Framing::Chunk`] (default) – every non-empty read is one edit.  This
//!   is the historical behaviour of the service and is kept for wire
//!   compatibility with existing clients.  It is a known limitation: an
//!   edit split across two reads becomes two edits, and two edits coalesced
//!   into one read become one.
//!
//! - [`Framing::Line`] – edits are `\n`-terminated lines.  Bytes are
//!   buffered until a newline arrives, so read boundaries no longer matter.
//!   A trailing `\r` is stripped.  Peers receive `line + "\n"` so they can
//!   frame the forwarded stream the same way.
//!
//! ```text
//! reads:           "hel"  "lo\nwor"  "ld\n"
//! Chunk edits:     "hel"  "lo\nwor"  "ld\n"
//! Line edits:             "hello"    "world"
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::edit::Edit;

/// Errors produced while framing edits.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// A line-framed edit grew past the configured maximum without a newline.
    #[error("edit of {len} bytes exceeds the {max}-byte limit")]
    EditTooLong { len: usize, max: usize },

    /// The framing name is not recognised.
    #[error("unknown framing mode '{0}' (expected 'chunk' or 'line')")]
    UnknownFraming(String),
}

/// How a byte stream is split into edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// One socket read equals one edit.
    #[default]
    Chunk,
    /// One `\n`-terminated line equals one edit.
    Line,
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framing::Chunk => f.write_str("chunk"),
            Framing::Line => f.write_str("line"),
        }
    }
}

impl FromStr for Framing {
    type Err = FramingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chunk" => Ok(Framing::Chunk),
            "line" => Ok(Framing::Line),
            other => Err(FramingError::UnknownFraming(other.to_string())),
        }
    }
}

/// Incremental decoder turning socket reads into edits.
///
/// One decoder is owned by each connection handler.  Feed it every chunk
/// returned by `read()` and commit the edits it yields, in order.
#[derive(Debug)]
pub struct EditDecoder {
    framing: Framing,
    max_edit_len: usize,
    pending: Vec<u8>,
}

impl EditDecoder {
    /// Creates a decoder.  `max_edit_len` only applies to [`Framing::Line`];
    /// in chunk mode the read buffer size already bounds an edit.
    pub fn new(framing: Framing, max_edit_len: usize) -> Self {
        Self {
            framing,
            max_edit_len,
            pending: Vec::new(),
        }
    }

    /// Number of buffered bytes not yet forming a complete edit.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Consumes one read's worth of bytes and returns the completed edits.
    ///
    /// Empty lines are yielded as empty edits; deciding that they are no-ops
    /// is the document's job, not the decoder's.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::EditTooLong`] in line mode when a line, or the
    /// unterminated remainder, is longer than `max_edit_len`.  Edits completed
    /// earlier in the same read are discarded; use
    /// [`decode_into`](Self::decode_into) to keep them.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<Vec<Edit>, FramingError> {
        let mut edits = Vec::new();
        self.decode_into(bytes, &mut edits)?;
        Ok(edits)
    }

    /// Like [`decode`](Self::decode), but appends completed edits to `out`.
    ///
    /// Every edit completed before an oversized line is pushed to `out`
    /// before the error is returned.
    pub fn decode_into(&mut self, bytes: &[u8], out: &mut Vec<Edit>) -> Result<(), FramingError> {
        match self.framing {
            Framing::Chunk => {
                if !bytes.is_empty() {
                    out.push(Edit::from(bytes));
                }
                Ok(())
            }
            Framing::Line => self.decode_lines(bytes, out),
        }
    }

    fn decode_lines(&mut self, bytes: &[u8], out: &mut Vec<Edit>) -> Result<(), FramingError> {
        self.pending.extend_from_slice(bytes);

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            strip_carriage_return(&mut line);
            if line.len() > self.max_edit_len {
                return Err(FramingError::EditTooLong {
                    len: line.len(),
                    max: self.max_edit_len,
                });
            }
            out.push(Edit::from(line));
        }

        if self.pending.len() > self.max_edit_len {
            return Err(FramingError::EditTooLong {
                len: self.pending.len(),
                max: self.max_edit_len,
            });
        }
        Ok(())
    }

    /// Flushes an unterminated trailing line when the peer closes the stream.
    ///
    /// Always `None` in chunk mode, and `None` when nothing is buffered.
    pub fn finish(&mut self) -> Option<Edit> {
        if self.framing != Framing::Line || self.pending.is_empty() {
            return None;
        }
        let mut line = std::mem::take(&mut self.pending);
        strip_carriage_return(&mut line);
        Some(Edit::from(line))
    }
}

fn strip_carriage_return(line: &mut Vec<u8>) {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
}

/// Encodes an accepted edit the way it is forwarded to other clients.
///
/// Chunk mode shares the edit's own bytes without copying.  Line mode
/// re-adds the terminating newline the decoder stripped.
pub fn encode_for_peers(framing: Framing, edit: &Edit) -> Arc<[u8]> {
    match framing {
        Framing::Chunk => edit.shared_bytes(),
        Framing::Line => {
            let mut out = Vec::with_capacity(edit.len() + 1);
            out.extend_from_slice(edit.as_bytes());
            out.push(b'\n');
            out.into()
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(edits: &[Edit]) -> Vec<String> {
        edits.iter().map(|e| e.text_lossy().into_owned()).collect()
    }

    #[test]
    fn test_chunk_mode_yields_whole_read_as_one_edit() {
        let mut dec = EditDecoder::new(Framing::Chunk, 1024);
        let edits = dec.decode(b"hello\nworld").unwrap();
        assert_eq!(texts(&edits), vec!["hello\nworld"]);
    }

    #[test]
    fn test_chunk_mode_ignores_empty_read() {
        let mut dec = EditDecoder::new(Framing::Chunk, 1024);
        assert!(dec.decode(b"").unwrap().is_empty());
    }

    #[test]
    fn test_line_mode_buffers_partial_lines_across_reads() {
        let mut dec = EditDecoder::new(Framing::Line, 1024);
        assert!(dec.decode(b"hel").unwrap().is_empty());
        assert_eq!(dec.pending_len(), 3);

        let edits = dec.decode(b"lo\nwor").unwrap();
        assert_eq!(texts(&edits), vec!["hello"]);

        let edits = dec.decode(b"ld\n").unwrap();
        assert_eq!(texts(&edits), vec!["world"]);
        assert_eq!(dec.pending_len(), 0);
    }

    #[test]
    fn test_line_mode_splits_coalesced_lines() {
        let mut dec = EditDecoder::new(Framing::Line, 1024);
        let edits = dec.decode(b"a\nb\nc\n").unwrap();
        assert_eq!(texts(&edits), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_line_mode_strips_carriage_return() {
        let mut dec = EditDecoder::new(Framing::Line, 1024);
        let edits = dec.decode(b"dos line\r\n").unwrap();
        assert_eq!(texts(&edits), vec!["dos line"]);
    }

    #[test]
    fn test_line_mode_yields_empty_line_as_empty_edit() {
        let mut dec = EditDecoder::new(Framing::Line, 1024);
        let edits = dec.decode(b"\n").unwrap();
        assert_eq!(edits.len(), 1);
        assert!(edits[0].is_empty());
    }

    #[test]
    fn test_line_mode_rejects_overlong_unterminated_line() {
        let mut dec = EditDecoder::new(Framing::Line, 4);
        let err = dec.decode(b"too long").unwrap_err();
        assert_eq!(err, FramingError::EditTooLong { len: 8, max: 4 });
    }

    #[test]
    fn test_line_mode_rejects_overlong_terminated_line() {
        let mut dec = EditDecoder::new(Framing::Line, 4);
        let err = dec.decode(b"12345\n").unwrap_err();
        assert_eq!(err, FramingError::EditTooLong { len: 5, max: 4 });
    }

    #[test]
    fn test_decode_into_keeps_lines_completed_before_overlong_tail() {
        // Arrange
        let mut dec = EditDecoder::new(Framing::Line, 4);
        let mut edits = Vec::new();

        // Act
        let result = dec.decode_into(b"ok\ntoolong", &mut edits);

        // Assert
        assert_eq!(result, Err(FramingError::EditTooLong { len: 7, max: 4 }));
        assert_eq!(texts(&edits), vec!["ok"]);
    }

    #[test]
    fn test_decode_into_keeps_lines_before_overlong_terminated_line() {
        let mut dec = EditDecoder::new(Framing::Line, 4);
        let mut edits = Vec::new();

        let result = dec.decode_into(b"a\nbb\n12345\nc\n", &mut edits);

        assert!(result.is_err());
        assert_eq!(texts(&edits), vec!["a", "bb"]);
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut dec = EditDecoder::new(Framing::Line, 1024);
        dec.decode(b"tail").unwrap();
        assert_eq!(dec.finish(), Some(Edit::from("tail")));
        assert_eq!(dec.finish(), None, "finish must drain the buffer");
    }

    #[test]
    fn test_finish_is_none_in_chunk_mode() {
        let mut dec = EditDecoder::new(Framing::Chunk, 1024);
        dec.decode(b"tail").unwrap();
        assert_eq!(dec.finish(), None);
    }

    #[test]
    fn test_encode_for_peers_chunk_is_verbatim() {
        let edit = Edit::from("world");
        let encoded = encode_for_peers(Framing::Chunk, &edit);
        assert_eq!(&*encoded, b"world");
        assert!(Arc::ptr_eq(&encoded, &edit.shared_bytes()), "chunk mode must not copy");
    }

    #[test]
    fn test_encode_for_peers_line_appends_newline() {
        let edit = Edit::from("world");
        assert_eq!(&*encode_for_peers(Framing::Line, &edit), b"world\n");
    }

    #[test]
    fn test_framing_parses_case_insensitively() {
        assert_eq!("LINE".parse::<Framing>(), Ok(Framing::Line));
        assert_eq!(" chunk ".parse::<Framing>(), Ok(Framing::Chunk));
        assert!(matches!(
            "bytes".parse::<Framing>(),
            Err(FramingError::UnknownFraming(_))
        ));
    }

    #[test]
    fn test_framing_default_is_chunk() {
        assert_eq!(Framing::default(), Framing::Chunk);
        assert_eq!(Framing::default().to_string(), "chunk");
    }
}
