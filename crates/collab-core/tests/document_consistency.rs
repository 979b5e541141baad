//! Integration tests for the document model and edit framing together.
//!
//! These tests drive bytes through an [`EditDecoder`] into a [`Document`] the
//! same way a connection handler does, and check the properties a joining
//! client relies on: the snapshot is exactly the accepted edits, in
//! acceptance order, each followed by a newline.

use collab_core::{encode_for_peers, ConnectionPhase, Document, Edit, EditDecoder, Framing};

/// Feeds `reads` through a decoder and applies every edit to `doc`.
fn ingest(doc: &mut Document, framing: Framing, reads: &[&[u8]]) -> Vec<u64> {
    let mut decoder = EditDecoder::new(framing, 1024);
    let mut sequences = Vec::new();
    for read in reads {
        for edit in decoder.decode(read).expect("decode must succeed") {
            if let Some(seq) = doc.apply(&edit) {
                sequences.push(seq);
            }
        }
    }
    if let Some(edit) = decoder.finish() {
        sequences.extend(doc.apply(&edit));
    }
    sequences
}

#[test]
fn test_join_snapshot_equals_accepted_edits_in_order_chunk_mode() {
    let mut doc = Document::new();
    let seqs = ingest(&mut doc, Framing::Chunk, &[b"hello", b"world"]);

    let snap = doc.snapshot();
    assert_eq!(seqs, vec![1, 2]);
    assert_eq!(snap.content, b"hello\nworld\n");
    assert_eq!(snap.sequence, 2);
}

#[test]
fn test_join_snapshot_equals_accepted_edits_in_order_line_mode() {
    let mut doc = Document::new();
    // Reads deliberately straddle line boundaries; one blank line is a no-op.
    let seqs = ingest(
        &mut doc,
        Framing::Line,
        &[b"hel", b"lo\n\nwor", b"ld\r\n", b"tail"],
    );

    assert_eq!(seqs, vec![1, 2, 3]);
    assert_eq!(doc.content(), b"hello\nworld\ntail\n");
}

#[test]
fn test_reload_from_persisted_content_continues_the_document() {
    // First "process": accept E1, E2.
    let mut first = Document::new();
    ingest(&mut first, Framing::Chunk, &[b"E1", b"E2"]);
    let persisted = first.content().to_vec();

    // Second "process": reload the log bytes and accept E3.
    let mut second = Document::from_persisted(persisted);
    ingest(&mut second, Framing::Chunk, &[b"E3"]);

    assert_eq!(second.content(), b"E1\nE2\nE3\n");
}

#[test]
fn test_forwarded_bytes_differ_from_stored_record_only_by_framing() {
    let edit = Edit::from("world");
    assert_eq!(&*encode_for_peers(Framing::Chunk, &edit), b"world");
    assert_eq!(
        &*encode_for_peers(Framing::Line, &edit),
        &Document::record_for(&edit)[..]
    );
}

#[test]
fn test_connection_phase_full_lifecycle() {
    let mut phase = ConnectionPhase::Admitted;
    phase.transition(ConnectionPhase::Onboarding).unwrap();
    phase.transition(ConnectionPhase::Active).unwrap();
    phase.transition(ConnectionPhase::Closing).unwrap();
    phase.transition(ConnectionPhase::Closed).unwrap();
    assert_eq!(phase, ConnectionPhase::Closed);
}
