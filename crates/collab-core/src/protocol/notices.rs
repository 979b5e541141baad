//! Fixed human-readable notices the server sends outside the edit stream.

/// Sent to a connection refused because the client registry is full,
/// immediately before the server closes it.
pub const REJECTION_NOTICE: &[u8] = b"Server is full. Please try again later.";

/// Sent to the originator of an edit that could not be made durable.
///
/// The edit is not part of the document and was not forwarded to anyone;
/// the connection stays open.
pub const PERSIST_FAILURE_NOTICE: &[u8] = b"Edit could not be saved. Please try again.";
