//! Frame extraction from the raw CoT byte stream.
//!
//! Documents are delimited only by their own tags, so the receive buffer is
//! scanned for the next complete `<event ...>...</event>` span (or the
//! self-closing `<event .../>` form). The scan runs on bytes, not text: a
//! read may split the stream inside a multi-byte UTF-8 sequence, and the
//! fragment has to survive in the buffer until the rest arrives.
//!
//! The protocol guarantees the root element never nests inside itself, so
//! the first `</event>` after an opening tag always closes it. That
//! guarantee is load-bearing: the scan does not track element depth.

use bytes::{Buf, Bytes, BytesMut};
use tracing::trace;

const EVENT_OPEN: &[u8] = b"<event";
const EVENT_CLOSE: &[u8] = b"</event>";

/// Receive buffer with document extraction.
///
/// Bytes are appended as the transport delivers them; [`next_document`]
/// drains complete documents and retains at most one partial fragment.
/// Anything preceding the first opening tag is protocol noise (e.g. the
/// tail of a document truncated by a prior disconnect) and is silently
/// dropped. The buffer is unbounded: an opening tag whose close never
/// arrives is held indefinitely, and timing out such a connection is the
/// caller's policy, not this type's.
///
/// [`next_document`]: FrameBuffer::next_document
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: BytesMut,
}

impl FrameBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(8 * 1024),
        }
    }

    /// Append a chunk delivered by the transport.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Extract the next complete document, if the buffer holds one.
    ///
    /// Call repeatedly until `None`: one transport read may deliver several
    /// documents, and the buffer never leaves a complete document
    /// unconsumed. Leading noise is discarded on every call, complete
    /// document or not, so the buffer always starts at an opening tag (or a
    /// prefix of one).
    pub fn next_document(&mut self) -> Option<Bytes> {
        self.discard_noise();

        let end = find_document_end(&self.buf)?;
        Some(self.buf.split_to(end).freeze())
    }

    /// Drop bytes preceding the first opening tag.
    ///
    /// When no opening tag is present, everything is noise except a buffer
    /// suffix that could still grow into `<event` — that prefix of a future
    /// tag is retained.
    fn discard_noise(&mut self) {
        let noise = match find(&self.buf, EVENT_OPEN, 0) {
            Some(open) => open,
            None => self.buf.len() - partial_open_suffix(&self.buf),
        };
        if noise > 0 {
            trace!(bytes = noise, "dropping stream noise before document");
            self.buf.advance(noise);
        }
    }

    /// Bytes currently buffered (the partial fragment, between arrivals).
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Discard all buffered bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

/// End offset of the document opening at the start of `buf`, or `None` when
/// that document is still incomplete.
///
/// The buffer is expected to start with `<event` (noise already dropped).
/// The opening tag's own end decides the form: `/>` closes a self-closing
/// document on the spot, `>` opens a paired document that runs through the
/// first `</event>`.
fn find_document_end(buf: &[u8]) -> Option<usize> {
    if !buf.starts_with(EVENT_OPEN) {
        return None;
    }

    let tag_end = find_byte(buf, b'>', EVENT_OPEN.len())?;
    if buf[tag_end - 1] == b'/' {
        return Some(tag_end + 1);
    }

    find(buf, EVENT_CLOSE, tag_end).map(|close| close + EVENT_CLOSE.len())
}

/// Length of the longest buffer suffix that is a proper prefix of `<event`.
fn partial_open_suffix(buf: &[u8]) -> usize {
    let max = (EVENT_OPEN.len() - 1).min(buf.len());
    (1..=max)
        .rev()
        .find(|&len| buf[buf.len() - len..] == EVENT_OPEN[..len])
        .unwrap_or(0)
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if haystack.len() < from + needle.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| from + pos)
}

fn find_byte(haystack: &[u8], byte: u8, from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .iter()
        .position(|&b| b == byte)
        .map(|pos| from + pos)
}
