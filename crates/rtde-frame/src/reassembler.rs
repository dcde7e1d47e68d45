//! Receive-side buffer for a byte stream without message boundaries.
//!
//! One socket read may contain zero, one or many frames, and a frame may span
//! several reads. [`StreamReassembler`] accumulates raw bytes and hands out
//! every complete frame, keeping only the partial tail buffered.

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{decode_frame, Frame};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Accumulates raw bytes and yields complete frames.
///
/// After [`drain_frames`](Self::drain_frames) the buffer never holds a
/// complete frame: it is either empty or holds the start of the next one.
#[derive(Debug)]
pub struct StreamReassembler {
    buf: BytesMut,
}

impl StreamReassembler {
    /// Create an empty reassembler.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Append newly read bytes.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Remove and return every complete frame at the front of the buffer.
    pub fn drain_frames(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = decode_frame(&mut self.buf) {
            frames.push(frame);
        }
        if !frames.is_empty() {
            trace!(
                frames = frames.len(),
                remaining = self.buf.len(),
                "drained frames"
            );
        }
        frames
    }

    /// Number of buffered bytes belonging to a not yet complete frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// True when no partial frame is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Discard any buffered bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl Default for StreamReassembler {
    fn default() -> Self {
        Self::new()
    }
}
