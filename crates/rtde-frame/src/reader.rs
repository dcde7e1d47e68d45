use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::time::Instant;

use rtde_transport::ReadTimeout;

use crate::codec::Frame;
use crate::error::{FrameError, Result};
use crate::reassembler::StreamReassembler;

const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames.
/// Frames that arrive together in one read are queued and handed out one at a
/// time.
pub struct FrameReader<T> {
    inner: T,
    reassembler: StreamReassembler,
    pending: VecDeque<Frame>,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            reassembler: StreamReassembler::new(),
            pending: VecDeque::new(),
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached. A read
    /// timeout surfaces as `FrameError::Io` with `WouldBlock` or `TimedOut`;
    /// see [`FrameError::is_timeout`].
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(frame);
            }
            self.fill()?;
        }
    }

    /// Complete frames already received but not yet returned.
    pub fn pending(&self) -> impl Iterator<Item = &Frame> {
        self.pending.iter()
    }

    /// Bytes of a partially received frame.
    pub fn buffered_bytes(&self) -> usize {
        self.reassembler.buffered()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// One read from the stream; complete frames go to the pending queue.
    fn fill(&mut self) -> Result<()> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let read = match self.inner.read(&mut chunk) {
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => return Ok(()),
            Err(err) => return Err(FrameError::Io(err)),
        };

        if read == 0 {
            return Err(FrameError::ConnectionClosed);
        }

        self.reassembler.feed(&chunk[..read]);
        self.pending.extend(self.reassembler.drain_frames());
        Ok(())
    }
}

impl<T: Read + ReadTimeout> FrameReader<T> {
    /// Read the next complete frame, giving up at `deadline`.
    ///
    /// Queued frames are returned even when the deadline has passed. Each
    /// blocking read is bounded by the time left, so the call returns within
    /// the deadline plus one socket wake-up. Giving up is reported as
    /// `FrameError::Io` with `TimedOut`.
    pub fn read_frame_until(&mut self, deadline: Instant) -> Result<Frame> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(frame);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(FrameError::Io(ErrorKind::TimedOut.into()));
            }
            self.inner
                .apply_read_timeout(remaining)
                .map_err(FrameError::Io)?;

            match self.fill() {
                Ok(()) => {}
                Err(err) if err.is_timeout() => {}
                Err(err) => return Err(err),
            }
        }
    }
}
