use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::command::{command_name, Command};
use crate::error::{FrameError, Result};

/// Frame header: total length (2) + command (1) = 3 bytes.
pub const HEADER_SIZE: usize = 3;

/// Largest total frame size the 16-bit length field can describe.
pub const MAX_FRAME_SIZE: usize = u16::MAX as usize;

/// Largest payload that fits in a frame.
pub const MAX_PAYLOAD: usize = MAX_FRAME_SIZE - HEADER_SIZE;

/// A framed message tagged with its command byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The raw command byte.
    pub command: u8,
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(command: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            command,
            payload: payload.into(),
        }
    }

    /// The command, if the byte is a known one.
    pub fn kind(&self) -> Option<Command> {
        Command::from_u8(self.command)
    }

    /// Human-readable command name.
    pub fn command_name(&self) -> &'static str {
        command_name(self.command)
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────────┬─────────────┬──────────────────────────┐
/// │ Length (2B BE) │ Command(1B) │ Payload (Length-3 bytes) │
/// └────────────────┴─────────────┴──────────────────────────┘
/// ```
pub fn encode_frame(command: u8, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    let total = HEADER_SIZE + payload.len();
    dst.reserve(total);
    dst.put_u16(total as u16);
    dst.put_u8(command);
    dst.put_slice(payload);
    Ok(())
}

/// Encode a frame into a freshly allocated buffer.
pub fn encode(command: u8, payload: &[u8]) -> Result<Bytes> {
    let mut dst = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    encode_frame(command, payload, &mut dst)?;
    Ok(dst.freeze())
}

/// Try to decode one frame from the front of `buf`.
///
/// Returns `(command, payload, consumed)` when a complete frame is present,
/// `None` otherwise. A declared length shorter than the header never
/// completes.
pub fn try_decode(buf: &[u8]) -> Option<(u8, &[u8], usize)> {
    if buf.len() < HEADER_SIZE {
        return None;
    }

    let total = u16::from_be_bytes([buf[0], buf[1]]) as usize;
    if total < HEADER_SIZE || buf.len() < total {
        return None;
    }

    Some((buf[2], &buf[HEADER_SIZE..total], total))
}

/// Decode a frame from a buffer.
///
/// Returns `None` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut) -> Option<Frame> {
    let (command, _, consumed) = try_decode(&src[..])?;

    src.advance(HEADER_SIZE);
    let payload = src.split_to(consumed - HEADER_SIZE).freeze();

    Some(Frame { command, payload })
}
