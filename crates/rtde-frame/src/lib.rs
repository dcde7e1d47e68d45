//! Length-prefixed, command-tagged framing for the RTDE wire protocol.
//!
//! Every message is framed with a 3-byte header:
//! - A 2-byte big-endian total length (header included)
//! - A 1-byte command id
//!
//! TCP has no message boundaries, so incoming bytes go through a
//! [`StreamReassembler`] that yields complete frames and keeps any partial
//! tail for the next read. No partial reads leak into user code.

pub mod codec;
pub mod command;
pub mod error;
pub mod reader;
pub mod reassembler;
pub mod writer;

pub use codec::{
    decode_frame, encode, encode_frame, try_decode, Frame, HEADER_SIZE,
    MAX_FRAME_SIZE, MAX_PAYLOAD,
};
pub use command::{command_name, Command};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use reassembler::StreamReassembler;
pub use writer::FrameWriter;
