//! TCP transport for the RTDE client.
//!
//! This is the lowest layer of the workspace: it resolves the controller
//! address, opens a TCP connection bounded by a connect timeout and hands out
//! an [`RtdeStream`] with read/write timeouts applied. Everything else builds
//! on top of that stream.

pub mod error;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use tcp::{connect, TransportConfig, DEFAULT_PORT};
pub use traits::{ReadTimeout, RtdeStream, ShutdownHandle};
