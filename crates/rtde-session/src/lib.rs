//! Controller sessions.
//!
//! This is the "just works" layer. Connect to a controller, negotiate the
//! protocol version, set up output and input recipes, then exchange typed
//! records while synchronization is started.

pub mod config;
pub mod connector;
pub mod error;
pub mod handshake;
pub mod message;
pub mod session;

pub use config::{SessionConfig, DEFAULT_FREQUENCY, PROTOCOL_VERSION};
pub use connector::{connect, connect_with_config};
pub use error::{Result, SessionError};
pub use handshake::negotiate_protocol;
pub use message::{
    decode, ControllerVersion, DecodedMessage, RecipeAck, Severity, TextMessage,
};
pub use session::{Session, SessionState};
