use std::time::Duration;

use rtde_frame::{Command, FrameError};
use rtde_recipe::{FieldType, RecipeError};

use crate::session::SessionState;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The TCP connection could not be established.
    #[error("connection failed: {0}")]
    ConnectFailed(#[from] rtde_transport::TransportError),

    /// The controller did not accept the requested protocol version.
    #[error("protocol negotiation failed: {0}")]
    NegotiationFailed(String),

    /// The controller reported different field types than expected.
    #[error(
        "recipe type mismatch: expected [{}], controller reported [{}]",
        join_types(.expected),
        join_types(.actual)
    )]
    RecipeTypeMismatch {
        expected: Vec<FieldType>,
        actual: Vec<FieldType>,
    },

    /// No recipe with this id is registered on the session.
    #[error("unknown recipe id {0}")]
    UnknownRecipe(u8),

    /// Data can only be exchanged while synchronization is started.
    #[error("synchronization is not started")]
    NotStarted,

    /// The session has no open connection.
    #[error("not connected")]
    NotConnected,

    /// The operation is not valid in the current state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// The controller answered a request with `success = false`.
    #[error("controller rejected {0}")]
    Rejected(Command),

    /// Data was requested before an output recipe was set up.
    #[error("no output recipe configured")]
    NoOutputConfigured,

    /// A frame carried a command byte that is not part of the protocol.
    #[error("unknown command 0x{0:02x}")]
    UnknownCommand(u8),

    /// The controller does not know one or more requested fields.
    #[error("controller does not know field(s): {0}")]
    UnknownField(String),

    /// Input fields are already claimed by another client.
    #[error("input field(s) in use by another client: {0}")]
    FieldInUse(String),

    /// A payload does not have the layout its command requires.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// No reply arrived in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The controller closed the connection.
    #[error("connection closed by controller")]
    PeerClosed,

    /// Recipe-level error.
    #[error("recipe error: {0}")]
    Recipe(#[from] RecipeError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

impl SessionError {
    /// True for failures of the connection itself. The session disconnects
    /// when one of these occurs.
    pub fn is_transport_failure(&self) -> bool {
        match self {
            SessionError::ConnectFailed(_) | SessionError::Timeout(_) | SessionError::PeerClosed => {
                true
            }
            SessionError::Frame(err) => {
                matches!(err, FrameError::Io(_) | FrameError::ConnectionClosed)
            }
            _ => false,
        }
    }

    pub(crate) fn from_unpack(err: RecipeError) -> Self {
        match err {
            RecipeError::MalformedPayload(msg) => SessionError::MalformedPayload(msg),
            other => SessionError::Recipe(other),
        }
    }
}

fn join_types(types: &[FieldType]) -> String {
    types
        .iter()
        .map(|ty| ty.name())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, SessionError>;
