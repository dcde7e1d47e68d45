use std::fmt;
use std::io;

use rtde_frame::FrameError;
use rtde_recipe::RecipeError;
use rtde_session::SessionError;
use rtde_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Io(source) => io_error(context, source),
        TransportError::Connect { ref source, .. } => {
            let code = io_error(context, io::Error::from(source.kind())).code;
            CliError::new(code, format!("{context}: {err}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
    }
}

pub fn recipe_error(context: &str, err: RecipeError) -> CliError {
    match err {
        RecipeError::MissingRecipe(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::ConnectFailed(err) => transport_error(context, err),
        SessionError::Frame(err) => frame_error(context, err),
        SessionError::Recipe(err) => recipe_error(context, err),
        SessionError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        SessionError::NegotiationFailed(_) | SessionError::PeerClosed => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {err}"))
        }
        SessionError::RecipeTypeMismatch { .. }
        | SessionError::UnknownField(_)
        | SessionError::FieldInUse(_)
        | SessionError::UnknownCommand(_)
        | SessionError::MalformedPayload(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(FAILURE, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn refused_connection_is_a_transport_error() {
        let err = SessionError::ConnectFailed(TransportError::Connect {
            addr: "127.0.0.1:30004".to_string(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        });
        let cli = session_error("connect failed", err);
        assert_eq!(cli.code, TRANSPORT_ERROR);
        assert!(cli.message.starts_with("connect failed: "));
    }

    #[test]
    fn session_errors_map_to_exit_codes() {
        let cases = [
            (SessionError::Timeout(Duration::from_secs(1)), TIMEOUT),
            (SessionError::PeerClosed, TRANSPORT_ERROR),
            (SessionError::UnknownField("nope".to_string()), DATA_INVALID),
            (SessionError::NotStarted, FAILURE),
            (
                SessionError::Frame(FrameError::Io(io::Error::from(io::ErrorKind::WouldBlock))),
                TIMEOUT,
            ),
            (
                SessionError::Recipe(RecipeError::MissingRecipe("out".to_string())),
                USAGE,
            ),
        ];
        for (err, code) in cases {
            assert_eq!(session_error("ctx", err).code, code);
        }
    }
}
