use crate::config::SessionConfig;
use crate::error::Result;
use crate::session::Session;

/// Connect to a controller with default configuration.
pub fn connect(host: &str, port: u16) -> Result<Session> {
    connect_with_config(host, port, SessionConfig::default())
}

/// Connect with explicit configuration.
pub fn connect_with_config(host: &str, port: u16, config: SessionConfig) -> Result<Session> {
    let mut session = Session::new(config);
    session.connect(host, port)?;
    Ok(session)
}
