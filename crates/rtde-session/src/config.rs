use std::time::Duration;

use rtde_transport::TransportConfig;

/// Protocol version requested during negotiation.
pub const PROTOCOL_VERSION: u16 = 2;

/// Output frequency used when the caller does not pick one, in Hz.
pub const DEFAULT_FREQUENCY: f64 = 125.0;

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Socket options and the connect timeout.
    pub transport: TransportConfig,
    /// Upper bound for each request/response exchange and each `receive`.
    pub timeout: Duration,
    /// Protocol version requested from the controller.
    pub protocol_version: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            timeout: Duration::from_secs(1),
            protocol_version: PROTOCOL_VERSION,
        }
    }
}

impl SessionConfig {
    /// Use `timeout` for connecting, socket reads and writes, and replies.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.transport.connect_timeout = timeout;
        self.transport.read_timeout = Some(timeout);
        self.transport.write_timeout = Some(timeout);
        self
    }
}
