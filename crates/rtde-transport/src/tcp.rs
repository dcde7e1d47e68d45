use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::RtdeStream;

/// Port the controller listens on for RTDE sessions.
pub const DEFAULT_PORT: u16 = 30004;

/// Socket options applied when connecting.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Upper bound for establishing the TCP connection, per resolved address.
    pub connect_timeout: Duration,
    /// Read timeout applied to the connected stream.
    pub read_timeout: Option<Duration>,
    /// Write timeout applied to the connected stream.
    pub write_timeout: Option<Duration>,
    /// Disable Nagle's algorithm. Frames are small and latency sensitive.
    pub nodelay: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(1),
            read_timeout: Some(Duration::from_secs(1)),
            write_timeout: Some(Duration::from_secs(1)),
            nodelay: true,
        }
    }
}

/// Connect to a controller (blocking, bounded by `config.connect_timeout`).
///
/// Every address `host` resolves to is tried in order; the error of the last
/// attempt is returned when none succeeds.
pub fn connect(host: &str, port: u16, config: &TransportConfig) -> Result<RtdeStream> {
    let addrs = resolve(host, port)?;

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(&addr, config.connect_timeout) {
            Ok(stream) => {
                stream.set_nodelay(config.nodelay)?;
                stream.set_read_timeout(config.read_timeout)?;
                stream.set_write_timeout(config.write_timeout)?;
                info!(%addr, "connected to controller");
                return Ok(RtdeStream::from_tcp(stream));
            }
            Err(err) => {
                debug!(%addr, error = %err, "connect attempt failed");
                last_err = Some(TransportError::Connect {
                    addr: addr.to_string(),
                    source: err,
                });
            }
        }
    }

    Err(last_err.unwrap_or_else(|| TransportError::Resolve {
        host: host.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved"),
    }))
}

fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| TransportError::Resolve {
            host: host.to_string(),
            source: e,
        })?;
    Ok(addrs.collect())
}
