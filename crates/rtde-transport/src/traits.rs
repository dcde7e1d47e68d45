use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use tracing::debug;

use crate::error::Result;

/// A connected controller stream. Implements `Read` and `Write`.
///
/// This is the fundamental I/O type returned by [`crate::connect`]. It wraps a
/// TCP stream whose timeouts have already been applied.
pub struct RtdeStream {
    inner: TcpStream,
}

impl Read for RtdeStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for RtdeStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl RtdeStream {
    /// Wrap an already connected TCP stream.
    pub fn from_tcp(stream: TcpStream) -> Self {
        Self { inner: stream }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self::from_tcp(cloned))
    }

    /// Address of the connected controller.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.inner.peer_addr().map_err(Into::into)
    }

    /// Close both halves of the connection.
    ///
    /// A stream that is already disconnected is not an error.
    pub fn shutdown(&self) -> Result<()> {
        shutdown_both(&self.inner)
    }

    /// Handle that can close this connection from another thread.
    pub fn shutdown_handle(&self) -> Result<ShutdownHandle> {
        Ok(ShutdownHandle {
            inner: self.inner.try_clone()?,
        })
    }
}

impl std::fmt::Debug for RtdeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("RtdeStream");
        dbg.field("type", &"tcp");
        if let Ok(addr) = self.peer_addr() {
            dbg.field("peer", &addr);
        }
        dbg.finish()
    }
}

/// A readable stream whose read timeout can change between reads.
///
/// Frame readers use this to bound every blocking read by the time left
/// before a deadline. In-memory readers have nothing to bound and accept any
/// timeout.
pub trait ReadTimeout {
    /// Make the next reads give up after `timeout`. `timeout` is never zero.
    fn apply_read_timeout(&mut self, timeout: Duration) -> std::io::Result<()>;
}

impl ReadTimeout for TcpStream {
    fn apply_read_timeout(&mut self, timeout: Duration) -> std::io::Result<()> {
        self.set_read_timeout(Some(timeout))
    }
}

impl ReadTimeout for RtdeStream {
    fn apply_read_timeout(&mut self, timeout: Duration) -> std::io::Result<()> {
        self.inner.set_read_timeout(Some(timeout))
    }
}

impl<T> ReadTimeout for std::io::Cursor<T> {
    fn apply_read_timeout(&mut self, _timeout: Duration) -> std::io::Result<()> {
        Ok(())
    }
}

impl ReadTimeout for &[u8] {
    fn apply_read_timeout(&mut self, _timeout: Duration) -> std::io::Result<()> {
        Ok(())
    }
}

/// Closes a connection owned by another thread.
///
/// A thread blocked reading the stream observes end-of-stream (or an error)
/// once [`ShutdownHandle::shutdown`] has been called.
#[derive(Debug)]
pub struct ShutdownHandle {
    inner: TcpStream,
}

impl ShutdownHandle {
    /// Close both halves of the connection.
    pub fn shutdown(&self) -> Result<()> {
        debug!("closing stream from shutdown handle");
        shutdown_both(&self.inner)
    }
}

fn shutdown_both(stream: &TcpStream) -> Result<()> {
    match stream.shutdown(Shutdown::Both) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotConnected => Ok(()),
        Err(err) => Err(err.into()),
    }
}
