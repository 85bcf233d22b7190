use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use crate::error::Result;

/// A connected duplex byte stream that can be split and closed.
///
/// Codecs read from one handle on a dedicated thread while writers use
/// another, so the stream must be cloneable into independent handles that
/// share the same underlying socket. `shutdown` closes both directions for
/// every handle and unblocks any thread parked in `read`.
pub trait Connection: Read + Write + Send + Sync + Sized + 'static {
    /// Create another handle to the same underlying stream.
    fn try_clone_conn(&self) -> io::Result<Self>;

    /// Shut down both directions of the stream.
    fn shutdown_conn(&self) -> io::Result<()>;
}

impl Connection for TcpStream {
    fn try_clone_conn(&self) -> io::Result<Self> {
        self.try_clone()
    }

    fn shutdown_conn(&self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

#[cfg(unix)]
impl Connection for std::os::unix::net::UnixStream {
    fn try_clone_conn(&self) -> io::Result<Self> {
        self.try_clone()
    }

    fn shutdown_conn(&self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

/// A connected RPC stream over TCP or a Unix domain socket.
pub struct RpcStream {
    inner: RpcStreamInner,
}

enum RpcStreamInner {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for RpcStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.inner {
            RpcStreamInner::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            RpcStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for RpcStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.inner {
            RpcStreamInner::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            RpcStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.inner {
            RpcStreamInner::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            RpcStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl Connection for RpcStream {
    fn try_clone_conn(&self) -> io::Result<Self> {
        let inner = match &self.inner {
            RpcStreamInner::Tcp(stream) => RpcStreamInner::Tcp(stream.try_clone()?),
            #[cfg(unix)]
            RpcStreamInner::Unix(stream) => RpcStreamInner::Unix(stream.try_clone()?),
        };
        Ok(Self { inner })
    }

    fn shutdown_conn(&self) -> io::Result<()> {
        match &self.inner {
            RpcStreamInner::Tcp(stream) => stream.shutdown(Shutdown::Both),
            #[cfg(unix)]
            RpcStreamInner::Unix(stream) => stream.shutdown(Shutdown::Both),
        }
    }
}

impl From<TcpStream> for RpcStream {
    fn from(stream: TcpStream) -> Self {
        Self {
            inner: RpcStreamInner::Tcp(stream),
        }
    }
}

#[cfg(unix)]
impl From<std::os::unix::net::UnixStream> for RpcStream {
    fn from(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: RpcStreamInner::Unix(stream),
        }
    }
}

impl RpcStream {
    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            RpcStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            RpcStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            RpcStreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            RpcStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match &self.inner {
            RpcStreamInner::Tcp(_) => "tcp",
            #[cfg(unix)]
            RpcStreamInner::Unix(_) => "unix",
        }
    }
}

impl std::fmt::Debug for RpcStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("RpcStream");
        dbg.field("type", &self.transport_name());
        if let RpcStreamInner::Tcp(stream) = &self.inner {
            if let Ok(addr) = stream.peer_addr() {
                dbg.field("peer", &addr);
            }
        }
        dbg.finish()
    }
}
