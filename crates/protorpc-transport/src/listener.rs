use std::net::{SocketAddr, TcpListener, TcpStream};

use tracing::{debug, info};

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};
use crate::traits::RpcStream;
#[cfg(unix)]
use crate::uds::UnixDomainSocket;

/// A bound listener for either transport.
pub enum RpcListener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixDomainSocket),
}

impl RpcListener {
    /// Bind a listener on the given endpoint.
    pub fn bind(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::Tcp(addr) => {
                let listener = TcpListener::bind(addr.as_str()).map_err(|source| {
                    TransportError::Bind {
                        endpoint: endpoint.to_string(),
                        source,
                    }
                })?;
                info!(addr = ?listener.local_addr().ok(), "listening on tcp");
                Ok(Self::Tcp(listener))
            }
            #[cfg(unix)]
            Endpoint::Unix(path) => Ok(Self::Unix(UnixDomainSocket::bind(path)?)),
            #[cfg(not(unix))]
            Endpoint::Unix(_) => Err(TransportError::InvalidEndpoint {
                input: endpoint.to_string(),
                reason: "unix domain sockets are not supported on this platform",
            }),
        }
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<RpcStream> {
        match self {
            Self::Tcp(listener) => {
                let (stream, peer) = listener.accept().map_err(TransportError::Accept)?;
                debug!(%peer, "accepted tcp connection");
                // Requests are small and latency bound.
                if let Err(err) = stream.set_nodelay(true) {
                    debug!(%peer, error = %err, "could not disable nagle");
                }
                Ok(RpcStream::from(stream))
            }
            #[cfg(unix)]
            Self::Unix(socket) => socket.accept(),
        }
    }

    /// The local TCP address, if this is a TCP listener.
    ///
    /// Useful after binding to port `0`.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match self {
            Self::Tcp(listener) => listener.local_addr().ok(),
            #[cfg(unix)]
            Self::Unix(_) => None,
        }
    }

    /// The endpoint a client should dial to reach this listener.
    pub fn endpoint(&self) -> Option<Endpoint> {
        match self {
            Self::Tcp(listener) => listener
                .local_addr()
                .ok()
                .map(|addr| Endpoint::Tcp(addr.to_string())),
            #[cfg(unix)]
            Self::Unix(socket) => Some(Endpoint::Unix(socket.path().to_path_buf())),
        }
    }
}

/// Connect to an endpoint (blocking).
pub fn connect(endpoint: &Endpoint) -> Result<RpcStream> {
    match endpoint {
        Endpoint::Tcp(addr) => {
            let stream =
                TcpStream::connect(addr.as_str()).map_err(|source| TransportError::Connect {
                    endpoint: endpoint.to_string(),
                    source,
                })?;
            stream.set_nodelay(true)?;
            debug!(%addr, "connected over tcp");
            Ok(RpcStream::from(stream))
        }
        #[cfg(unix)]
        Endpoint::Unix(path) => UnixDomainSocket::connect(path),
        #[cfg(not(unix))]
        Endpoint::Unix(_) => Err(TransportError::InvalidEndpoint {
            input: endpoint.to_string(),
            reason: "unix domain sockets are not supported on this platform",
        }),
    }
}
