use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, TransportError};

/// Where an RPC peer listens or connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A TCP `host:port` address.
    Tcp(String),
    /// A filesystem-path Unix domain socket.
    Unix(PathBuf),
}

impl Endpoint {
    /// Build an endpoint from a network name and an address.
    ///
    /// Accepted networks are `tcp`, `tcp4`, `tcp6` and `unix`.
    pub fn new(network: &str, address: &str) -> Result<Self> {
        if address.is_empty() {
            return Err(TransportError::InvalidEndpoint {
                input: format!("{network}:{address}"),
                reason: "empty address",
            });
        }
        match network {
            "tcp" | "tcp4" | "tcp6" => Ok(Self::Tcp(address.to_string())),
            "unix" => Ok(Self::Unix(PathBuf::from(address))),
            _ => Err(TransportError::InvalidEndpoint {
                input: format!("{network}:{address}"),
                reason: "unsupported network (expected tcp or unix)",
            }),
        }
    }

    /// Network name for diagnostics.
    pub fn network(&self) -> &'static str {
        match self {
            Self::Tcp(_) => "tcp",
            Self::Unix(_) => "unix",
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    /// Parse `tcp://host:port` or `unix:///path/to.sock`.
    fn from_str(input: &str) -> Result<Self> {
        let (network, address) =
            input
                .split_once("://")
                .ok_or_else(|| TransportError::InvalidEndpoint {
                    input: input.to_string(),
                    reason: "missing scheme (expected tcp:// or unix://)",
                })?;
        Self::new(network, address)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}
