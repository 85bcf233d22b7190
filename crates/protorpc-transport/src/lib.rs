//! Duplex byte-stream transports for protorpc.
//!
//! Provides a unified stream type over the transports an RPC connection can
//! run on:
//! - TCP sockets
//! - Unix domain sockets (Linux/macOS)
//!
//! This is the lowest layer of protorpc. Codecs only need the [`Connection`]
//! trait; [`RpcStream`], [`RpcListener`] and [`connect`] cover connection
//! establishment for the dispatcher and the CLI.

pub mod endpoint;
pub mod error;
pub mod listener;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use listener::{connect, RpcListener};
pub use traits::{Connection, RpcStream};

#[cfg(unix)]
pub use uds::UnixDomainSocket;
