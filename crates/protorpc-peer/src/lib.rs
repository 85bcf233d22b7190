//! RPC dispatch over protorpc codecs.
//!
//! [`Client`] issues calls and matches replies by sequence number;
//! [`Server`] routes `"Service.Method"` names to typed handlers. Both sit on
//! top of the codecs in `protorpc-codec` and work over any transport
//! `protorpc-transport` can open.

pub mod client;
pub mod connector;
pub mod error;
pub mod server;

pub use client::{Client, ClientConfig};
pub use connector::{dial, dial_with_config, listen};
pub use error::{Result, RpcError};
pub use server::{serve, Server, ServerConfig};
