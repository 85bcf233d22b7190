//! Protobuf-RPC codecs.
//!
//! Each call travels as two frames: a [`Header`] naming the method and call
//! id, then the argument or result message. [`ProtoClientCodec`] and
//! [`ProtoServerCodec`] translate between that wire format and the
//! dispatcher-facing [`ClientCodec`] and [`ServerCodec`] traits.

pub mod client;
pub mod error;
pub mod header;
pub mod payload;
pub mod rpc;
pub mod server;

pub use client::ProtoClientCodec;
pub use error::{CodecError, Result};
pub use header::Header;
pub use payload::{InvalidRequest, Payload};
pub use rpc::{ClientCodec, Request, Response, ServerCodec};
pub use server::ProtoServerCodec;
