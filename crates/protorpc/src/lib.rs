//! Protocol Buffers RPC over varint-framed byte streams.
//!
//! Each request and response travels as two length-prefixed frames: a small
//! header naming the method and call id, then the protobuf payload. The
//! codecs bridge call ids between peers and a dispatcher's own sequence
//! numbers.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP and Unix domain socket streams and listeners
//! - [`frame`]: uvarint length-prefixed framing
//! - [`codec`]: client and server codecs with sequence bridging
//! - [`peer`]: RPC client and server dispatch (behind `peer` feature)
//! - [`arith`]: a small demo service (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use protorpc_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use protorpc_frame::*;
}

/// Re-export codec types.
pub mod codec {
    pub use protorpc_codec::*;
}

/// Re-export client and server types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use protorpc_peer::*;
}

#[cfg(feature = "peer")]
pub mod arith;
