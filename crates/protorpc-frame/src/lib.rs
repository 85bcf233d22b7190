//! Varint length-prefixed message framing for protorpc.
//!
//! Every message travels as one frame:
//! - an unsigned LEB128 varint holding the payload length
//! - the serialized Protocol Buffers payload
//!
//! A zero length prefix carries no payload and stands for an absent message.
//! No partial reads, no buffer management in user code.

pub mod codec;
pub mod error;
pub mod message;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, decode_uvarint, encode_frame, encode_uvarint, uvarint_len, Frame, FrameConfig,
    DEFAULT_MAX_PAYLOAD, MAX_VARINT_LEN,
};
pub use error::{FrameError, Result};
pub use message::WireMessage;
pub use reader::FrameReader;
pub use writer::FrameWriter;

pub(crate) fn transport_to_frame_error(err: protorpc_transport::TransportError) -> FrameError {
    use protorpc_transport::TransportError;

    match err {
        TransportError::Io(io) | TransportError::Accept(io) => FrameError::Io(io),
        TransportError::Bind { source, .. } | TransportError::Connect { source, .. } => {
            FrameError::Io(source)
        }
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
