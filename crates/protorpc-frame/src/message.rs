//! Object-safe view of a Protocol Buffers message.
//!
//! [`prost::Message`] is generic over its buffers and cannot be used as a
//! trait object. Frame I/O and the codecs above it work with
//! `&dyn WireMessage` instead, which every prost message implements.

use bytes::BytesMut;

/// A structured message that can be written to and read from a frame.
pub trait WireMessage: Send + Sync + std::fmt::Debug {
    /// Encoded length of the message in bytes.
    fn wire_len(&self) -> usize;

    /// Append the encoded message to `dst`.
    fn encode_to(&self, dst: &mut BytesMut) -> Result<(), prost::EncodeError>;

    /// Replace the contents of `self` with the message decoded from `src`.
    fn replace_from(&mut self, src: &[u8]) -> Result<(), prost::DecodeError>;

    /// Rust type name of the message, for diagnostics.
    fn message_name(&self) -> &'static str;
}

impl<M: prost::Message> WireMessage for M {
    fn wire_len(&self) -> usize {
        prost::Message::encoded_len(self)
    }

    fn encode_to(&self, dst: &mut BytesMut) -> Result<(), prost::EncodeError> {
        prost::Message::encode(self, dst)
    }

    fn replace_from(&mut self, src: &[u8]) -> Result<(), prost::DecodeError> {
        prost::Message::clear(self);
        prost::Message::merge(self, src)
    }

    fn message_name(&self) -> &'static str {
        std::any::type_name::<M>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq, prost::Message)]
    struct Point {
        #[prost(int32, tag = "1")]
        x: i32,
        #[prost(int32, tag = "2")]
        y: i32,
    }

    #[test]
    fn replace_clears_previous_fields() {
        let mut dst = Point { x: 9, y: 9 };
        let mut buf = BytesMut::new();
        Point { x: 3, y: 0 }.encode_to(&mut buf).unwrap();

        dst.replace_from(&buf).unwrap();
        assert_eq!(dst, Point { x: 3, y: 0 });
    }

    #[test]
    fn wire_len_matches_encoding() {
        let point = Point { x: 300, y: -1 };
        let mut buf = BytesMut::new();
        point.encode_to(&mut buf).unwrap();
        assert_eq!(point.wire_len(), buf.len());
        assert!(point.message_name().ends_with("Point"));
    }

    #[test]
    fn malformed_bytes_fail_to_decode() {
        let mut dst = Point::default();
        // Field 1, wire type 2 (length delimited) claiming 5 bytes that are not there.
        assert!(dst.replace_from(&[0x0A, 0x05, 0x01]).is_err());
    }
}
