use bytes::{Buf, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Maximum encoded length of a 64-bit unsigned varint.
pub const MAX_VARINT_LEN: usize = 10;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// One size-prefixed unit on the wire.
///
/// An empty payload is what a zero length prefix decodes to and means
/// "no message".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// The serialized message bytes.
    pub payload: Bytes,
}

impl Frame {
    /// True when the frame carries no payload.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Number of bytes `value` occupies as an unsigned varint.
pub fn uvarint_len(value: u64) -> usize {
    prost::encoding::encoded_len_varint(value)
}

/// Append `value` to `dst` as an unsigned LEB128 varint.
pub fn encode_uvarint(value: u64, dst: &mut BytesMut) {
    prost::encoding::encode_varint(value, dst);
}

/// Decode an unsigned varint from the front of `src`.
///
/// Returns the value and the number of bytes it occupied, or `Ok(None)` when
/// `src` ends before the varint does.
pub fn decode_uvarint(src: &[u8]) -> Result<Option<(u64, usize)>> {
    let mut value = 0u64;
    for (i, &byte) in src.iter().take(MAX_VARINT_LEN).enumerate() {
        if byte < 0x80 {
            // The tenth byte may only contribute the top bit.
            if i == MAX_VARINT_LEN - 1 && byte > 1 {
                return Err(FrameError::VarintOverflow);
            }
            return Ok(Some((value | (u64::from(byte) << (7 * i)), i + 1)));
        }
        value |= u64::from(byte & 0x7f) << (7 * i);
    }

    if src.len() >= MAX_VARINT_LEN {
        return Err(FrameError::VarintOverflow);
    }
    Ok(None)
}

/// Encode a payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌─────────────────────┬──────────────────────┐
/// │ Length (uvarint,    │ Payload              │
/// │ 1..=10 bytes)       │ (Length bytes)       │
/// └─────────────────────┴──────────────────────┘
/// ```
///
/// An empty payload encodes to the single byte `0x00`.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(uvarint_len(payload.len() as u64) + payload.len());
    encode_uvarint(payload.len() as u64, dst);
    dst.extend_from_slice(payload);
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    let Some((len, prefix)) = decode_uvarint(src)? else {
        return Ok(None); // Need more data
    };

    if len > max_payload as u64 {
        return Err(FrameError::PayloadTooLarge {
            size: len,
            max: max_payload,
        });
    }

    let len = len as usize;
    if src.len() < prefix + len {
        return Ok(None); // Need more data
    }

    src.advance(prefix);
    let payload = src.split_to(len).freeze();

    Ok(Some(Frame { payload }))
}

/// Configuration for frame reading and writing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::BufMut;

    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let mut buf = BytesMut::new();
        let payload = b"hello, protorpc!";

        encode_frame(payload, &mut buf);
        assert_eq!(buf.len(), 1 + payload.len());

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(frame.payload.as_ref(), payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn empty_payload_is_single_zero_byte() {
        let mut buf = BytesMut::new();
        encode_frame(b"", &mut buf);
        assert_eq!(buf.as_ref(), &[0x00]);

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert!(frame.is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn multi_byte_length_prefix() {
        let payload = vec![0x5A; 300];
        let mut buf = BytesMut::new();
        encode_frame(&payload, &mut buf);

        // 300 = 0b1_0010_1100 -> 0xAC 0x02
        assert_eq!(&buf[..2], &[0xAC, 0x02]);
        assert_eq!(uvarint_len(300) + payload.len(), buf.len());

        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(frame.payload.len(), 300);
    }

    #[test]
    fn decode_incomplete_prefix() {
        let mut buf = BytesMut::from(&[0x80][..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .is_none());
        assert_eq!(buf.len(), 1, "incomplete input must not be consumed");
    }

    #[test]
    fn decode_incomplete_payload() {
        let mut buf = BytesMut::new();
        encode_frame(b"hello", &mut buf);
        buf.truncate(3);

        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .is_none());
    }

    #[test]
    fn decode_payload_too_large() {
        let mut buf = BytesMut::new();
        encode_uvarint(32 * 1024 * 1024, &mut buf);

        let result = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD);
        assert!(matches!(
            result,
            Err(FrameError::PayloadTooLarge { size, .. }) if size == 32 * 1024 * 1024
        ));
    }

    #[test]
    fn multiple_frames() {
        let mut buf = BytesMut::new();
        encode_frame(b"first", &mut buf);
        encode_frame(b"", &mut buf);
        encode_frame(b"second", &mut buf);

        let f1 = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        let f2 = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();
        let f3 = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().unwrap();

        assert_eq!(f1.payload.as_ref(), b"first");
        assert!(f2.is_empty());
        assert_eq!(f3.payload.as_ref(), b"second");
        assert!(buf.is_empty());
    }

    #[test]
    fn uvarint_boundaries() {
        for value in [0u64, 1, 127, 128, 16_383, 16_384, u32::MAX as u64, u64::MAX] {
            let mut buf = BytesMut::new();
            encode_uvarint(value, &mut buf);
            assert_eq!(buf.len(), uvarint_len(value));
            assert_eq!(decode_uvarint(&buf).unwrap(), Some((value, buf.len())));
        }
    }

    #[test]
    fn uvarint_overflow() {
        // Ten continuation bytes never terminate.
        let endless = [0xFF; MAX_VARINT_LEN];
        assert!(matches!(
            decode_uvarint(&endless),
            Err(FrameError::VarintOverflow)
        ));

        // A tenth byte above 1 does not fit in 64 bits.
        let mut too_big = BytesMut::new();
        too_big.put_slice(&[0xFF; MAX_VARINT_LEN - 1]);
        too_big.put_u8(0x02);
        assert!(matches!(
            decode_uvarint(&too_big),
            Err(FrameError::VarintOverflow)
        ));
    }
}
