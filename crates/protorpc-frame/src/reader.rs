use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use protorpc_transport::RpcStream;
use tracing::trace;

use crate::codec::{decode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::message::WireMessage;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Reads are buffered: bytes past the end of the current frame stay in the
/// internal buffer for the next call, so the wrapped stream must not be read
/// by anything else.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached on a
    /// frame boundary and `Err(FrameError::UnexpectedEof)` when it cuts a
    /// frame short.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.config.max_payload_size)? {
                trace!(len = frame.payload.len(), "read frame");
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                if self.buf.is_empty() {
                    return Err(FrameError::ConnectionClosed);
                }
                return Err(FrameError::UnexpectedEof {
                    buffered: self.buf.len(),
                });
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Read the next frame as a message.
    ///
    /// Returns `Ok(false)` for a zero-length frame, leaving `dst` untouched.
    /// Otherwise the payload replaces the contents of `dst`, or is discarded
    /// when `dst` is `None`, and `Ok(true)` is returned.
    pub fn read_message(&mut self, dst: Option<&mut dyn WireMessage>) -> Result<bool> {
        let frame = self.read_frame()?;
        if frame.is_empty() {
            return Ok(false);
        }
        match dst {
            Some(message) => message.replace_from(&frame.payload)?,
            None => trace!(len = frame.payload.len(), "discarded frame payload"),
        }
        Ok(true)
    }
}

impl FrameReader<RpcStream> {
    /// Create a frame reader for `RpcStream` and apply read timeout from config.
    pub fn with_config_stream(inner: RpcStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(crate::transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::codec::{encode_frame, encode_uvarint};

    #[derive(Clone, PartialEq, prost::Message)]
    struct Sample {
        #[prost(string, tag = "1")]
        name: String,
        #[prost(uint64, tag = "2")]
        count: u64,
    }

    fn encoded(message: &Sample) -> Vec<u8> {
        let mut payload = BytesMut::new();
        message.encode_to(&mut payload).unwrap();
        let mut wire = BytesMut::new();
        encode_frame(&payload, &mut wire);
        wire.to_vec()
    }

    #[test]
    fn read_single_frame() {
        let mut wire = BytesMut::new();
        encode_frame(b"hello", &mut wire);

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), b"hello");
    }

    #[test]
    fn read_multiple_frames() {
        let mut wire = BytesMut::new();
        encode_frame(b"one", &mut wire);
        encode_frame(b"two", &mut wire);
        encode_frame(b"three", &mut wire);

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"one");
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"two");
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"three");
    }

    #[test]
    fn read_message_roundtrip() {
        let sent = Sample {
            name: "widgets".to_string(),
            count: 42,
        };
        let mut reader = FrameReader::new(Cursor::new(encoded(&sent)));

        let mut received = Sample::default();
        assert!(reader.read_message(Some(&mut received)).unwrap());
        assert_eq!(received, sent);
    }

    #[test]
    fn zero_length_frame_consumes_one_byte_and_leaves_destination() {
        let mut reader = FrameReader::new(Cursor::new(vec![0x00, 0x03]));

        let mut dst = Sample {
            name: "kept".to_string(),
            count: 7,
        };
        assert!(!reader.read_message(Some(&mut dst)).unwrap());
        assert_eq!(dst.name, "kept");
        assert_eq!(dst.count, 7);
        // Only the zero prefix was consumed; the next prefix announces a
        // payload the stream never delivers.
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::UnexpectedEof { buffered: 1 }));
    }

    #[test]
    fn discards_payload_without_destination() {
        let first = Sample {
            name: "drained".to_string(),
            count: 1,
        };
        let second = Sample {
            name: "next".to_string(),
            count: 2,
        };
        let mut wire = encoded(&first);
        wire.extend(encoded(&second));

        let mut reader = FrameReader::new(Cursor::new(wire));
        assert!(reader.read_message(None).unwrap());

        let mut dst = Sample::default();
        reader.read_message(Some(&mut dst)).unwrap();
        assert_eq!(dst, second);
    }

    #[test]
    fn malformed_payload_is_decode_error() {
        let mut wire = BytesMut::new();
        encode_frame(&[0x0A, 0x09, 0x01], &mut wire);

        let mut reader = FrameReader::new(Cursor::new(wire.to_vec()));
        let mut dst = Sample::default();
        let err = reader.read_message(Some(&mut dst)).unwrap_err();
        assert!(matches!(err, FrameError::Decode(_)));
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: encoded(&Sample {
                name: "slow".to_string(),
                count: 300,
            }),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        let mut dst = Sample::default();
        reader.read_message(Some(&mut dst)).unwrap();
        assert_eq!(dst.name, "slow");
        assert_eq!(dst.count, 300);
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
        assert!(err.is_eof());
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut partial = BytesMut::new();
        encode_uvarint(16, &mut partial);
        partial.put_slice(b"only-part");

        let mut reader = FrameReader::new(Cursor::new(partial.to_vec()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::UnexpectedEof { buffered: 10 }));
        assert!(err.is_eof());
    }

    #[test]
    fn oversized_frame_in_stream() {
        let mut wire = BytesMut::new();
        encode_uvarint(1024, &mut wire);

        let cfg = FrameConfig {
            max_payload_size: 16,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(wire.to_vec()), cfg);
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
    }

    #[test]
    fn interrupted_read_retries() {
        let mut wire = BytesMut::new();
        encode_frame(b"ok", &mut wire);

        let reader = InterruptedThenData {
            interrupted: false,
            bytes: wire.to_vec(),
            pos: 0,
        };
        let mut framed = FrameReader::new(reader);
        assert_eq!(framed.read_frame().unwrap().payload.as_ref(), b"ok");
    }

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_pipe() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        let sent = Sample {
            name: "ping".to_string(),
            count: 1,
        };
        writer.write_message(Some(&sent)).unwrap();
        writer.write_message(None).unwrap();

        let mut received = Sample::default();
        assert!(reader.read_message(Some(&mut received)).unwrap());
        assert_eq!(received, sent);
        assert!(reader.read_frame().unwrap().is_empty());
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            let remaining = &self.bytes[self.pos..];
            let n = remaining.len().min(buf.len());
            buf[..n].copy_from_slice(&remaining[..n]);
            self.pos += n;
            Ok(n)
        }
    }
}
