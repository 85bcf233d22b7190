use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use protorpc_transport::RpcStream;
use tracing::trace;

use crate::codec::{encode_uvarint, FrameConfig};
use crate::error::{FrameError, Result};
use crate::message::WireMessage;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to any `Write` stream.
///
/// A failed write may leave part of a frame on the stream. Nothing is rolled
/// back; the stream has to be treated as corrupted and closed.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and send one message, or the empty frame for `None`.
    pub fn write_message(&mut self, message: Option<&dyn WireMessage>) -> Result<()> {
        self.write_messages(&[message])
    }

    /// Encode several messages back to back and send them with one write.
    ///
    /// Nothing is written if any message fails to encode or exceeds the
    /// payload limit.
    pub fn write_messages(&mut self, messages: &[Option<&dyn WireMessage>]) -> Result<()> {
        self.buf.clear();
        for message in messages {
            self.encode_message(*message)?;
        }
        self.write_buffered()
    }

    fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    fn check_size(&self, len: usize) -> Result<()> {
        if len > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: len as u64,
                max: self.config.max_payload_size,
            });
        }
        Ok(())
    }

    fn encode_message(&mut self, message: Option<&dyn WireMessage>) -> Result<()> {
        let Some(message) = message else {
            encode_uvarint(0, &mut self.buf);
            return Ok(());
        };

        let len = message.wire_len();
        self.check_size(len)?;
        encode_uvarint(len as u64, &mut self.buf);
        message.encode_to(&mut self.buf)?;
        trace!(message = message.message_name(), len, "encoded frame");
        Ok(())
    }

    fn write_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }
}

impl FrameWriter<RpcStream> {
    /// Create a frame writer for `RpcStream` and apply write timeout from config.
    pub fn with_config_stream(inner: RpcStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(crate::transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::decode_frame;
    use crate::reader::FrameReader;

    #[derive(Clone, PartialEq, prost::Message)]
    struct Ping {
        #[prost(uint32, tag = "1")]
        seq: u32,
    }

    fn written(messages: &[Option<&dyn WireMessage>]) -> Vec<u8> {
        let mut wire = Vec::new();
        FrameWriter::new(&mut wire).write_messages(messages).unwrap();
        wire
    }

    #[test]
    fn absent_message_is_single_zero_byte() {
        assert_eq!(written(&[None]), vec![0x00]);
    }

    #[test]
    fn default_message_encodes_to_zero_length() {
        assert_eq!(written(&[Some(&Ping::default())]), vec![0x00]);
    }

    #[test]
    fn message_roundtrip() {
        let wire = written(&[Some(&Ping { seq: 9 })]);
        assert_eq!(wire, vec![0x02, 0x08, 0x09]);

        let mut reader = FrameReader::new(wire.as_slice());
        let mut ping = Ping::default();
        assert!(reader.read_message(Some(&mut ping)).unwrap());
        assert_eq!(ping.seq, 9);
    }

    #[test]
    fn write_messages_emits_consecutive_frames() {
        let (one, two) = (Ping { seq: 1 }, Ping { seq: 2 });
        let mut wire = BytesMut::from(written(&[Some(&one), None, Some(&two)]).as_slice());

        let f1 = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        let f2 = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        let f3 = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        assert_eq!(f1.payload.as_ref(), &[0x08, 0x01]);
        assert!(f2.is_empty());
        assert_eq!(f3.payload.as_ref(), &[0x08, 0x02]);
        assert!(wire.is_empty());
    }

    #[test]
    fn payload_too_large_rejected_before_writing() {
        let cfg = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let mut wire = Vec::new();
        let mut writer = FrameWriter::with_config(&mut wire, cfg);

        let big = Ping { seq: u32::MAX };
        let err = writer.write_message(Some(&big)).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 6, max: 4 }));

        let messages: [Option<&dyn WireMessage>; 2] = [None, Some(&big)];
        let err = writer.write_messages(&messages).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        drop(writer);
        assert!(wire.is_empty());
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);

        writer.write_message(None).unwrap();
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_write_and_flush() {
        let mut sink = InterruptedWriteThenFlush {
            wrote_once: false,
            flush_interrupted: false,
            data: Vec::new(),
        };

        FrameWriter::new(&mut sink)
            .write_message(Some(&Ping { seq: 9 }))
            .unwrap();
        assert_eq!(sink.data, vec![0x02, 0x08, 0x09]);
    }

    #[test]
    fn would_block_is_not_retried() {
        let mut writer = FrameWriter::new(WouldBlockWriter);
        let err = writer.write_message(None).unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.write_message(None).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct InterruptedWriteThenFlush {
        wrote_once: bool,
        flush_interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedWriteThenFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.wrote_once {
                self.wrote_once = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_interrupted {
                self.flush_interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            Ok(())
        }
    }

    struct WouldBlockWriter;

    impl Write for WouldBlockWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
