/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The length prefix is not a valid 64-bit unsigned varint.
    #[error("frame length varint overflows u64")]
    VarintOverflow,

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: u64, max: usize },

    /// The message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[from] prost::EncodeError),

    /// The payload bytes are not a valid encoding of the destination message.
    #[error("failed to decode message: {0}")]
    Decode(#[from] prost::DecodeError),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended cleanly on a frame boundary.
    #[error("connection closed")]
    ConnectionClosed,

    /// The stream ended in the middle of a frame.
    #[error("unexpected end of stream ({buffered} bytes of an incomplete frame buffered)")]
    UnexpectedEof { buffered: usize },
}

impl FrameError {
    /// True when the peer went away, cleanly or mid-frame.
    pub fn is_eof(&self) -> bool {
        match self {
            Self::ConnectionClosed | Self::UnexpectedEof { .. } => true,
            Self::Io(err) => matches!(
                err.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::NotConnected
            ),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
