use protorpc_frame::FrameError;

/// Errors that can occur in codec operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Frame-level error.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// A request header arrived without a method name.
    #[error("protorpc: request header missing method (id {id:?})")]
    MissingMethod { id: Option<u64> },

    /// A request header arrived without a call id.
    #[error("protorpc: request header missing id (method {method:?})")]
    MissingId { method: Option<String> },

    /// A response was written for a sequence number with no pending request.
    #[error("protorpc: invalid sequence number {0} in response")]
    InvalidSequence(u64),

    /// The dispatcher supplied a value that is not a structured message.
    #[error("protorpc: {op}: {type_name} is not a protobuf message")]
    NotAMessage {
        op: &'static str,
        type_name: &'static str,
    },

    /// Splitting or shutting down the underlying stream failed.
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// True for violations of the wire protocol or the dispatcher contract.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Self::MissingMethod { .. }
                | Self::MissingId { .. }
                | Self::InvalidSequence(_)
                | Self::NotAMessage { .. }
        )
    }

    /// True when a write failed before any byte reached the stream.
    pub fn is_unsent(&self) -> bool {
        matches!(
            self,
            Self::Frame(FrameError::PayloadTooLarge { .. } | FrameError::Encode(_))
        )
    }

    /// True when the peer went away.
    pub fn is_closed(&self) -> bool {
        match self {
            Self::Frame(err) => err.is_eof(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(CodecError::InvalidSequence(3).is_protocol());
        assert!(CodecError::MissingMethod { id: Some(1) }.is_protocol());
        assert!(!CodecError::MissingId { method: None }.is_closed());

        let closed = CodecError::from(FrameError::ConnectionClosed);
        assert!(closed.is_closed());
        assert!(!closed.is_protocol());

        let decode = CodecError::from(FrameError::VarintOverflow);
        assert!(!decode.is_closed());
        assert!(!decode.is_unsent());

        let oversized = CodecError::from(FrameError::PayloadTooLarge { size: 9, max: 4 });
        assert!(oversized.is_unsent());
        assert!(!closed.is_unsent());
    }

    #[test]
    fn messages_name_the_problem() {
        let err = CodecError::NotAMessage {
            op: "write_request",
            type_name: "alloc::string::String",
        };
        assert_eq!(
            err.to_string(),
            "protorpc: write_request: alloc::string::String is not a protobuf message"
        );
        assert_eq!(
            CodecError::InvalidSequence(7).to_string(),
            "protorpc: invalid sequence number 7 in response"
        );
    }
}
