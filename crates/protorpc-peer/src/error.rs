use std::time::Duration;

/// Errors that can occur in client and server operations.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] protorpc_transport::TransportError),

    /// Codec-level error.
    #[error("codec error: {0}")]
    Codec(#[from] protorpc_codec::CodecError),

    /// The server answered the call with an error message.
    #[error("{0}")]
    Remote(String),

    /// The client was closed before or while the call was in flight.
    #[error("protorpc: connection is shut down")]
    Shutdown,

    /// The connection ended while calls were in flight.
    #[error("protorpc: unexpected EOF")]
    UnexpectedEof,

    /// The connection failed while calls were in flight.
    #[error("protorpc: connection lost: {0}")]
    ConnectionLost(String),

    /// No reply arrived in time.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// The reply could not be converted to the type the caller asked for.
    #[error("reply is not a {expected}")]
    ReplyType { expected: &'static str },

    /// A method name that is not of the form `Service.Method`.
    #[error("invalid method name {0:?}: expected \"Service.Method\"")]
    InvalidMethodName(String),

    /// A method registered twice.
    #[error("method already registered: {0}")]
    DuplicateMethod(String),

    /// Thread creation or another OS-level failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RpcError {
    /// The server's message if the call itself failed remotely.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            Self::Remote(message) => Some(message),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
