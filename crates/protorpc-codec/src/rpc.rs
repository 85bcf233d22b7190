//! The contract between the codecs and an RPC dispatcher.

use crate::error::Result;
use crate::payload::Payload;

/// Header of an outgoing or incoming call, in the dispatcher's sequence space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    /// `"Service.Method"`.
    pub service_method: String,
    pub seq: u64,
}

impl Request {
    pub fn new(service_method: impl Into<String>, seq: u64) -> Self {
        Self {
            service_method: service_method.into(),
            seq,
        }
    }
}

/// Header of a reply, in the dispatcher's sequence space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    /// Method of the originating call. Empty when a client receives a reply
    /// it has no record of.
    pub service_method: String,
    pub seq: u64,
    /// Empty on success.
    pub error: String,
}

impl Response {
    pub fn new(service_method: impl Into<String>, seq: u64) -> Self {
        Self {
            service_method: service_method.into(),
            seq,
            error: String::new(),
        }
    }

    /// Attach an error message.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = error.into();
        self
    }

    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}

/// Client half of a codec.
///
/// `write_request` may be called from many threads at once. The dispatcher
/// calls `read_response_header` and `read_response_body` in pairs from a
/// single reader thread.
pub trait ClientCodec: Send + Sync {
    fn write_request(&self, request: &Request, body: Option<&dyn Payload>) -> Result<()>;
    fn read_response_header(&self) -> Result<Response>;
    fn read_response_body(&self, body: Option<&mut dyn Payload>) -> Result<()>;
    fn close(&self) -> Result<()>;
}

/// Server half of a codec.
///
/// `read_request_header` and `read_request_body` are called in pairs from the
/// serving loop. `write_response` may be called from many handler threads.
pub trait ServerCodec: Send + Sync {
    fn read_request_header(&self) -> Result<Request>;
    fn read_request_body(&self, body: Option<&mut dyn Payload>) -> Result<()>;
    fn write_response(&self, response: &Response, body: Option<&dyn Payload>) -> Result<()>;
    fn close(&self) -> Result<()>;
}
