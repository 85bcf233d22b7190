//! Values exchanged with the dispatcher.
//!
//! The dispatcher hands the codecs arguments, results and reply
//! destinations as `dyn Payload`. Only structured messages can go on the
//! wire; [`Payload::as_message`] is the type test the codecs apply.

use std::any::Any;

use protorpc_frame::WireMessage;

/// A value the dispatcher passes through a codec.
pub trait Payload: Send + Sync {
    /// The value as a structured message, or `None` if it is not one.
    fn as_message(&self) -> Option<&dyn WireMessage>;

    /// Mutable view used as a decode destination.
    fn as_message_mut(&mut self) -> Option<&mut dyn WireMessage>;

    /// True for the placeholder sent in place of a result that could not be
    /// produced.
    fn is_invalid_request(&self) -> bool {
        false
    }

    /// Rust type name, for diagnostics.
    fn type_name(&self) -> &'static str;

    /// Convert into `Any` so callers can recover the concrete type.
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<M: prost::Message + 'static> Payload for M {
    fn as_message(&self) -> Option<&dyn WireMessage> {
        Some(self)
    }

    fn as_message_mut(&mut self) -> Option<&mut dyn WireMessage> {
        Some(self)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<M>()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// Placeholder result for requests that never reached a handler.
///
/// Written as an empty payload frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvalidRequest;

impl Payload for InvalidRequest {
    fn as_message(&self) -> Option<&dyn WireMessage> {
        None
    }

    fn as_message_mut(&mut self) -> Option<&mut dyn WireMessage> {
        None
    }

    fn is_invalid_request(&self) -> bool {
        true
    }

    fn type_name(&self) -> &'static str {
        "InvalidRequest"
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}
