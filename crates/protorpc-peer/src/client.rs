use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use protorpc_codec::{ClientCodec, CodecError, Payload, ProtoClientCodec, Request};
use protorpc_frame::FrameConfig;
use protorpc_transport::Endpoint;
use tracing::{debug, trace, warn};

use crate::error::{Result, RpcError};

type Outcome = std::result::Result<Box<dyn Payload>, RpcError>;

/// Client behavior configuration.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Frame limits and socket timeouts for connections opened by
    /// [`Client::connect_with_config`].
    pub frame: FrameConfig,
    /// Deadline applied by [`Client::call`]. `None` waits forever.
    pub call_timeout: Option<Duration>,
}

struct PendingCall {
    reply: Box<dyn Payload>,
    done: Sender<Outcome>,
}

#[derive(Default)]
struct CallState {
    seq: u64,
    pending: HashMap<u64, PendingCall>,
    closing: bool,
    shutdown: bool,
}

struct Shared {
    codec: Box<dyn ClientCodec>,
    state: Mutex<CallState>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, CallState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An RPC client bound to one connection.
///
/// Calls may be issued from any number of threads. A background thread
/// reads responses and completes the matching calls; when it stops, every
/// outstanding call fails.
pub struct Client {
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<()>>>,
    config: ClientConfig,
}

impl Client {
    /// Start a client on an existing codec.
    pub fn new(codec: impl ClientCodec + 'static) -> Result<Self> {
        Self::with_config(codec, ClientConfig::default())
    }

    /// Start a client on an existing codec with explicit configuration.
    pub fn with_config(codec: impl ClientCodec + 'static, config: ClientConfig) -> Result<Self> {
        let shared = Arc::new(Shared {
            codec: Box::new(codec),
            state: Mutex::new(CallState::default()),
        });

        let reader = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("protorpc-client-reader".to_string())
                .spawn(move || read_responses(&shared))?
        };

        Ok(Self {
            shared,
            reader: Mutex::new(Some(reader)),
            config,
        })
    }

    /// Connect to `endpoint` with the default configuration.
    pub fn connect(endpoint: &Endpoint) -> Result<Self> {
        Self::connect_with_config(endpoint, ClientConfig::default())
    }

    /// Connect to `endpoint`, applying the frame limits and timeouts in
    /// `config` to the new stream.
    pub fn connect_with_config(endpoint: &Endpoint, config: ClientConfig) -> Result<Self> {
        let stream = protorpc_transport::connect(endpoint)?;
        debug!(%endpoint, transport = stream.transport_name(), "client connected");
        let codec = ProtoClientCodec::with_stream_config(stream, config.frame.clone())?;
        Self::with_config(codec, config)
    }

    /// Call `method` and wait for the reply.
    ///
    /// Waits at most [`ClientConfig::call_timeout`] when one is configured.
    pub fn call<Req, Resp>(&self, method: &str, args: &Req) -> Result<Resp>
    where
        Req: prost::Message + 'static,
        Resp: prost::Message + Default + 'static,
    {
        match self.config.call_timeout {
            Some(timeout) => self.call_timeout(method, args, timeout),
            None => {
                let (_, done) = self.start(method, Some(args), Box::new(Resp::default()))?;
                let outcome = done.recv().map_err(|_| RpcError::Shutdown)?;
                downcast_reply(outcome?)
            }
        }
    }

    /// Call `method` and wait at most `timeout` for the reply.
    ///
    /// On timeout the call is abandoned: a reply that arrives later is
    /// discarded.
    pub fn call_timeout<Req, Resp>(&self, method: &str, args: &Req, timeout: Duration) -> Result<Resp>
    where
        Req: prost::Message + 'static,
        Resp: prost::Message + Default + 'static,
    {
        let (seq, done) = self.start(method, Some(args), Box::new(Resp::default()))?;
        match done.recv_timeout(timeout) {
            Ok(outcome) => downcast_reply(outcome?),
            Err(RecvTimeoutError::Timeout) => {
                if self.shared.state().pending.remove(&seq).is_none() {
                    // Completed between the timeout and the removal.
                    if let Ok(outcome) = done.try_recv() {
                        return downcast_reply(outcome?);
                    }
                }
                debug!(method, seq, ?timeout, "call timed out");
                Err(RpcError::Timeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(RpcError::Shutdown),
        }
    }

    /// Close the connection and wait for the response reader to stop.
    ///
    /// Outstanding calls fail with [`RpcError::Shutdown`]. Closing twice
    /// fails with [`RpcError::Shutdown`].
    pub fn close(&self) -> Result<()> {
        {
            let mut state = self.shared.state();
            if state.closing {
                return Err(RpcError::Shutdown);
            }
            state.closing = true;
        }

        let closed = self.shared.codec.close();
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = reader {
            if handle.join().is_err() {
                warn!("client reader thread panicked");
            }
        }
        closed.map_err(RpcError::from)
    }

    /// Number of calls waiting for a reply.
    pub fn pending_calls(&self) -> usize {
        self.shared.state().pending.len()
    }

    /// True once the connection has been closed or has failed.
    pub fn is_shut_down(&self) -> bool {
        let state = self.shared.state();
        state.closing || state.shutdown
    }

    fn start(
        &self,
        method: &str,
        args: Option<&dyn Payload>,
        reply: Box<dyn Payload>,
    ) -> Result<(u64, Receiver<Outcome>)> {
        let (done, receiver) = mpsc::channel();
        let seq = {
            let mut state = self.shared.state();
            if state.closing || state.shutdown {
                return Err(RpcError::Shutdown);
            }
            let seq = state.seq;
            state.seq += 1;
            state.pending.insert(seq, PendingCall { reply, done });
            seq
        };

        trace!(method, seq, "sending call");
        if let Err(err) = self.shared.codec.write_request(&Request::new(method, seq), args) {
            // The reader may already have completed the call, in which case
            // the outcome is waiting on the channel.
            if self.shared.state().pending.remove(&seq).is_some() {
                return Err(err.into());
            }
        }
        Ok((seq, receiver))
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if !self.shared.state().closing {
            let _ = self.close();
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("pending_calls", &self.pending_calls())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

fn downcast_reply<Resp: 'static>(reply: Box<dyn Payload>) -> Result<Resp> {
    reply
        .into_any()
        .downcast::<Resp>()
        .map(|reply| *reply)
        .map_err(|_| RpcError::ReplyType {
            expected: std::any::type_name::<Resp>(),
        })
}

fn read_responses(shared: &Shared) {
    let err = loop {
        let response = match shared.codec.read_response_header() {
            Ok(response) => response,
            Err(err) => break err,
        };

        // An empty method means the codec had no record of the id.
        let call = if response.service_method.is_empty() {
            None
        } else {
            shared.state().pending.remove(&response.seq)
        };

        let Some(mut call) = call else {
            debug!(seq = response.seq, "discarding stale reply");
            if let Err(err) = shared.codec.read_response_body(None) {
                break err;
            }
            continue;
        };

        if response.is_error() {
            let body = shared.codec.read_response_body(None);
            let _ = call.done.send(Err(RpcError::Remote(response.error)));
            if let Err(err) = body {
                break err;
            }
            continue;
        }

        match shared.codec.read_response_body(Some(&mut *call.reply)) {
            Ok(()) => {
                let _ = call.done.send(Ok(call.reply));
            }
            Err(err) if err.is_closed() => {
                let closing = shared.state().closing;
                let _ = call.done.send(Err(terminal_error(&err, closing)));
                break err;
            }
            Err(err) => {
                let _ = call.done.send(Err(err.into()));
            }
        }
    };

    let (closing, calls) = {
        let mut state = shared.state();
        state.shutdown = true;
        let calls: Vec<PendingCall> = state.pending.drain().map(|(_, call)| call).collect();
        (state.closing, calls)
    };

    if closing {
        debug!("client reader stopped");
    } else if err.is_closed() {
        debug!(error = %err, "server closed the connection");
    } else {
        warn!(error = %err, "protorpc: client protocol error");
    }

    for call in calls {
        let _ = call.done.send(Err(terminal_error(&err, closing)));
    }
}

fn terminal_error(err: &CodecError, closing: bool) -> RpcError {
    if closing {
        RpcError::Shutdown
    } else if err.is_closed() {
        RpcError::UnexpectedEof
    } else {
        RpcError::ConnectionLost(err.to_string())
    }
}
