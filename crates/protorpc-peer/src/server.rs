use std::collections::HashMap;
use std::io;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread;
use std::time::Duration;

use protorpc_codec::{
    CodecError, InvalidRequest, Payload, ProtoServerCodec, Request, Response, ServerCodec,
};
use protorpc_frame::{FrameConfig, FrameError};
use protorpc_transport::{RpcListener, RpcStream};
use tracing::{debug, info, trace, warn};

use crate::error::{Result, RpcError};

/// Pause after a failed `accept` so a persistent failure such as running out
/// of file descriptors does not spin the accept loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Server behavior configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Frame limits and socket timeouts applied to accepted connections.
    pub frame: FrameConfig,
}

/// A registered method, with its argument and result types erased.
trait MethodHandler: Send + Sync {
    fn new_args(&self) -> Box<dyn Payload>;
    fn invoke(&self, args: Box<dyn Payload>) -> std::result::Result<Box<dyn Payload>, String>;
}

struct TypedHandler<Req, Resp, F> {
    func: F,
    _types: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp, F> MethodHandler for TypedHandler<Req, Resp, F>
where
    Req: prost::Message + Default + 'static,
    Resp: prost::Message + 'static,
    F: Fn(Req) -> std::result::Result<Resp, String> + Send + Sync,
{
    fn new_args(&self) -> Box<dyn Payload> {
        Box::new(Req::default())
    }

    fn invoke(&self, args: Box<dyn Payload>) -> std::result::Result<Box<dyn Payload>, String> {
        let args = args
            .into_any()
            .downcast::<Req>()
            .map_err(|_| "protorpc: argument type mismatch".to_string())?;
        let reply = (self.func)(*args)?;
        Ok(Box::new(reply))
    }
}

/// Routes incoming calls to registered handlers.
///
/// Each connection is served by one reader loop; every request runs on its
/// own thread so slow handlers do not block the connection.
pub struct Server {
    methods: RwLock<HashMap<String, Arc<dyn MethodHandler>>>,
    config: ServerConfig,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            methods: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Register `handler` under `"Service.Method"`.
    ///
    /// A handler returns either the reply message or the error text sent back
    /// to the caller.
    pub fn register<Req, Resp, F>(&self, name: &str, handler: F) -> Result<()>
    where
        Req: prost::Message + Default + 'static,
        Resp: prost::Message + 'static,
        F: Fn(Req) -> std::result::Result<Resp, String> + Send + Sync + 'static,
    {
        if !is_valid_method_name(name) {
            return Err(RpcError::InvalidMethodName(name.to_string()));
        }

        let mut methods = self.methods.write().unwrap_or_else(PoisonError::into_inner);
        if methods.contains_key(name) {
            return Err(RpcError::DuplicateMethod(name.to_string()));
        }
        let handler = TypedHandler {
            func: handler,
            _types: PhantomData,
        };
        methods.insert(name.to_string(), Arc::new(handler));
        debug!(method = name, "registered method");
        Ok(())
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<String> {
        let methods = self.methods.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = methods.keys().cloned().collect();
        names.sort();
        names
    }

    /// Accept connections forever, serving each on its own thread.
    ///
    /// Failed accepts are logged and retried.
    pub fn accept(self: &Arc<Self>, listener: &RpcListener) {
        self.accept_while(listener, &AtomicBool::new(true))
    }

    /// Accept connections while `running` is set, serving each on its own
    /// thread.
    ///
    /// The flag is checked after every accept, so a caller that clears it
    /// has to wake the listener with one more connection.
    pub fn accept_while(self: &Arc<Self>, listener: &RpcListener, running: &AtomicBool) {
        while running.load(Ordering::SeqCst) {
            let stream = match listener.accept() {
                Ok(stream) => stream,
                Err(err) => {
                    warn!(error = %err, "accept failed");
                    thread::sleep(ACCEPT_BACKOFF);
                    continue;
                }
            };
            if !running.load(Ordering::SeqCst) {
                break;
            }

            let server = Arc::clone(self);
            let spawned = thread::Builder::new()
                .name("protorpc-conn".to_string())
                .spawn(move || {
                    if let Err(err) = server.serve_conn(stream) {
                        warn!(error = %err, "failed to serve connection");
                    }
                });
            if let Err(err) = spawned {
                warn!(error = %err, "failed to spawn connection thread");
            }
        }
    }

    /// Serve one connection until the client hangs up.
    pub fn serve_conn(&self, stream: RpcStream) -> Result<()> {
        let transport = stream.transport_name();
        let codec = ProtoServerCodec::with_stream_config(stream, self.config.frame.clone())?;
        debug!(transport, "serving connection");
        self.serve_codec(&codec);
        Ok(())
    }

    /// Run the serving loop on `codec`.
    ///
    /// Returns once a request header cannot be read, after every in-flight
    /// handler has replied. The codec is closed on return.
    pub fn serve_codec<S: ServerCodec>(&self, codec: &S) {
        thread::scope(|scope| loop {
            let request = match codec.read_request_header() {
                Ok(request) => request,
                Err(err) if err.is_closed() => {
                    debug!("client hung up");
                    break;
                }
                Err(err) => {
                    warn!(error = %err, "protorpc: failed to read request header");
                    break;
                }
            };

            let Some(handler) = self.lookup(&request.service_method) else {
                let drained = codec.read_request_body(None);
                let message = format!("protorpc: can't find method {}", request.service_method);
                send_error(codec, &request, message);
                match drained {
                    Ok(()) => continue,
                    Err(_) => break,
                }
            };

            let mut args = handler.new_args();
            if let Err(err) = codec.read_request_body(Some(&mut *args)) {
                send_error(codec, &request, format!("protorpc: reading body: {err}"));
                if body_error_is_fatal(&err) {
                    break;
                }
                continue;
            }

            let job = move || handle(codec, handler.as_ref(), request, args);
            spawn_or_inline(job, |job| {
                thread::Builder::new()
                    .name("protorpc-handler".to_string())
                    .spawn_scoped(scope, job)
                    .map(drop)
            });
        });

        if let Err(err) = codec.close() {
            debug!(error = %err, "closing connection failed");
        }
    }

    fn lookup(&self, name: &str) -> Option<Arc<dyn MethodHandler>> {
        let methods = self.methods.read().unwrap_or_else(PoisonError::into_inner);
        methods.get(name).cloned()
    }
}

/// Serve `listener` with a freshly built server.
///
/// Convenience for binaries that register methods up front.
pub fn serve(server: Server, listener: &RpcListener) {
    if let Some(endpoint) = listener.endpoint() {
        info!(%endpoint, methods = server.methods().len(), "serving");
    }
    Arc::new(server).accept(listener)
}

fn handle<S: ServerCodec>(
    codec: &S,
    handler: &dyn MethodHandler,
    request: Request,
    args: Box<dyn Payload>,
) {
    trace!(method = %request.service_method, seq = request.seq, "dispatching");
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.invoke(args)))
        .unwrap_or_else(|_| {
            warn!(method = %request.service_method, "handler panicked");
            Err(format!("protorpc: method {} panicked", request.service_method))
        });

    let response = Response::new(request.service_method.as_str(), request.seq);
    let written = match outcome {
        Ok(reply) => codec.write_response(&response, Some(&*reply)),
        Err(message) => codec.write_response(&response.with_error(message), Some(&InvalidRequest)),
    };
    match written {
        Ok(()) => {}
        Err(err) if err.is_unsent() => {
            send_error(codec, &request, format!("protorpc: writing response: {err}"));
        }
        Err(err) => warn!(error = %err, "protorpc: writing response failed"),
    }
}

/// Body errors that leave the stream unusable. A payload that fails to
/// decode was consumed whole, so the next request can still be read.
fn body_error_is_fatal(err: &CodecError) -> bool {
    !matches!(
        err,
        CodecError::Frame(FrameError::Decode(_)) | CodecError::NotAMessage { .. }
    )
}

/// Run `job` on the thread started by `spawn`, or on the calling thread when
/// no thread can be started.
fn spawn_or_inline<'a, F>(job: F, spawn: impl FnOnce(Box<dyn FnOnce() + Send + 'a>) -> io::Result<()>)
where
    F: FnOnce() + Send + 'a,
{
    let slot = Arc::new(Mutex::new(Some(job)));
    let remote = Arc::clone(&slot);
    let spawned = spawn(Box::new(move || {
        let job = remote.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(job) = job {
            job();
        }
    }));

    if let Err(err) = spawned {
        warn!(error = %err, "failed to spawn handler thread, handling inline");
        let job = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(job) = job {
            job();
        }
    }
}

fn send_error<S: ServerCodec>(codec: &S, request: &Request, message: String) {
    debug!(method = %request.service_method, error = %message, "rejecting request");
    let response = Response::new(request.service_method.as_str(), request.seq).with_error(message);
    if let Err(err) = codec.write_response(&response, Some(&InvalidRequest)) {
        warn!(error = %err, "protorpc: writing response failed");
    }
}

fn is_valid_method_name(name: &str) -> bool {
    match name.split_once('.') {
        Some((service, method)) => {
            !service.is_empty() && !method.is_empty() && !method.contains('.')
        }
        None => false,
    }
}
