use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use protorpc_frame::{FrameConfig, FrameReader, FrameWriter, WireMessage};
use protorpc_transport::{Connection, RpcStream};
use tracing::{debug, trace, warn};

use crate::error::{CodecError, Result};
use crate::header::Header;
use crate::payload::Payload;
use crate::rpc::{ClientCodec, Request, Response};

/// Client codec speaking the protorpc wire format over a duplex stream.
///
/// Remembers the method of every request in flight so replies, which carry
/// only the call id, can be reported with the method that was called.
pub struct ProtoClientCodec<C> {
    reader: Mutex<FrameReader<C>>,
    writer: Mutex<FrameWriter<C>>,
    conn: C,
    pending: Mutex<HashMap<u64, String>>,
}

impl<C: Connection> ProtoClientCodec<C> {
    /// Create a codec with the default frame configuration.
    pub fn new(conn: C) -> Result<Self> {
        Self::with_config(conn, FrameConfig::default())
    }

    /// Create a codec with an explicit payload limit.
    ///
    /// Timeouts in `config` are ignored here; see
    /// [`ProtoClientCodec::with_stream_config`].
    pub fn with_config(conn: C, config: FrameConfig) -> Result<Self> {
        let reader = FrameReader::with_config(conn.try_clone_conn()?, config.clone());
        let writer = FrameWriter::with_config(conn.try_clone_conn()?, config);
        Ok(Self::from_parts(reader, writer, conn))
    }

    fn from_parts(reader: FrameReader<C>, writer: FrameWriter<C>, conn: C) -> Self {
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            conn,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Number of requests written whose response header has not arrived.
    pub fn pending_len(&self) -> usize {
        self.pending().len()
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<u64, String>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProtoClientCodec<RpcStream> {
    /// Create a codec and apply the timeouts from `config` to the stream.
    pub fn with_stream_config(conn: RpcStream, config: FrameConfig) -> Result<Self> {
        let reader = FrameReader::with_config_stream(conn.try_clone_conn()?, config.clone())?;
        let writer = FrameWriter::with_config_stream(conn.try_clone_conn()?, config)?;
        Ok(Self::from_parts(reader, writer, conn))
    }
}

impl<C: Connection> ClientCodec for ProtoClientCodec<C> {
    fn write_request(&self, request: &Request, body: Option<&dyn Payload>) -> Result<()> {
        let message = match body {
            None => None,
            Some(payload) => Some(payload.as_message().ok_or(CodecError::NotAMessage {
                op: "write_request",
                type_name: payload.type_name(),
            })?),
        };

        self.pending()
            .insert(request.seq, request.service_method.clone());

        let header = Header::request(request.service_method.as_str(), request.seq);
        let frames: [Option<&dyn WireMessage>; 2] = [Some(&header), message];
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_messages(&frames)?;

        trace!(method = %request.service_method, seq = request.seq, "wrote request");
        Ok(())
    }

    fn read_response_header(&self) -> Result<Response> {
        let mut header = Header::default();
        self.reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .read_message(Some(&mut header))?;

        if let Some(method) = &header.method {
            trace!(%method, "ignoring method in response header");
        }
        let error = header.error.unwrap_or_default();

        // An absent id reads as 0, the id of the first call on the connection.
        let id = header.id.unwrap_or_else(|| {
            warn!("response header without id");
            0
        });

        let service_method = match self.pending().remove(&id) {
            Some(method) => method,
            None => {
                warn!(id, "response for unknown request");
                String::new()
            }
        };

        trace!(method = %service_method, seq = id, failed = !error.is_empty(), "read response header");
        Ok(Response {
            service_method,
            seq: id,
            error,
        })
    }

    fn read_response_body(&self, body: Option<&mut dyn Payload>) -> Result<()> {
        let mut reader = self.reader.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(payload) = body else {
            reader.read_message(None)?;
            return Ok(());
        };

        let type_name = payload.type_name();
        match payload.as_message_mut() {
            Some(message) => {
                reader.read_message(Some(message))?;
                Ok(())
            }
            None => {
                // Keep the stream aligned on the next header before failing.
                reader.read_message(None)?;
                Err(CodecError::NotAMessage {
                    op: "read_response_body",
                    type_name,
                })
            }
        }
    }

    fn close(&self) -> Result<()> {
        debug!("closing client codec");
        self.conn.shutdown_conn()?;
        Ok(())
    }
}
