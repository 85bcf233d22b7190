use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use protorpc_frame::{FrameConfig, FrameReader, FrameWriter, WireMessage};
use protorpc_transport::{Connection, RpcStream};
use tracing::{debug, trace};

use crate::error::{CodecError, Result};
use crate::header::Header;
use crate::payload::Payload;
use crate::rpc::{Request, Response, ServerCodec};

#[derive(Default)]
struct SeqTable {
    seq: u64,
    pending: HashMap<u64, u64>,
}

/// Server codec speaking the protorpc wire format over a duplex stream.
///
/// Call ids chosen by the remote client never reach the dispatcher. Each
/// request is given the next number from a private counter (starting at 1)
/// and the wire id is restored when the response is written, so ids from
/// different clients cannot collide inside one dispatcher.
pub struct ProtoServerCodec<C> {
    reader: Mutex<FrameReader<C>>,
    writer: Mutex<FrameWriter<C>>,
    conn: C,
    table: Mutex<SeqTable>,
}

impl<C: Connection> ProtoServerCodec<C> {
    /// Create a codec with the default frame configuration.
    pub fn new(conn: C) -> Result<Self> {
        Self::with_config(conn, FrameConfig::default())
    }

    /// Create a codec with an explicit payload limit.
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
            table: Mutex::new(SeqTable::default()),
        }
    }

    /// Number of requests read whose response has not been written.
    pub fn pending_len(&self) -> usize {
        self.table().pending.len()
    }

    fn table(&self) -> MutexGuard<'_, SeqTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProtoServerCodec<RpcStream> {
    /// Create a codec and apply the timeouts from `config` to the stream.
    pub fn with_stream_config(conn: RpcStream, config: FrameConfig) -> Result<Self> {
        let reader = FrameReader::with_config_stream(conn.try_clone_conn()?, config.clone())?;
        let writer = FrameWriter::with_config_stream(conn.try_clone_conn()?, config)?;
        Ok(Self::from_parts(reader, writer, conn))
    }
}

impl<C: Connection> ServerCodec for ProtoServerCodec<C> {
    fn read_request_header(&self) -> Result<Request> {
        let mut header = Header::default();
        self.reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .read_message(Some(&mut header))?;

        let (service_method, id) = match (header.method, header.id) {
            (Some(method), Some(id)) => (method, id),
            (None, id) => return Err(CodecError::MissingMethod { id }),
            (method, None) => return Err(CodecError::MissingId { method }),
        };

        let seq = {
            let mut table = self.table();
            table.seq += 1;
            let seq = table.seq;
            table.pending.insert(seq, id);
            seq
        };

        trace!(method = %service_method, id, seq, "read request header");
        Ok(Request {
            service_method,
            seq,
        })
    }

    fn read_request_body(&self, body: Option<&mut dyn Payload>) -> Result<()> {
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
                reader.read_message(None)?;
                Err(CodecError::NotAMessage {
                    op: "read_request_body",
                    type_name,
                })
            }
        }
    }

    fn write_response(&self, response: &Response, body: Option<&dyn Payload>) -> Result<()> {
        let message = match body {
            None => None,
            Some(payload) if payload.is_invalid_request() => None,
            Some(payload) => match payload.as_message() {
                Some(message) => Some(message),
                None => {
                    self.table().pending.remove(&response.seq);
                    return Err(CodecError::NotAMessage {
                        op: "write_response",
                        type_name: payload.type_name(),
                    });
                }
            },
        };

        let id = self
            .table()
            .pending
            .remove(&response.seq)
            .ok_or(CodecError::InvalidSequence(response.seq))?;

        let header = Header::response(id, &response.error);
        let frames: [Option<&dyn WireMessage>; 2] = [Some(&header), message];
        let written = self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write_messages(&frames)
            .map_err(CodecError::from);
        if let Err(err) = written {
            // Nothing reached the stream, so the caller can still be answered.
            if err.is_unsent() {
                self.table().pending.insert(response.seq, id);
            }
            return Err(err);
        }

        trace!(method = %response.service_method, seq = response.seq, id, "wrote response");
        Ok(())
    }

    fn close(&self) -> Result<()> {
        debug!("closing server codec");
        self.conn.shutdown_conn()?;
        Ok(())
    }
}
