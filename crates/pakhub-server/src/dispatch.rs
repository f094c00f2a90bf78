//! Request dispatch over the event loop.
//!
//! One dispatcher serves every connection. Per connection it tracks at
//! most one in-flight exchange: either a request still decoding across
//! frames, or a response still encoding. A connection lives for exactly
//! one exchange; once the last response frame is flushed it is closed.
//!
//! The registry is mutated only after a request has fully decoded, so a
//! connection dropped mid-upload leaves no partial state behind.

use crate::cache::CacheHandle;
use crate::event_loop::{ConnState, Connection, EventHandler};
use crate::registry::PatchRegistry;
use pakhub_protocol::{
    DeletePatchResponse, FrameCodec, GetPatchesResponse, ListPatchesResponse, PatchStream,
    PatchSummary, ProtocolError, Request, Response, UploadPatchResponse,
};
use std::collections::HashMap;

/// The in-flight half of a connection's single exchange.
#[derive(Debug)]
enum Exchange {
    /// Request partially decoded
    Inbound(Request),
    /// Response partially encoded
    Outbound(Response),
}

/// Protocol handler: owns the registry and routes complete requests to it.
pub struct Dispatcher {
    registry: PatchRegistry,
    cache: CacheHandle,
    max_patch_size: u64,
    inflight: HashMap<u64, Exchange>,
}

impl Dispatcher {
    /// Dispatcher over a (possibly restored) registry.
    pub fn new(registry: PatchRegistry, cache: CacheHandle, max_patch_size: u64) -> Self {
        Self {
            registry,
            cache,
            max_patch_size,
            inflight: HashMap::new(),
        }
    }

    /// Decode the buffered frame, and on request completion execute it and
    /// start the response.
    fn handle_frame(&mut self, conn: &mut Connection) -> Result<(), ProtocolError> {
        let id = conn.id();
        let pending = self.inflight.remove(&id);

        let complete;
        let request = {
            let mut codec = FrameCodec::new(conn.buffer_mut());
            let mut request = match pending {
                Some(Exchange::Inbound(request)) => request,
                Some(Exchange::Outbound(_)) => {
                    return Err(ProtocolError::Framing(
                        "inbound frame while a response is in flight".to_string(),
                    ));
                }
                None => Request::peek(&mut codec, self.max_patch_size)?,
            };
            complete = request.read(&mut codec)?;
            codec.finish_frame();
            request
        };

        if !complete {
            self.inflight.insert(id, Exchange::Inbound(request));
            return Ok(());
        }

        tracing::debug!(conn = id, kind = %request.kind(), "request complete");
        let mut response = self.execute(request);

        let done = {
            let mut codec = FrameCodec::new(conn.buffer_mut());
            codec.begin_write()?;
            let done = response.write(&mut codec)?;
            codec.end_write()?;
            done
        };
        if !done {
            self.inflight.insert(id, Exchange::Outbound(response));
        }
        conn.set_state(ConnState::Write);
        Ok(())
    }

    /// Apply a complete request to the registry and build its response.
    fn execute(&mut self, request: Request) -> Response {
        match request {
            Request::List(_) => {
                let patches = self.registry.list();
                tracing::debug!(count = patches.len(), "listing patches");
                Response::List(ListPatchesResponse { patches })
            }
            Request::Upload(m) => {
                let key = m.body.key.clone();
                let count = m.body.patches.len();
                let metas = self.registry.upsert(key.clone(), m.body.patches.clone());
                // An empty upload stores nothing; no cache entry either.
                if !m.body.patches.is_empty() {
                    self.cache.store(key.clone(), m.body.patches);
                }
                tracing::info!(key = %key, count, "patches uploaded");
                Response::Upload(UploadPatchResponse {
                    patches: metas
                        .into_iter()
                        .map(|meta| PatchSummary {
                            name: meta.name,
                            size: meta.size,
                        })
                        .collect(),
                })
            }
            Request::Delete(m) => {
                let removed = self.registry.remove(&m.key);
                self.cache.remove(m.key.clone());
                tracing::info!(key = %m.key, count = removed.len(), "patches deleted");
                Response::Delete(DeletePatchResponse {
                    removed: removed
                        .into_iter()
                        .map(|patch| PatchSummary {
                            size: patch.size(),
                            name: patch.name,
                        })
                        .collect(),
                })
            }
            Request::Get(m) => {
                let patches = self.registry.get(&m.key);
                tracing::debug!(key = %m.key, count = patches.len(), "serving patches");
                Response::Get(GetPatchesResponse {
                    body: PatchStream::new(m.key, patches),
                })
            }
        }
    }
}

impl EventHandler for Dispatcher {
    fn on_create(&mut self, conn: &mut Connection) {
        tracing::debug!(conn = conn.id(), peer = %conn.peer(), "connection accepted");
    }

    fn on_read(&mut self, conn: &mut Connection) {
        if let Err(e) = self.handle_frame(conn) {
            tracing::warn!(conn = conn.id(), "protocol error: {e}");
            self.inflight.remove(&conn.id());
            conn.set_state(ConnState::Die);
        }
    }

    fn on_write(&mut self, conn: &mut Connection) {
        let id = conn.id();
        match self.inflight.remove(&id) {
            // Whole response flushed: the exchange is over.
            None => conn.set_state(ConnState::Die),
            Some(Exchange::Outbound(mut response)) => {
                let next = {
                    let mut codec = FrameCodec::new(conn.buffer_mut());
                    codec.begin_write().and_then(|()| {
                        let done = response.write(&mut codec)?;
                        codec.end_write()?;
                        Ok(done)
                    })
                };
                match next {
                    Ok(done) => {
                        if !done {
                            self.inflight.insert(id, Exchange::Outbound(response));
                        }
                        conn.set_state(ConnState::Write);
                    }
                    Err(e) => {
                        tracing::warn!(conn = id, "response encoding failed: {e}");
                        conn.set_state(ConnState::Die);
                    }
                }
            }
            Some(Exchange::Inbound(_)) => {
                tracing::warn!(conn = id, "write completion with a request in flight");
                conn.set_state(ConnState::Die);
            }
        }
    }

    fn on_error(&mut self, conn: &mut Connection) {
        self.inflight.remove(&conn.id());
        conn.set_state(ConnState::Die);
    }
}
