//! Single-threaded readiness loop over TCP connections.
//!
//! All connections are served on one thread: the loop runs inside a
//! `LocalSet` on a current-thread runtime and spawns a local task per
//! connection, so the shared handler (and through it the registry) is
//! reached through `Rc<RefCell<_>>` without any locking.
//!
//! Reads are frame-aware. The loop asks the connection how many bytes the
//! current frame still needs: at most the 4-byte length prefix until the
//! prefix is known, then exactly the declared remainder. The transport
//! buffer therefore never holds more than one inbound frame, and a frame
//! is handed to the handler only once it is complete.

use crate::error::ServerError;
use pakhub_protocol::{FRAME_PREFIX_LEN, ProtocolError, TransportBuffer};
use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// What the connection should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Keep receiving frames
    Read,
    /// Flush the buffered fill to the peer
    Write,
    /// Close after any pending flush
    Die,
}

/// Per-connection state: identity, fixed transport buffer, and the next
/// action requested by the handler.
#[derive(Debug)]
pub struct Connection {
    id: u64,
    peer: SocketAddr,
    buffer: TransportBuffer,
    state: ConnState,
}

impl Connection {
    pub(crate) fn new(id: u64, peer: SocketAddr, buffer_capacity: usize) -> Self {
        Self {
            id,
            peer,
            buffer: TransportBuffer::new(buffer_capacity),
            state: ConnState::Read,
        }
    }

    /// Loop-assigned connection id, unique for the server's lifetime.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Peer address, for logging.
    #[must_use]
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnState {
        self.state
    }

    /// Request the next action for this connection.
    pub fn set_state(&mut self, state: ConnState) {
        self.state = state;
    }

    /// The transport buffer, for the handler to decode from and encode into.
    pub fn buffer_mut(&mut self) -> &mut TransportBuffer {
        &mut self.buffer
    }

    /// How many bytes the current inbound frame still needs.
    ///
    /// Returns 0 once a whole frame is buffered. Fails when the declared
    /// length cannot describe a valid frame (too short to carry a payload
    /// byte, larger than the buffer, or shorter than what is already
    /// buffered).
    fn next_read_len(&self) -> Result<usize, ProtocolError> {
        let buffered = self.buffer.fill().len();
        if buffered < FRAME_PREFIX_LEN {
            return Ok(FRAME_PREFIX_LEN - buffered);
        }
        let fill = self.buffer.fill();
        let declared = u32::from_le_bytes([fill[0], fill[1], fill[2], fill[3]]) as usize;
        if declared <= FRAME_PREFIX_LEN || declared > self.buffer.capacity() || declared < buffered
        {
            return Err(ProtocolError::Framing(format!(
                "declared frame length {declared} outside 5..={}",
                self.buffer.capacity()
            )));
        }
        Ok(declared - buffered)
    }
}

/// Connection lifecycle callbacks, invoked from the loop thread only.
///
/// `on_read` fires once per complete inbound frame; `on_write` fires after
/// each fill has been flushed, with the buffer already reset for the next
/// one. The handler steers the connection by setting its state.
pub trait EventHandler {
    /// A connection was accepted.
    fn on_create(&mut self, conn: &mut Connection);
    /// A complete frame is buffered and ready to decode.
    fn on_read(&mut self, conn: &mut Connection);
    /// The previous fill was flushed; produce the next one or let the
    /// connection die.
    fn on_write(&mut self, conn: &mut Connection);
    /// The connection failed or was closed by the peer.
    fn on_error(&mut self, conn: &mut Connection);
}

/// Accept loop owning the listener and the shared handler.
pub struct EventLoop<H> {
    listener: TcpListener,
    handler: Rc<RefCell<H>>,
    buffer_capacity: usize,
    next_id: u64,
}

impl<H: EventHandler + 'static> EventLoop<H> {
    /// Wrap a bound listener and a handler.
    pub fn new(listener: TcpListener, handler: H, buffer_capacity: usize) -> Self {
        Self {
            listener,
            handler: Rc::new(RefCell::new(handler)),
            buffer_capacity,
            next_id: 0,
        }
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept and serve connections until the listener fails.
    ///
    /// Must run inside a `LocalSet`: each connection becomes a local task
    /// sharing the handler on the current thread.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Accept` when the listener breaks.
    pub async fn run(mut self) -> Result<(), ServerError> {
        loop {
            let (stream, peer) = self.listener.accept().await.map_err(ServerError::Accept)?;
            let id = self.next_id;
            self.next_id += 1;
            let conn = Connection::new(id, peer, self.buffer_capacity);
            let handler = Rc::clone(&self.handler);
            tokio::task::spawn_local(drive(stream, conn, handler));
        }
    }
}

/// Serve one connection until it dies.
async fn drive<H: EventHandler>(
    mut stream: TcpStream,
    mut conn: Connection,
    handler: Rc<RefCell<H>>,
) {
    handler.borrow_mut().on_create(&mut conn);

    loop {
        match conn.state() {
            ConnState::Read => {
                let want = match conn.next_read_len() {
                    Ok(0) => {
                        handler.borrow_mut().on_read(&mut conn);
                        continue;
                    }
                    Ok(want) => want,
                    Err(e) => {
                        tracing::warn!(conn = conn.id(), peer = %conn.peer(), "bad frame: {e}");
                        handler.borrow_mut().on_error(&mut conn);
                        break;
                    }
                };
                let read = {
                    let span = &mut conn.buffer.free_span_mut()[..want];
                    stream.read(span).await
                };
                match read {
                    Ok(0) => {
                        tracing::debug!(conn = conn.id(), "peer closed");
                        handler.borrow_mut().on_error(&mut conn);
                        break;
                    }
                    Ok(n) => {
                        if conn.buffer.advance_write(n).is_err() {
                            handler.borrow_mut().on_error(&mut conn);
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!(conn = conn.id(), "read failed: {e}");
                        handler.borrow_mut().on_error(&mut conn);
                        break;
                    }
                }
            }
            ConnState::Write => match stream.write_all(conn.buffer.used_span()).await {
                Ok(()) => {
                    conn.buffer.reset();
                    handler.borrow_mut().on_write(&mut conn);
                }
                Err(e) => {
                    tracing::debug!(conn = conn.id(), "write failed: {e}");
                    handler.borrow_mut().on_error(&mut conn);
                    break;
                }
            },
            ConnState::Die => {
                let _ = stream.shutdown().await;
                tracing::debug!(conn = conn.id(), "closed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn_with_fill(bytes: &[u8]) -> Connection {
        let peer = "127.0.0.1:9999".parse().unwrap();
        let mut conn = Connection::new(0, peer, 64);
        conn.buffer_mut().write(bytes).unwrap();
        conn
    }

    #[test]
    fn read_len_caps_at_prefix_until_known() {
        let conn = conn_with_fill(&[]);
        assert_eq!(conn.next_read_len().unwrap(), 4);

        let conn = conn_with_fill(&[10, 0, 0]);
        assert_eq!(conn.next_read_len().unwrap(), 1);
    }

    #[test]
    fn read_len_is_declared_remainder() {
        let mut frame = 10u32.to_le_bytes().to_vec();
        frame.extend_from_slice(&[1, 2]);
        let conn = conn_with_fill(&frame);
        assert_eq!(conn.next_read_len().unwrap(), 4);
    }

    #[test]
    fn complete_frame_needs_nothing() {
        let mut frame = 6u32.to_le_bytes().to_vec();
        frame.extend_from_slice(&[7, 8]);
        let conn = conn_with_fill(&frame);
        assert_eq!(conn.next_read_len().unwrap(), 0);
    }

    #[test]
    fn invalid_declared_lengths_rejected() {
        // Shorter than prefix + one payload byte.
        let conn = conn_with_fill(&4u32.to_le_bytes());
        assert!(conn.next_read_len().is_err());

        // Larger than the buffer capacity.
        let conn = conn_with_fill(&1000u32.to_le_bytes());
        assert!(conn.next_read_len().is_err());
    }
}
