//! Fixed-capacity transport buffer.
//!
//! One buffer holds exactly one wire frame at a time. Capacity is fixed at
//! construction: this caps per-chunk protocol overhead and bounds the memory
//! held per connection. The buffer tracks a read cursor and a write cursor
//! and exposes the raw spans between them so socket I/O can happen without
//! an extra copy, with `advance_read`/`advance_write` accounting for bytes
//! moved by the caller.

use crate::error::ProtocolError;

/// Default buffer capacity in bytes (one wire frame).
pub const DEFAULT_BUFFER_CAPACITY: usize = 8192;

/// Reusable fixed-capacity byte buffer with explicit cursors.
#[derive(Debug)]
pub struct TransportBuffer {
    storage: Box<[u8]>,
    read_pos: usize,
    write_pos: usize,
}

impl TransportBuffer {
    /// Create a buffer with the given fixed capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            read_pos: 0,
            write_pos: 0,
        }
    }

    /// Total capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Bytes written but not yet read.
    #[must_use]
    pub fn available(&self) -> usize {
        self.write_pos - self.read_pos
    }

    /// Bytes of capacity left for writing.
    #[must_use]
    pub fn free_space(&self) -> usize {
        self.storage.len() - self.write_pos
    }

    /// The whole fill so far, from the start of the buffer to the write
    /// cursor, regardless of how much has been read back out.
    #[must_use]
    pub fn fill(&self) -> &[u8] {
        &self.storage[..self.write_pos]
    }

    /// Append bytes at the write cursor.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        if bytes.len() > self.free_space() {
            return Err(ProtocolError::BufferFull {
                needed: bytes.len(),
                free: self.free_space(),
            });
        }
        self.storage[self.write_pos..self.write_pos + bytes.len()].copy_from_slice(bytes);
        self.write_pos += bytes.len();
        Ok(())
    }

    /// Copy `out.len()` bytes from the read cursor into `out`.
    pub fn read_into(&mut self, out: &mut [u8]) -> Result<(), ProtocolError> {
        let span = self.read_slice(out.len())?;
        out.copy_from_slice(span);
        Ok(())
    }

    /// Borrow `n` bytes at the read cursor, advancing past them.
    pub fn read_slice(&mut self, n: usize) -> Result<&[u8], ProtocolError> {
        if n > self.available() {
            return Err(ProtocolError::Underrun {
                needed: n,
                available: self.available(),
            });
        }
        let span = &self.storage[self.read_pos..self.read_pos + n];
        self.read_pos += n;
        Ok(span)
    }

    /// Overwrite bytes at an absolute position inside the current fill.
    ///
    /// Used to backpatch the frame length prefix after the fill is known.
    pub fn overwrite(&mut self, pos: usize, bytes: &[u8]) -> Result<(), ProtocolError> {
        if pos + bytes.len() > self.write_pos {
            return Err(ProtocolError::Underrun {
                needed: pos + bytes.len(),
                available: self.write_pos,
            });
        }
        self.storage[pos..pos + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// The valid unread bytes, for zero-copy writes to a socket.
    #[must_use]
    pub fn used_span(&self) -> &[u8] {
        &self.storage[self.read_pos..self.write_pos]
    }

    /// The free tail of the buffer, for zero-copy reads from a socket.
    pub fn free_span_mut(&mut self) -> &mut [u8] {
        &mut self.storage[self.write_pos..]
    }

    /// Account for `n` bytes the caller read out of `used_span` directly.
    pub fn advance_read(&mut self, n: usize) -> Result<(), ProtocolError> {
        if n > self.available() {
            return Err(ProtocolError::Underrun {
                needed: n,
                available: self.available(),
            });
        }
        self.read_pos += n;
        Ok(())
    }

    /// Account for `n` bytes the caller wrote into `free_span_mut` directly.
    pub fn advance_write(&mut self, n: usize) -> Result<(), ProtocolError> {
        if n > self.free_space() {
            return Err(ProtocolError::BufferFull {
                needed: n,
                free: self.free_space(),
            });
        }
        self.write_pos += n;
        Ok(())
    }

    /// Reset both cursors for the next fill. Does not zero the storage.
    pub fn reset(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
    }
}
