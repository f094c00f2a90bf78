//! Length-prefixed frame codec over a transport buffer.
//!
//! Every fill flushed to the wire is one frame: a 4-byte little-endian
//! length prefix (counting itself) followed by payload bytes. A
//! [`FrameCodec`] wraps a buffer for the duration of one read or write
//! pass; the first typed access of a pass skips or reserves the prefix,
//! and `end_write` backpatches it with the true fill length.

use crate::buffer::TransportBuffer;
use crate::error::ProtocolError;

/// Length of the frame prefix in bytes.
pub const FRAME_PREFIX_LEN: usize = 4;

/// Longest string the 2-byte length prefix can carry.
pub const MAX_STRING_LEN: usize = u16::MAX as usize;

/// Which pass, if any, this codec is currently serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    None,
    Read,
    Write,
}

/// Frame-level codec for one pass over a transport buffer.
///
/// Created fresh for each readiness event; the pass state does not outlive
/// the frame it serves.
#[derive(Debug)]
pub struct FrameCodec<'a> {
    buffer: &'a mut TransportBuffer,
    pass: Pass,
}

impl<'a> FrameCodec<'a> {
    /// Wrap a transport buffer for one frame pass.
    pub fn new(buffer: &'a mut TransportBuffer) -> Self {
        Self {
            buffer,
            pass: Pass::None,
        }
    }

    /// True exactly when one whole frame has arrived: at least the prefix
    /// is buffered and the declared length equals the bytes held.
    ///
    /// This is the condition that gates handing the fill to a message
    /// decoder.
    #[must_use]
    pub fn is_frame_complete(&self) -> bool {
        let fill = self.buffer.fill();
        if fill.len() < FRAME_PREFIX_LEN {
            return false;
        }
        let declared = u32::from_le_bytes([fill[0], fill[1], fill[2], fill[3]]);
        declared as usize == fill.len()
    }

    /// Start a write pass: reset the buffer and reserve the prefix.
    ///
    /// Idempotent within one pass, so a caller that already switched the
    /// codec to writing keeps appending to the same fill.
    pub fn begin_write(&mut self) -> Result<(), ProtocolError> {
        if self.pass != Pass::Write {
            self.buffer.reset();
            // Reserved span is backpatched by end_write.
            self.buffer.advance_write(FRAME_PREFIX_LEN)?;
            self.pass = Pass::Write;
        }
        Ok(())
    }

    /// Finish a write pass by backpatching the length prefix.
    pub fn end_write(&mut self) -> Result<(), ProtocolError> {
        let total = self.buffer.fill().len() as u32;
        self.buffer.overwrite(0, &total.to_le_bytes())
    }

    /// Start a read pass: skip the frame prefix. Idempotent within a pass.
    pub fn begin_read(&mut self) -> Result<(), ProtocolError> {
        if self.pass != Pass::Read {
            self.buffer.advance_read(FRAME_PREFIX_LEN)?;
            self.pass = Pass::Read;
        }
        Ok(())
    }

    /// Discard the consumed frame so the next one can be buffered.
    pub fn finish_frame(&mut self) {
        self.buffer.reset();
        self.pass = Pass::None;
    }

    /// Payload bytes still unread in this frame.
    #[must_use]
    pub fn available(&self) -> usize {
        self.buffer.available()
    }

    /// Bytes of payload capacity left in this fill.
    #[must_use]
    pub fn free_space(&self) -> usize {
        self.buffer.free_space()
    }

    /// Append raw payload bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        self.begin_write()?;
        self.buffer.write(bytes)
    }

    /// Borrow `n` raw payload bytes, advancing past them.
    pub fn read_slice(&mut self, n: usize) -> Result<&[u8], ProtocolError> {
        self.begin_read()?;
        self.buffer.read_slice(n)
    }

    /// Write a u8.
    pub fn write_u8(&mut self, v: u8) -> Result<(), ProtocolError> {
        self.write_bytes(&[v])
    }

    /// Write a little-endian u16.
    pub fn write_u16(&mut self, v: u16) -> Result<(), ProtocolError> {
        self.write_bytes(&v.to_le_bytes())
    }

    /// Write a little-endian u32.
    pub fn write_u32(&mut self, v: u32) -> Result<(), ProtocolError> {
        self.write_bytes(&v.to_le_bytes())
    }

    /// Write a little-endian u64.
    pub fn write_u64(&mut self, v: u64) -> Result<(), ProtocolError> {
        self.write_bytes(&v.to_le_bytes())
    }

    /// Read a u8.
    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.read_slice(1)?[0])
    }

    /// Read a little-endian u16.
    pub fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        let span = self.read_slice(2)?;
        Ok(u16::from_le_bytes([span[0], span[1]]))
    }

    /// Read a little-endian u32.
    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        let span = self.read_slice(4)?;
        Ok(u32::from_le_bytes([span[0], span[1], span[2], span[3]]))
    }

    /// Read a little-endian u64.
    pub fn read_u64(&mut self) -> Result<u64, ProtocolError> {
        let mut raw = [0u8; 8];
        self.begin_read()?;
        self.buffer.read_into(&mut raw)?;
        Ok(u64::from_le_bytes(raw))
    }

    /// Write a string as a 2-byte length prefix plus raw bytes.
    pub fn write_string(&mut self, s: &str) -> Result<(), ProtocolError> {
        if s.len() > MAX_STRING_LEN {
            return Err(ProtocolError::StringTooLong(s.len()));
        }
        self.write_u16(s.len() as u16)?;
        self.write_bytes(s.as_bytes())
    }

    /// Read a string written by [`write_string`](Self::write_string).
    pub fn read_string(&mut self) -> Result<String, ProtocolError> {
        let len = self.read_u16()? as usize;
        let span = self.read_slice(len)?;
        Ok(String::from_utf8_lossy(span).into_owned())
    }
}
