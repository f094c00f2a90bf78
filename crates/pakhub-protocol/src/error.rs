//! Error types for the pakhub wire protocol.
//!
//! All errors use thiserror for consistent error handling across the codebase.
//! Protocol errors are fatal to the connection they occur on, never to the
//! process.

use thiserror::Error;

/// Errors produced by the transport buffer and message codecs.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Write past the end of the fixed transport buffer
    #[error("transport buffer full: needed {needed} bytes, {free} free")]
    BufferFull {
        /// Bytes the caller tried to write
        needed: usize,
        /// Bytes of capacity remaining
        free: usize,
    },

    /// Read past the bytes currently buffered
    #[error("transport buffer underrun: needed {needed} bytes, {available} available")]
    Underrun {
        /// Bytes the caller tried to read
        needed: usize,
        /// Bytes currently available
        available: usize,
    },

    /// Malformed frame or a fill that cannot satisfy the framing discipline
    #[error("framing error: {0}")]
    Framing(String),

    /// Message tag byte outside the closed enumeration
    #[error("unknown message kind: {0:#04x}")]
    UnknownKind(u8),

    /// Peer declared a patch larger than the configured cap
    #[error("patch '{name}' declares {size} bytes, limit is {limit}")]
    PatchTooLarge {
        /// Name of the offending patch
        name: String,
        /// Declared size in bytes
        size: u64,
        /// Configured maximum in bytes
        limit: u64,
    },

    /// String exceeds the 2-byte length prefix
    #[error("string of {0} bytes exceeds the 65535-byte wire limit")]
    StringTooLong(usize),

    /// More patches in one message than the 2-byte count field can carry
    #[error("{0} patches exceed the 65535-entry wire limit")]
    TooManyPatches(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages() {
        let err = ProtocolError::UnknownKind(0x2a);
        assert_eq!(err.to_string(), "unknown message kind: 0x2a");

        let err = ProtocolError::PatchTooLarge {
            name: "a.pak".to_string(),
            size: 512,
            limit: 256,
        };
        assert_eq!(err.to_string(), "patch 'a.pak' declares 512 bytes, limit is 256");
    }
}
