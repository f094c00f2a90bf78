//! Error types for the pakhub client.

use pakhub_protocol::{Kind, ProtocolError};
use thiserror::Error;

/// Client-side errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Failed to reach the server
    #[error("Failed to connect to {host}:{port}: {source}")]
    Connect {
        /// Server hostname
        host: String,
        /// Server port
        port: u16,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// I/O failure mid-exchange
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire protocol violation
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Connection closed before the response completed
    #[error("Connection closed before the response completed")]
    TruncatedResponse,

    /// Server answered with the wrong message kind
    #[error("Expected a {expected} response, got {got}")]
    UnexpectedResponse {
        /// Kind the request called for
        expected: Kind,
        /// Kind the server sent
        got: Kind,
    },
}
