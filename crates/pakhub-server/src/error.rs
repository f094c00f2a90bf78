//! Error types for the pakhub server.
//!
//! All errors use thiserror for consistent error handling across the codebase.

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Transport buffer too small to hold a minimal frame
    #[error("Buffer size {size} is below the minimum of {min} bytes")]
    BufferTooSmall {
        /// Configured buffer size
        size: usize,
        /// Smallest workable size
        min: usize,
    },

    /// Patch size cap set to zero
    #[error("Maximum patch size must be non-zero")]
    ZeroMaxPatchSize,
}

/// Disk-cache errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O failure against a cache path
    #[error("Cache I/O error at {path}: {source}")]
    Io {
        /// Path the operation targeted
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to start the persistence thread
    #[error("Failed to spawn cache worker thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Server runtime errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind the TCP listener
    #[error("Failed to bind to {addr}: {source}")]
    BindFailed {
        /// Address that failed to bind
        addr: SocketAddr,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Failed to accept an inbound connection
    #[error("Failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),

    /// Disk-cache error
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Server shutdown error
    #[error("Server shutdown error: {0}")]
    Shutdown(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_messages() {
        let err = ConfigError::BufferTooSmall { size: 16, min: 512 };
        assert_eq!(
            err.to_string(),
            "Buffer size 16 is below the minimum of 512 bytes"
        );
    }

    #[test]
    fn server_error_conversion() {
        let cache_err = CacheError::Spawn(std::io::Error::other("nope"));
        let server_err: ServerError = cache_err.into();
        assert!(server_err.to_string().contains("spawn cache worker"));
    }
}
