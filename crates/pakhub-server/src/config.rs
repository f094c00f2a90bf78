//! Server configuration management.
//!
//! Configuration can be provided via:
//! - CLI arguments (`--bind`, `--cache-dir`, etc.)
//! - Environment variables (`PAKHUB_BIND`, etc.)
//! - Default values
//!
//! # Example
//!
//! ```no_run
//! use pakhub_server::ServerConfig;
//!
//! let config = ServerConfig::from_args();
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server will bind to: {}", config.bind);
//! println!("Cache directory: {}", config.cache_dir.display());
//! ```

use clap::Parser;
use pakhub_protocol::{DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_PATCH_SIZE};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Smallest workable transport buffer: the frame prefix plus room for a
/// maximal simple-message header.
pub const MIN_BUFFER_SIZE: usize = 512;

/// Server configuration loaded from CLI args and environment variables.
#[derive(Debug, Clone, Parser)]
#[command(name = "pakhub-server", about = "Patch distribution hub server", version)]
pub struct ServerConfig {
    /// TCP bind address
    #[arg(long, env = "PAKHUB_BIND", default_value = "0.0.0.0:1555")]
    pub bind: SocketAddr,

    /// Disk-cache root directory
    #[arg(long, env = "PAKHUB_CACHE_DIR", default_value = "./cache")]
    pub cache_dir: PathBuf,

    /// Per-connection transport buffer size in bytes (one wire frame)
    #[arg(long, env = "PAKHUB_BUFFER_SIZE", default_value_t = DEFAULT_BUFFER_CAPACITY)]
    pub buffer_size: usize,

    /// Largest accepted declared patch size in bytes
    #[arg(long, env = "PAKHUB_MAX_PATCH_SIZE", default_value_t = DEFAULT_MAX_PATCH_SIZE)]
    pub max_patch_size: u64,
}

impl ServerConfig {
    /// Parse configuration from command-line arguments.
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the buffer size cannot hold a minimal
    /// frame or the patch size cap is zero.
    pub fn validate(&self) -> Result<(), crate::error::ConfigError> {
        use crate::error::ConfigError;

        if self.buffer_size < MIN_BUFFER_SIZE {
            return Err(ConfigError::BufferTooSmall {
                size: self.buffer_size,
                min: MIN_BUFFER_SIZE,
            });
        }
        if self.max_patch_size == 0 {
            return Err(ConfigError::ZeroMaxPatchSize);
        }
        Ok(())
    }
}
