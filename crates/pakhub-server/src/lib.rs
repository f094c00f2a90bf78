//! Patch distribution hub server.
//!
//! Serves the pakhub wire protocol over TCP: clients upload, list, fetch,
//! and delete sets of binary patches addressed by platform and revision.
//! All patch content lives in an in-memory registry owned by a
//! single-threaded event loop; a separate persistence worker mirrors
//! registry changes to a disk cache so content survives restarts.
//!
//! # Architecture
//!
//! - [`registry`]: in-memory patch store, lock-free on the loop thread
//! - [`event_loop`]: frame-aware readiness loop over TCP connections
//! - [`dispatch`]: decodes requests, applies them, streams responses
//! - [`cache`]: write-behind disk persistence on its own thread
//! - [`server`]: orchestration and shutdown
//!
//! # Example
//!
//! ```no_run
//! use pakhub_server::{Server, ServerConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::from_args();
//!     config.validate()?;
//!     Server::new(config)?.run().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod cache;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event_loop;
pub mod registry;
pub mod server;

pub use cache::{CacheCommand, CacheHandle, CacheWorker};
pub use config::ServerConfig;
pub use dispatch::Dispatcher;
pub use error::{CacheError, ConfigError, ServerError};
pub use event_loop::{ConnState, Connection, EventHandler, EventLoop};
pub use registry::PatchRegistry;
pub use server::Server;
