//! Client library for the pakhub patch distribution server.
//!
//! [`PatchClient`] drives one request/response exchange per call over a
//! fresh TCP connection, speaking the chunked wire protocol from
//! `pakhub-protocol`.
//!
//! # Example
//!
//! ```no_run
//! use pakhub_client::PatchClient;
//!
//! # async fn example() -> Result<(), pakhub_client::ClientError> {
//! let client = PatchClient::new("127.0.0.1", 1555);
//! for meta in client.list().await? {
//!     println!("{} {} ({} bytes)", meta.key, meta.name, meta.size);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod client;
pub mod error;

pub use client::PatchClient;
pub use error::ClientError;
