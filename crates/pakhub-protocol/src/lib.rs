//! Wire protocol for the pakhub patch distribution service.
//!
//! This crate implements the chunked, resumable binary protocol shared by
//! the pakhub server and client:
//! - `buffer`: fixed-capacity transport buffer with explicit cursors
//! - `framing`: length-prefixed frame codec with typed primitives
//! - `message`: request/response messages with incremental encode/decode
//! - `patch`: the patch data model and registry key addressing
//!
//! # Resumable messages
//!
//! A patch payload can be larger than one transport buffer, so
//! payload-bearing messages encode and decode across many buffer fills.
//! Each `write`/`read` call processes at most one buffer's worth of bytes
//! and reports whether the message is complete, letting an event loop
//! drive the codec one readiness event at a time without blocking.
//!
//! # Example
//!
//! ```
//! use pakhub_protocol::{
//!     DEFAULT_MAX_PATCH_SIZE, FrameCodec, Request, TransportBuffer,
//! };
//!
//! # fn main() -> Result<(), pakhub_protocol::ProtocolError> {
//! let mut buffer = TransportBuffer::new(8192);
//! let mut request = Request::list();
//!
//! // Encode one frame.
//! let mut codec = FrameCodec::new(&mut buffer);
//! codec.begin_write()?;
//! assert!(request.write(&mut codec)?);
//! codec.end_write()?;
//!
//! // The peer decodes it from the same bytes.
//! let mut codec = FrameCodec::new(&mut buffer);
//! assert!(codec.is_frame_complete());
//! let mut decoded = Request::peek(&mut codec, DEFAULT_MAX_PATCH_SIZE)?;
//! assert!(decoded.read(&mut codec)?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod buffer;
pub mod error;
pub mod framing;
pub mod message;
pub mod patch;

pub use buffer::{DEFAULT_BUFFER_CAPACITY, TransportBuffer};
pub use error::ProtocolError;
pub use framing::{FRAME_PREFIX_LEN, FrameCodec, MAX_STRING_LEN};
pub use message::{
    DEFAULT_MAX_PATCH_SIZE, DeletePatchRequest, DeletePatchResponse, GetPatchesRequest,
    GetPatchesResponse, Kind, ListPatchesRequest, ListPatchesResponse, PatchStream, Request,
    Response, UploadPatchRequest, UploadPatchResponse,
};
pub use patch::{Patch, PatchKey, PatchMeta, PatchSummary, Revision};
