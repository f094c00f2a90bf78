//! Request and response messages with resumable encode/decode.
//!
//! Message kinds form a closed enumeration addressed by a 1-byte tag whose
//! ordinals are stable across client and server builds. Every message
//! supports an incremental contract:
//!
//! - `write` appends as much of the serialized form as fits in the current
//!   fill and returns `true` once the whole message has been produced.
//! - `read` is the inverse and returns `true` once fully consumed.
//! - `peek` consumes only the tag byte and constructs an empty instance of
//!   the matching variant, so a dispatcher can pick the right decoder for
//!   an unidentified inbound message.
//!
//! Simple messages always complete in one call and must fit a single
//! frame. Payload-bearing messages (`upload_patch` requests, `get_patches`
//! responses) stream their header once and then raw patch bytes across as
//! many fills as needed, tracked by a cursor over the patch list.

use crate::error::ProtocolError;
use crate::framing::FrameCodec;
use crate::patch::{Patch, PatchKey, PatchMeta, PatchSummary};
use bytes::BytesMut;
use std::fmt;

/// Default cap on a peer-declared patch size (256 MiB).
///
/// Receive-side storage is allocated up front from the declared size, so
/// the declaration is checked against this cap before any allocation.
pub const DEFAULT_MAX_PATCH_SIZE: u64 = 256 * 1024 * 1024;

/// Message kind tags. Ordinals are part of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Kind {
    /// List metadata for every stored patch
    ListPatches = 0,
    /// Store or replace patches under a key
    UploadPatch = 1,
    /// Remove every patch under a key
    DeletePatch = 2,
    /// Fetch full patches for a key
    GetPatches = 3,
}

impl Kind {
    /// Wire tag for this kind.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Decode a wire tag.
    pub fn from_tag(tag: u8) -> Result<Self, ProtocolError> {
        match tag {
            0 => Ok(Self::ListPatches),
            1 => Ok(Self::UploadPatch),
            2 => Ok(Self::DeletePatch),
            3 => Ok(Self::GetPatches),
            other => Err(ProtocolError::UnknownKind(other)),
        }
    }

    /// Human-readable name for logging.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ListPatches => "list_patches",
            Self::UploadPatch => "upload_patch",
            Self::DeletePatch => "delete_patch",
            Self::GetPatches => "get_patches",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A patch still being received: declared metadata plus the bytes
/// accumulated so far.
#[derive(Debug)]
struct IncomingPatch {
    name: String,
    size: u32,
    data: BytesMut,
}

/// Resumable payload body shared by upload requests and get responses.
///
/// The header (key, count, per-patch name and size) is produced and
/// consumed in the first pass; thereafter each pass drains
/// `min(bytes left in patch, bytes the buffer offers)` until the running
/// remainder hits zero. Crossing a patch boundary resets the per-patch
/// offset.
#[derive(Debug)]
pub struct PatchStream {
    /// Key the patches are filed under
    pub key: PatchKey,
    /// The complete patch set: populated by the sender up front, and by
    /// the receiver once the last byte has arrived
    pub patches: Vec<Patch>,
    max_patch_size: u64,
    header_done: bool,
    finished: bool,
    patch_idx: usize,
    offset: usize,
    remaining: u64,
    incoming: Vec<IncomingPatch>,
}

impl PatchStream {
    /// Body ready for sending.
    #[must_use]
    pub fn new(key: PatchKey, patches: Vec<Patch>) -> Self {
        Self {
            key,
            patches,
            ..Self::default()
        }
    }

    /// Empty body ready for receiving, with the given declared-size cap.
    #[must_use]
    pub fn empty(max_patch_size: u64) -> Self {
        Self {
            max_patch_size,
            ..Self::default()
        }
    }

    fn write(&mut self, io: &mut FrameCodec<'_>, kind: Kind) -> Result<bool, ProtocolError> {
        if !self.header_done {
            io.write_u8(kind.tag())?;
            io.write_string(&self.key.platform)?;
            io.write_u32(self.key.revision)?;
            if self.patches.len() > usize::from(u16::MAX) {
                return Err(ProtocolError::TooManyPatches(self.patches.len()));
            }
            io.write_u16(self.patches.len() as u16)?;
            for patch in &self.patches {
                io.write_string(&patch.name)?;
                let size =
                    u32::try_from(patch.data.len()).map_err(|_| ProtocolError::PatchTooLarge {
                        name: patch.name.clone(),
                        size: patch.data.len() as u64,
                        limit: u64::from(u32::MAX),
                    })?;
                io.write_u32(size)?;
                self.remaining += u64::from(size);
            }
            self.header_done = true;
        }

        while self.patch_idx < self.patches.len() {
            let data = &self.patches[self.patch_idx].data;
            let left = data.len() - self.offset;
            if left == 0 {
                self.offset = 0;
                self.patch_idx += 1;
                continue;
            }
            let take = left.min(io.free_space());
            if take == 0 {
                break;
            }
            io.write_bytes(&data[self.offset..self.offset + take])?;
            self.offset += take;
            self.remaining -= take as u64;
        }

        Ok(self.header_done && self.remaining == 0)
    }

    fn read(&mut self, io: &mut FrameCodec<'_>) -> Result<bool, ProtocolError> {
        if !self.header_done {
            self.key.platform = io.read_string()?;
            self.key.revision = io.read_u32()?;
            let count = io.read_u16()?;
            for _ in 0..count {
                let name = io.read_string()?;
                let size = io.read_u32()?;
                if u64::from(size) > self.max_patch_size {
                    return Err(ProtocolError::PatchTooLarge {
                        name,
                        size: u64::from(size),
                        limit: self.max_patch_size,
                    });
                }
                self.remaining += u64::from(size);
                self.incoming.push(IncomingPatch {
                    name,
                    size,
                    data: BytesMut::with_capacity(size as usize),
                });
            }
            self.header_done = true;
        }

        while self.patch_idx < self.incoming.len() {
            let pending = &mut self.incoming[self.patch_idx];
            let left = pending.size as usize - pending.data.len();
            if left == 0 {
                self.patch_idx += 1;
                continue;
            }
            let take = left.min(io.available());
            if take == 0 {
                break;
            }
            let chunk = io.read_slice(take)?;
            pending.data.extend_from_slice(chunk);
            self.remaining -= take as u64;
        }

        if self.header_done && self.remaining == 0 {
            if !self.finished {
                self.patches = self
                    .incoming
                    .drain(..)
                    .map(|p| Patch::new(p.name, p.data.freeze()))
                    .collect();
                self.finished = true;
            }
            return Ok(true);
        }
        Ok(false)
    }
}

impl Default for PatchStream {
    fn default() -> Self {
        Self {
            key: PatchKey::default(),
            patches: Vec::new(),
            max_patch_size: DEFAULT_MAX_PATCH_SIZE,
            header_done: false,
            finished: false,
            patch_idx: 0,
            offset: 0,
            remaining: 0,
            incoming: Vec::new(),
        }
    }
}

// The resume cursor is transient state; two bodies are equal when they
// carry the same key and patches.
impl PartialEq for PatchStream {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.patches == other.patches
    }
}

impl Eq for PatchStream {}

/// Request for the metadata of every stored patch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ListPatchesRequest;

/// Metadata of every stored patch; carries no payload bytes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ListPatchesResponse {
    /// One entry per stored patch, across all keys
    pub patches: Vec<PatchMeta>,
}

/// Request for the full patches filed under a key.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GetPatchesRequest {
    /// Key to fetch
    pub key: PatchKey,
}

/// Full patches for a key, streamed across as many frames as needed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct GetPatchesResponse {
    /// Streaming body
    pub body: PatchStream,
}

/// Store-or-replace upload, streamed across as many frames as needed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct UploadPatchRequest {
    /// Streaming body
    pub body: PatchStream,
}

/// Names and sizes now stored for an upload, echoed back as confirmation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UploadPatchResponse {
    /// One entry per uploaded patch
    pub patches: Vec<PatchSummary>,
}

/// Request to remove every patch under a key.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeletePatchRequest {
    /// Key to remove
    pub key: PatchKey,
}

/// Names and sizes of the patches a delete actually removed; empty when
/// the key was unknown.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeletePatchResponse {
    /// One entry per removed patch
    pub removed: Vec<PatchSummary>,
}

/// A client-to-server request message.
#[derive(Debug, PartialEq, Eq)]
pub enum Request {
    /// `list_patches` request
    List(ListPatchesRequest),
    /// `upload_patch` request
    Upload(UploadPatchRequest),
    /// `delete_patch` request
    Delete(DeletePatchRequest),
    /// `get_patches` request
    Get(GetPatchesRequest),
}

impl Request {
    /// List request.
    #[must_use]
    pub fn list() -> Self {
        Self::List(ListPatchesRequest)
    }

    /// Upload request for a set of patches under one key.
    #[must_use]
    pub fn upload(key: PatchKey, patches: Vec<Patch>) -> Self {
        Self::Upload(UploadPatchRequest {
            body: PatchStream::new(key, patches),
        })
    }

    /// Delete request for a key.
    #[must_use]
    pub fn delete(key: PatchKey) -> Self {
        Self::Delete(DeletePatchRequest { key })
    }

    /// Get request for a key.
    #[must_use]
    pub fn get(key: PatchKey) -> Self {
        Self::Get(GetPatchesRequest { key })
    }

    /// The kind tag of this request.
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Self::List(_) => Kind::ListPatches,
            Self::Upload(_) => Kind::UploadPatch,
            Self::Delete(_) => Kind::DeletePatch,
            Self::Get(_) => Kind::GetPatches,
        }
    }

    /// Consume only the tag byte and construct the matching empty request.
    pub fn peek(io: &mut FrameCodec<'_>, max_patch_size: u64) -> Result<Self, ProtocolError> {
        io.begin_read()?;
        match Kind::from_tag(io.read_u8()?)? {
            Kind::ListPatches => Ok(Self::List(ListPatchesRequest)),
            Kind::UploadPatch => Ok(Self::Upload(UploadPatchRequest {
                body: PatchStream::empty(max_patch_size),
            })),
            Kind::DeletePatch => Ok(Self::Delete(DeletePatchRequest::default())),
            Kind::GetPatches => Ok(Self::Get(GetPatchesRequest::default())),
        }
    }

    /// Append as much of this request as fits in the current fill.
    ///
    /// Returns `true` once the whole message has been serialized. The
    /// first call emits the tag byte.
    pub fn write(&mut self, io: &mut FrameCodec<'_>) -> Result<bool, ProtocolError> {
        match self {
            Self::List(_) => {
                io.write_u8(Kind::ListPatches.tag())?;
                Ok(true)
            }
            Self::Upload(m) => m.body.write(io, Kind::UploadPatch),
            Self::Delete(m) => {
                io.write_u8(Kind::DeletePatch.tag())?;
                io.write_u32(m.key.revision)?;
                io.write_string(&m.key.platform)?;
                Ok(true)
            }
            Self::Get(m) => {
                io.write_u8(Kind::GetPatches.tag())?;
                io.write_u32(m.key.revision)?;
                io.write_string(&m.key.platform)?;
                Ok(true)
            }
        }
    }

    /// Consume as much of this request as the current fill offers.
    ///
    /// Returns `true` once fully deserialized. The tag byte is expected to
    /// have been consumed by [`peek`](Self::peek).
    pub fn read(&mut self, io: &mut FrameCodec<'_>) -> Result<bool, ProtocolError> {
        io.begin_read()?;
        match self {
            Self::List(_) => Ok(true),
            Self::Upload(m) => m.body.read(io),
            Self::Delete(m) => {
                m.key.revision = io.read_u32()?;
                m.key.platform = io.read_string()?;
                Ok(true)
            }
            Self::Get(m) => {
                m.key.revision = io.read_u32()?;
                m.key.platform = io.read_string()?;
                Ok(true)
            }
        }
    }
}

/// A server-to-client response message.
#[derive(Debug, PartialEq, Eq)]
pub enum Response {
    /// `list_patches` response
    List(ListPatchesResponse),
    /// `upload_patch` response
    Upload(UploadPatchResponse),
    /// `delete_patch` response
    Delete(DeletePatchResponse),
    /// `get_patches` response
    Get(GetPatchesResponse),
}

impl Response {
    /// The kind tag of this response.
    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            Self::List(_) => Kind::ListPatches,
            Self::Upload(_) => Kind::UploadPatch,
            Self::Delete(_) => Kind::DeletePatch,
            Self::Get(_) => Kind::GetPatches,
        }
    }

    /// Consume only the tag byte and construct the matching empty response.
    pub fn peek(io: &mut FrameCodec<'_>, max_patch_size: u64) -> Result<Self, ProtocolError> {
        io.begin_read()?;
        match Kind::from_tag(io.read_u8()?)? {
            Kind::ListPatches => Ok(Self::List(ListPatchesResponse::default())),
            Kind::UploadPatch => Ok(Self::Upload(UploadPatchResponse::default())),
            Kind::DeletePatch => Ok(Self::Delete(DeletePatchResponse::default())),
            Kind::GetPatches => Ok(Self::Get(GetPatchesResponse {
                body: PatchStream::empty(max_patch_size),
            })),
        }
    }

    /// Append as much of this response as fits in the current fill.
    ///
    /// Returns `true` once the whole message has been serialized. The
    /// first call emits the tag byte.
    pub fn write(&mut self, io: &mut FrameCodec<'_>) -> Result<bool, ProtocolError> {
        match self {
            Self::List(m) => {
                io.write_u8(Kind::ListPatches.tag())?;
                if m.patches.len() > usize::from(u16::MAX) {
                    return Err(ProtocolError::TooManyPatches(m.patches.len()));
                }
                io.write_u16(m.patches.len() as u16)?;
                for meta in &m.patches {
                    io.write_string(&meta.name)?;
                    io.write_u32(meta.key.revision)?;
                    io.write_string(&meta.key.platform)?;
                    io.write_u64(meta.size)?;
                }
                Ok(true)
            }
            Self::Upload(m) => {
                io.write_u8(Kind::UploadPatch.tag())?;
                write_summaries(io, &m.patches)?;
                Ok(true)
            }
            Self::Delete(m) => {
                io.write_u8(Kind::DeletePatch.tag())?;
                write_summaries(io, &m.removed)?;
                Ok(true)
            }
            Self::Get(m) => m.body.write(io, Kind::GetPatches),
        }
    }

    /// Consume as much of this response as the current fill offers.
    ///
    /// Returns `true` once fully deserialized. The tag byte is expected to
    /// have been consumed by [`peek`](Self::peek).
    pub fn read(&mut self, io: &mut FrameCodec<'_>) -> Result<bool, ProtocolError> {
        io.begin_read()?;
        match self {
            Self::List(m) => {
                let count = io.read_u16()?;
                for _ in 0..count {
                    let name = io.read_string()?;
                    let revision = io.read_u32()?;
                    let platform = io.read_string()?;
                    let size = io.read_u64()?;
                    m.patches.push(PatchMeta {
                        name,
                        key: PatchKey::new(platform, revision),
                        size,
                    });
                }
                Ok(true)
            }
            Self::Upload(m) => {
                m.patches = read_summaries(io)?;
                Ok(true)
            }
            Self::Delete(m) => {
                m.removed = read_summaries(io)?;
                Ok(true)
            }
            Self::Get(m) => m.body.read(io),
        }
    }
}

fn write_summaries(
    io: &mut FrameCodec<'_>,
    summaries: &[PatchSummary],
) -> Result<(), ProtocolError> {
    if summaries.len() > usize::from(u16::MAX) {
        return Err(ProtocolError::TooManyPatches(summaries.len()));
    }
    io.write_u16(summaries.len() as u16)?;
    for summary in summaries {
        io.write_string(&summary.name)?;
        io.write_u64(summary.size)?;
    }
    Ok(())
}

fn read_summaries(io: &mut FrameCodec<'_>) -> Result<Vec<PatchSummary>, ProtocolError> {
    let count = io.read_u16()?;
    let mut summaries = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let name = io.read_string()?;
        let size = io.read_u64()?;
        summaries.push(PatchSummary { name, size });
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::TransportBuffer;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn encode_request(request: &mut Request, capacity: usize) -> Vec<Vec<u8>> {
        let mut buffer = TransportBuffer::new(capacity);
        let mut frames = Vec::new();
        loop {
            let complete = {
                let mut codec = FrameCodec::new(&mut buffer);
                codec.begin_write().unwrap();
                let complete = request.write(&mut codec).unwrap();
                codec.end_write().unwrap();
                complete
            };
            frames.push(buffer.fill().to_vec());
            buffer.reset();
            if complete {
                break;
            }
        }
        frames
    }

    fn decode_request(frames: &[Vec<u8>], capacity: usize, limit: u64) -> Request {
        let mut buffer = TransportBuffer::new(capacity);
        let mut request: Option<Request> = None;
        let mut complete = false;
        for frame in frames {
            buffer.reset();
            buffer.write(frame).unwrap();
            let mut codec = FrameCodec::new(&mut buffer);
            assert!(codec.is_frame_complete());
            let current = match request.as_mut() {
                Some(r) => r,
                None => {
                    request = Some(Request::peek(&mut codec, limit).unwrap());
                    request.as_mut().unwrap()
                }
            };
            complete = current.read(&mut codec).unwrap();
        }
        assert!(complete, "message incomplete after all frames");
        request.unwrap()
    }

    fn encode_response(response: &mut Response, capacity: usize) -> Vec<Vec<u8>> {
        let mut buffer = TransportBuffer::new(capacity);
        let mut frames = Vec::new();
        loop {
            let complete = {
                let mut codec = FrameCodec::new(&mut buffer);
                codec.begin_write().unwrap();
                let complete = response.write(&mut codec).unwrap();
                codec.end_write().unwrap();
                complete
            };
            frames.push(buffer.fill().to_vec());
            buffer.reset();
            if complete {
                break;
            }
        }
        frames
    }

    fn decode_response(frames: &[Vec<u8>], capacity: usize, limit: u64) -> Response {
        let mut buffer = TransportBuffer::new(capacity);
        let mut response: Option<Response> = None;
        let mut complete = false;
        for frame in frames {
            buffer.reset();
            buffer.write(frame).unwrap();
            let mut codec = FrameCodec::new(&mut buffer);
            assert!(codec.is_frame_complete());
            let current = match response.as_mut() {
                Some(r) => r,
                None => {
                    response = Some(Response::peek(&mut codec, limit).unwrap());
                    response.as_mut().unwrap()
                }
            };
            complete = current.read(&mut codec).unwrap();
        }
        assert!(complete, "message incomplete after all frames");
        response.unwrap()
    }

    #[test]
    fn tag_ordinals_are_stable() {
        assert_eq!(Kind::ListPatches.tag(), 0);
        assert_eq!(Kind::UploadPatch.tag(), 1);
        assert_eq!(Kind::DeletePatch.tag(), 2);
        assert_eq!(Kind::GetPatches.tag(), 3);
        for tag in 0..4 {
            assert_eq!(Kind::from_tag(tag).unwrap().tag(), tag);
        }
    }

    #[test]
    fn unknown_tag_rejected() {
        assert!(matches!(
            Kind::from_tag(9),
            Err(ProtocolError::UnknownKind(9))
        ));
    }

    #[test]
    fn list_request_round_trip() {
        let mut request = Request::list();
        let frames = encode_request(&mut request, 64);
        assert_eq!(frames.len(), 1);
        let decoded = decode_request(&frames, 64, DEFAULT_MAX_PATCH_SIZE);
        assert_eq!(decoded, Request::list());
    }

    #[test]
    fn get_and_delete_request_round_trip() {
        let key = PatchKey::new("PlatformX", 42);

        let mut request = Request::get(key.clone());
        let frames = encode_request(&mut request, 64);
        assert_eq!(decode_request(&frames, 64, 0), Request::get(key.clone()));

        let mut request = Request::delete(key.clone());
        let frames = encode_request(&mut request, 64);
        assert_eq!(decode_request(&frames, 64, 0), Request::delete(key));
    }

    #[test]
    fn upload_request_round_trip_one_frame() {
        let key = PatchKey::new("Win", 7);
        let patches = vec![
            Patch::new("a.pak", Bytes::from_static(b"alpha")),
            Patch::new("b.pak", Bytes::from_static(b"bravo")),
        ];
        let mut request = Request::upload(key.clone(), patches.clone());
        let frames = encode_request(&mut request, 8192);
        assert_eq!(frames.len(), 1);

        match decode_request(&frames, 8192, DEFAULT_MAX_PATCH_SIZE) {
            Request::Upload(m) => {
                assert_eq!(m.body.key, key);
                assert_eq!(m.body.patches, patches);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn upload_request_round_trip_fragmented() {
        let key = PatchKey::new("PlatformX", 42);
        let patches = vec![
            Patch::new("empty.pak", Bytes::new()),
            Patch::new("mid.pak", Bytes::from(vec![0xa5u8; 500])),
            Patch::new("one.pak", Bytes::from_static(b"z")),
        ];
        let mut request = Request::upload(key.clone(), patches.clone());

        // A 64-byte buffer forces the payload across many fills.
        let frames = encode_request(&mut request, 64);
        assert!(frames.len() > 1);
        for frame in &frames {
            assert!(frame.len() <= 64);
        }

        match decode_request(&frames, 64, DEFAULT_MAX_PATCH_SIZE) {
            Request::Upload(m) => {
                assert_eq!(m.body.key, key);
                assert_eq!(m.body.patches, patches);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn get_response_round_trip_fragmented() {
        let key = PatchKey::new("PlatformX", 42);
        let content: Vec<u8> = (0..31013u32).map(|i| (i % 251) as u8).collect();
        let patches = vec![
            Patch::new("big.pak", Bytes::from(content)),
            Patch::new("tiny.pak", Bytes::from_static(b"!")),
        ];
        let mut response = Response::Get(GetPatchesResponse {
            body: PatchStream::new(key.clone(), patches.clone()),
        });

        let frames = encode_response(&mut response, 4096);
        assert!(frames.len() > 1);

        match decode_response(&frames, 4096, DEFAULT_MAX_PATCH_SIZE) {
            Response::Get(m) => {
                assert_eq!(m.body.key, key);
                assert_eq!(m.body.patches, patches);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn list_response_round_trip() {
        let mut response = Response::List(ListPatchesResponse {
            patches: vec![
                PatchMeta {
                    name: "a.pak".to_string(),
                    key: PatchKey::new("Win", 7),
                    size: 1024,
                },
                PatchMeta {
                    name: "b.pak".to_string(),
                    key: PatchKey::new("Mac", 9),
                    size: 0,
                },
            ],
        });
        let frames = encode_response(&mut response, 8192);
        assert_eq!(frames.len(), 1);
        let decoded = decode_response(&frames, 8192, 0);
        assert_eq!(decoded, response);
    }

    #[test]
    fn upload_and_delete_response_round_trip() {
        let summaries = vec![
            PatchSummary {
                name: "a.pak".to_string(),
                size: 100,
            },
            PatchSummary {
                name: "b.pak".to_string(),
                size: u64::from(u32::MAX) + 1,
            },
        ];

        let mut response = Response::Upload(UploadPatchResponse {
            patches: summaries.clone(),
        });
        let frames = encode_response(&mut response, 8192);
        assert_eq!(decode_response(&frames, 8192, 0), response);

        let mut response = Response::Delete(DeletePatchResponse {
            removed: summaries,
        });
        let frames = encode_response(&mut response, 8192);
        assert_eq!(decode_response(&frames, 8192, 0), response);
    }

    #[test]
    fn oversized_declared_size_rejected() {
        let key = PatchKey::new("Win", 1);
        let patches = vec![Patch::new("big.pak", Bytes::from(vec![0u8; 64]))];
        let mut request = Request::upload(key, patches);
        let frames = encode_request(&mut request, 8192);

        let mut buffer = TransportBuffer::new(8192);
        buffer.write(&frames[0]).unwrap();
        let mut codec = FrameCodec::new(&mut buffer);
        let mut decoded = Request::peek(&mut codec, 16).unwrap();
        assert!(matches!(
            decoded.read(&mut codec),
            Err(ProtocolError::PatchTooLarge { size: 64, limit: 16, .. })
        ));
    }

    #[test]
    fn zero_size_patches_complete_without_payload() {
        let key = PatchKey::new("Win", 3);
        let patches = vec![
            Patch::new("a.pak", Bytes::new()),
            Patch::new("b.pak", Bytes::new()),
        ];
        let mut request = Request::upload(key, patches.clone());
        let frames = encode_request(&mut request, 128);
        assert_eq!(frames.len(), 1);

        match decode_request(&frames, 128, DEFAULT_MAX_PATCH_SIZE) {
            Request::Upload(m) => assert_eq!(m.body.patches, patches),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn upload_round_trip_is_fragmentation_invariant(
            first in proptest::collection::vec(any::<u8>(), 0..2048),
            second in proptest::collection::vec(any::<u8>(), 0..2048),
            capacity in 64usize..512,
        ) {
            let key = PatchKey::new("Plat", 11);
            let patches = vec![
                Patch::new("p0", Bytes::from(first)),
                Patch::new("p1", Bytes::from(second)),
            ];
            let mut request = Request::upload(key.clone(), patches.clone());
            let frames = encode_request(&mut request, capacity);
            match decode_request(&frames, capacity, DEFAULT_MAX_PATCH_SIZE) {
                Request::Upload(m) => {
                    prop_assert_eq!(m.body.key, key);
                    prop_assert_eq!(m.body.patches, patches);
                }
                other => prop_assert!(false, "unexpected variant: {:?}", other),
            }
        }
    }
}
