//! Synchronous request/response driver over the pakhub wire protocol.
//!
//! Each call opens a fresh connection and performs exactly one exchange:
//! the request is serialized through the fixed transport buffer and
//! flushed frame by frame, then response frames are read back one at a
//! time and fed to the decoder until it reports completion. There is no
//! pipelining; the server closes the connection after the exchange.

use crate::error::ClientError;
use pakhub_protocol::{
    DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_PATCH_SIZE, FRAME_PREFIX_LEN, FrameCodec, Kind, Patch,
    PatchKey, PatchMeta, PatchSummary, ProtocolError, Request, Response, Revision,
    TransportBuffer,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Client for one pakhub server.
#[derive(Debug, Clone)]
pub struct PatchClient {
    host: String,
    port: u16,
    buffer_size: usize,
    max_patch_size: u64,
}

impl PatchClient {
    /// Client for the server at `host:port`, with default buffer and
    /// patch-size settings.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            buffer_size: DEFAULT_BUFFER_CAPACITY,
            max_patch_size: DEFAULT_MAX_PATCH_SIZE,
        }
    }

    /// Use a different transport buffer size (one wire frame).
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Use a different cap on server-declared patch sizes.
    #[must_use]
    pub fn with_max_patch_size(mut self, max_patch_size: u64) -> Self {
        self.max_patch_size = max_patch_size;
        self
    }

    /// Fetch metadata for every patch the server holds.
    pub async fn list(&self) -> Result<Vec<PatchMeta>, ClientError> {
        match self.exchange(Request::list()).await? {
            Response::List(m) => Ok(m.patches),
            other => Err(unexpected(Kind::ListPatches, &other)),
        }
    }

    /// Download the full patches filed under a key. Empty when the server
    /// does not know the key.
    pub async fn download(
        &self,
        platform: &str,
        revision: Revision,
    ) -> Result<Vec<Patch>, ClientError> {
        let request = Request::get(PatchKey::new(platform, revision));
        match self.exchange(request).await? {
            Response::Get(m) => Ok(m.body.patches),
            other => Err(unexpected(Kind::GetPatches, &other)),
        }
    }

    /// Upload patches under a key, replacing same-named patches already
    /// stored there. Returns what the server now holds for the upload.
    pub async fn upload(
        &self,
        key: PatchKey,
        patches: Vec<Patch>,
    ) -> Result<Vec<PatchSummary>, ClientError> {
        let request = Request::upload(key, patches);
        match self.exchange(request).await? {
            Response::Upload(m) => Ok(m.patches),
            other => Err(unexpected(Kind::UploadPatch, &other)),
        }
    }

    /// Delete every patch under a key. Returns what was removed; empty
    /// when the key was unknown.
    pub async fn delete(
        &self,
        platform: &str,
        revision: Revision,
    ) -> Result<Vec<PatchSummary>, ClientError> {
        let request = Request::delete(PatchKey::new(platform, revision));
        match self.exchange(request).await? {
            Response::Delete(m) => Ok(m.removed),
            other => Err(unexpected(Kind::DeletePatch, &other)),
        }
    }

    /// One full request/response exchange on a fresh connection.
    async fn exchange(&self, mut request: Request) -> Result<Response, ClientError> {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|source| ClientError::Connect {
                host: self.host.clone(),
                port: self.port,
                source,
            })?;
        tracing::debug!(kind = %request.kind(), "sending request");

        let mut buffer = TransportBuffer::new(self.buffer_size);

        // Send every request frame.
        loop {
            let complete = {
                let mut codec = FrameCodec::new(&mut buffer);
                codec.begin_write()?;
                let complete = request.write(&mut codec)?;
                codec.end_write()?;
                complete
            };
            stream.write_all(buffer.used_span()).await?;
            buffer.reset();
            if complete {
                break;
            }
        }

        // Read response frames until the message completes.
        let mut response: Option<Response> = None;
        loop {
            buffer.reset();
            read_frame(&mut stream, &mut buffer).await?;
            let mut codec = FrameCodec::new(&mut buffer);
            let complete = match response.as_mut() {
                Some(r) => r.read(&mut codec)?,
                None => {
                    let mut r = Response::peek(&mut codec, self.max_patch_size)?;
                    let complete = r.read(&mut codec)?;
                    response = Some(r);
                    complete
                }
            };
            if complete {
                break;
            }
        }
        response.ok_or(ClientError::TruncatedResponse)
    }
}

/// Read exactly one frame into the buffer: the 4-byte prefix, then the
/// declared remainder.
async fn read_frame(
    stream: &mut TcpStream,
    buffer: &mut TransportBuffer,
) -> Result<(), ClientError> {
    let mut prefix = [0u8; FRAME_PREFIX_LEN];
    stream
        .read_exact(&mut prefix)
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => ClientError::TruncatedResponse,
            _ => ClientError::Io(e),
        })?;
    let declared = u32::from_le_bytes(prefix) as usize;
    if declared <= FRAME_PREFIX_LEN || declared > buffer.capacity() {
        return Err(ClientError::Protocol(ProtocolError::Framing(format!(
            "declared frame length {declared} outside 5..={}",
            buffer.capacity()
        ))));
    }
    buffer.write(&prefix)?;
    let body_len = declared - FRAME_PREFIX_LEN;
    {
        let span = &mut buffer.free_span_mut()[..body_len];
        stream.read_exact(span).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => ClientError::TruncatedResponse,
            _ => ClientError::Io(e),
        })?;
    }
    buffer.advance_write(body_len)?;
    Ok(())
}

fn unexpected(expected: Kind, response: &Response) -> ClientError {
    ClientError::UnexpectedResponse {
        expected,
        got: response.kind(),
    }
}
