//! Socket transports for the JSON-RPC client.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::de::IgnoredAny;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use crate::protocol::{RESPONSE_MAX_BYTES, RpcError};

const READ_CHUNK_BYTES: usize = 4096;

/// Carries one encoded request to the backend and returns one encoded response.
///
/// Implementations must not retry: a call is delivered at most once.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn round_trip(&self, request: &[u8]) -> Result<Vec<u8>, RpcError>;
}

/// Connects to the SPDK RPC Unix socket, one connection per call.
#[derive(Debug, Clone)]
pub struct UnixTransport {
    path: PathBuf,
}

impl UnixTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Transport for UnixTransport {
    async fn round_trip(&self, request: &[u8]) -> Result<Vec<u8>, RpcError> {
        let mut stream = UnixStream::connect(&self.path).await?;
        stream.write_all(request).await?;
        stream.flush().await?;
        read_response(&mut stream).await
    }
}

/// Tracks bracket depth across reads to tell when a JSON value may be
/// complete, so the buffer is parsed once instead of after every read.
///
/// Only containers are tracked. A top-level scalar leaves the decision to
/// the parser.
#[derive(Debug, Default)]
struct ValueScanner {
    depth: usize,
    in_string: bool,
    escaped: bool,
    started: bool,
    done: bool,
}

impl ValueScanner {
    /// Scan newly read bytes. Returns true once the buffer is worth parsing.
    fn feed(&mut self, bytes: &[u8]) -> bool {
        for &b in bytes {
            if self.done {
                break;
            }
            if self.in_string {
                match b {
                    _ if self.escaped => self.escaped = false,
                    b'\\' => self.escaped = true,
                    b'"' => self.in_string = false,
                    _ => {}
                }
                continue;
            }
            match b {
                b'{' | b'[' => {
                    self.started = true;
                    self.depth += 1;
                }
                b'}' | b']' if self.started => {
                    self.depth -= 1;
                    self.done = self.depth == 0;
                }
                b'"' if self.started => self.in_string = true,
                b if b.is_ascii_whitespace() => {}
                _ if !self.started => self.done = true,
                _ => {}
            }
        }
        self.done
    }
}

/// Read from `stream` until the bytes form one complete JSON value.
///
/// SPDK does not frame its responses. Completeness is decided by bracket
/// depth, then confirmed by the parser: an EOF-class parse error means more
/// bytes are needed.
pub(crate) async fn read_response<S>(stream: &mut S) -> Result<Vec<u8>, RpcError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(READ_CHUNK_BYTES);
    let mut chunk = [0u8; READ_CHUNK_BYTES];
    let mut scanner = ValueScanner::default();
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(RpcError::ConnectionClosed);
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > RESPONSE_MAX_BYTES {
            return Err(RpcError::ResponseTooLarge {
                max_bytes: RESPONSE_MAX_BYTES,
            });
        }

        if !scanner.feed(&chunk[..n]) {
            continue;
        }
        match serde_json::from_slice::<IgnoredAny>(&buf) {
            Ok(_) => return Ok(buf),
            Err(e) if e.is_eof() => continue,
            Err(e) => return Err(e.into()),
        }
    }
}
