//! Socket transport — remote producers feeding a collector process.
//!
//! Wire format: each frame is a 4-byte big-endian length prefix followed by a
//! JSON payload. Payloads are either a serialized
//! [`JobData`](rotolog_core::job::JobData) or the [`PING_PAYLOAD`]
//! connectivity probe. The framing carries no version field; both ends of a
//! deployment ship together.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

pub mod client;
pub mod ingest;
pub mod queue;

pub use client::SocketTarget;
pub use ingest::SocketIngest;
pub use queue::IngestQueue;

/// Connectivity-probe payload: the JSON string `"ping"`, which can never be
/// confused with a job object.
pub const PING_PAYLOAD: &[u8] = b"\"ping\"";

/// Upper bound on a single frame. A length prefix beyond this is treated as a
/// corrupt stream, not as an allocation request.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Encodes one payload as a length-prefixed frame.
pub fn encode_frame(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    buf.freeze()
}

/// Reads one frame; `Ok(None)` on a clean end of stream.
///
/// An end of stream in the middle of a frame, or an oversized length prefix,
/// is an error.
pub async fn read_frame<R>(reader: &mut R) -> std::io::Result<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };
    if len > MAX_FRAME_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame length {len} exceeds limit {MAX_FRAME_LEN}"),
        ));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(Bytes::from(payload)))
}
