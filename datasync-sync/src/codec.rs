//! Binary framing of chunks for byte streams.
//!
//! Every frame is length prefixed, all integers big-endian:
//!
//! ```text
//! u32 frame_len | 16B session | u32 index | u32 total | u16 name_len | name | payload
//! ```
//!
//! `frame_len` counts the bytes after itself.

use crate::error::{SyncError, SyncResult};
use crate::protocol::Chunk;
use datasync_types::SessionId;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame size (1 MiB), length prefix excluded.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Fixed part of a frame: session, index, total and name length.
pub const HEADER_LEN: usize = 16 + 4 + 4 + 2;

/// Largest chunk payload that fits a frame whatever the dataset name.
pub const MAX_PAYLOAD_SIZE: usize = MAX_FRAME_SIZE - HEADER_LEN - u16::MAX as usize;

/// Encodes a chunk into a frame body (without the length prefix).
pub fn encode_chunk(chunk: &Chunk) -> SyncResult<Vec<u8>> {
    let name = chunk.dataset_type.as_bytes();
    let name_len = u16::try_from(name.len()).map_err(|_| {
        SyncError::Protocol(format!("dataset name too long: {} bytes", name.len()))
    })?;

    let len = HEADER_LEN + name.len() + chunk.payload.len();
    if len > MAX_FRAME_SIZE {
        return Err(SyncError::Protocol(format!("frame too large: {len} bytes")));
    }

    let mut buf = Vec::with_capacity(len);
    buf.extend_from_slice(chunk.session_id.as_bytes());
    buf.extend_from_slice(&chunk.index.to_be_bytes());
    buf.extend_from_slice(&chunk.total.to_be_bytes());
    buf.extend_from_slice(&name_len.to_be_bytes());
    buf.extend_from_slice(name);
    buf.extend_from_slice(&chunk.payload);
    Ok(buf)
}

/// Decodes a frame body produced by [`encode_chunk`].
pub fn decode_chunk(body: &[u8]) -> SyncResult<Chunk> {
    if body.len() < HEADER_LEN {
        return Err(SyncError::Protocol(format!(
            "frame truncated: {} bytes",
            body.len()
        )));
    }

    let (session, rest) = body.split_at(16);
    let (index, rest) = rest.split_at(4);
    let (total, rest) = rest.split_at(4);
    let (name_len, rest) = rest.split_at(2);

    let name_len = usize::from(u16::from_be_bytes([name_len[0], name_len[1]]));
    if rest.len() < name_len {
        return Err(SyncError::Protocol(format!(
            "dataset name truncated: expected {name_len} bytes, got {}",
            rest.len()
        )));
    }
    let (name, payload) = rest.split_at(name_len);
    let dataset_type = std::str::from_utf8(name)
        .map_err(|e| SyncError::Protocol(format!("dataset name is not UTF-8: {e}")))?
        .to_string();

    let mut session_bytes = [0u8; 16];
    session_bytes.copy_from_slice(session);

    Ok(Chunk {
        session_id: SessionId::from_bytes(session_bytes),
        index: u32::from_be_bytes([index[0], index[1], index[2], index[3]]),
        total: u32::from_be_bytes([total[0], total[1], total[2], total[3]]),
        dataset_type,
        payload: payload.to_vec(),
    })
}

/// Reads one length-prefixed chunk frame.
pub async fn read_frame<T: AsyncRead + Unpin>(io: &mut T) -> io::Result<Chunk> {
    let len = io.read_u32().await? as usize;

    if len > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame too large: {len} bytes"),
        ));
    }

    let mut buf = vec![0u8; len];
    io.read_exact(&mut buf).await?;

    decode_chunk(&buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
}

/// Writes one length-prefixed chunk frame.
pub async fn write_frame<T: AsyncWrite + Unpin>(io: &mut T, chunk: &Chunk) -> io::Result<()> {
    let body =
        encode_chunk(chunk).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

    io.write_u32(body.len() as u32).await?;
    io.write_all(&body).await?;
    io.flush().await
}
