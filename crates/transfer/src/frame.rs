//! Length-prefixed framing for compressed chunks.
//!
//! # Wire format
//!
//! ```text
//! PER CHUNK: [4 bytes LE: payload_len][payload_len bytes: deflate block]
//! ```
//!
//! The length is always little-endian; raw-mode payloads are unframed. A
//! frame never exceeds [`MAX_COMPRESSED_CHUNK`] — one deflated 64 KiB block
//! plus worst-case expansion.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use peershare_protocol::MAX_COMPRESSED_CHUNK;

use crate::TransferError;

/// Writes one framed chunk.
pub async fn write_chunk<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), TransferError> {
    if payload.is_empty() {
        return Err(TransferError::EmptyFrame);
    }
    if payload.len() > MAX_COMPRESSED_CHUNK {
        return Err(TransferError::FrameTooLarge {
            len: payload.len(),
            max: MAX_COMPRESSED_CHUNK,
        });
    }

    writer.write_u32_le(payload.len() as u32).await?;
    writer.write_all(payload).await?;
    Ok(())
}

/// Reads one framed chunk.
pub async fn read_chunk<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, TransferError> {
    let len = reader.read_u32_le().await? as usize;
    if len == 0 {
        return Err(TransferError::EmptyFrame);
    }
    if len > MAX_COMPRESSED_CHUNK {
        return Err(TransferError::FrameTooLarge {
            len,
            max: MAX_COMPRESSED_CHUNK,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}
