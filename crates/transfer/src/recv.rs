//! Client-side consumption of a `GET` payload.

use tokio::io::{AsyncRead, AsyncReadExt};

use peershare_protocol::{CHUNK_SIZE, TransferMode};

use crate::codec::decompress_block;
use crate::frame::read_chunk;
use crate::{TransferError, with_deadline};

/// Pulls a payload off the wire block by block.
///
/// The receiver owns framing, decompression, and read deadlines; the caller
/// owns the destination — file writes, progress accounting, and resume
/// bookkeeping happen between blocks. [`next_block`](Self::next_block)
/// yields `None` once the expected byte count has arrived.
pub struct BlockReceiver<R> {
    reader: R,
    remaining: u64,
    mode: TransferMode,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> BlockReceiver<R> {
    /// Wraps `reader`, expecting `remaining` logical bytes in `mode`.
    pub fn new(reader: R, remaining: u64, mode: TransferMode) -> Self {
        Self {
            reader,
            remaining,
            mode,
            buf: vec![0u8; CHUNK_SIZE],
        }
    }

    /// Logical bytes still expected.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Reads the next block, or `None` when the payload is complete.
    ///
    /// In raw mode a block is whatever one socket read returns (at most one
    /// chunk); in compressed mode it is one decoded frame. The final
    /// compressed block may be shorter than a full chunk.
    pub async fn next_block(&mut self) -> Result<Option<&[u8]>, TransferError> {
        if self.remaining == 0 {
            return Ok(None);
        }

        match self.mode {
            TransferMode::Raw => {
                let to_read = self.remaining.min(CHUNK_SIZE as u64) as usize;
                let (reader, buf) = (&mut self.reader, &mut self.buf);
                let n =
                    with_deadline(async move { Ok(reader.read(&mut buf[..to_read]).await?) })
                        .await?;
                if n == 0 {
                    return Err(TransferError::UnexpectedEof);
                }
                self.remaining -= n as u64;
                Ok(Some(&self.buf[..n]))
            }

            TransferMode::Compressed => {
                let frame = with_deadline(read_chunk(&mut self.reader)).await?;
                let block = decompress_block(&frame, CHUNK_SIZE)?;
                if block.len() as u64 > self.remaining {
                    return Err(TransferError::Compression(format!(
                        "block of {} bytes overruns the {} still expected",
                        block.len(),
                        self.remaining
                    )));
                }
                self.remaining -= block.len() as u64;
                self.buf = block;
                Ok(Some(&self.buf))
            }
        }
    }
}
