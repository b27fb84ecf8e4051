//! Server-side streaming of catalog files.

use std::io::SeekFrom;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use peershare_protocol::{CHUNK_SIZE, TransferMode};

use crate::codec::compress_block;
use crate::frame::write_chunk;
use crate::{TransferError, with_deadline};

/// A shared file opened and positioned for streaming.
///
/// Opening is split from streaming so the caller can still refuse the
/// request (and say why) before committing a payload header to the wire.
pub struct FileSender {
    file: File,
}

impl FileSender {
    /// Opens `path` and seeks to `offset`.
    pub async fn open(path: &Path, offset: u64) -> Result<Self, TransferError> {
        let mut file = File::open(path).await?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).await?;
        }
        Ok(Self { file })
    }

    /// Streams `remaining` logical bytes to `writer` in fixed-size blocks.
    ///
    /// In compressed mode every block is deflated and framed independently;
    /// accounting stays in uncompressed bytes either way. On any mid-stream
    /// failure the error surfaces and the caller drops the connection — the
    /// receiving side owns resume.
    pub async fn stream<W: AsyncWrite + Unpin>(
        mut self,
        writer: &mut W,
        remaining: u64,
        mode: TransferMode,
    ) -> Result<u64, TransferError> {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut sent = 0u64;

        while sent < remaining {
            let to_read = (remaining - sent).min(buf.len() as u64) as usize;
            let n = self.file.read(&mut buf[..to_read]).await?;
            if n == 0 {
                // The backing file shrank after it was cataloged.
                return Err(TransferError::UnexpectedEof);
            }

            match mode {
                TransferMode::Raw => {
                    with_deadline(async { Ok(writer.write_all(&buf[..n]).await?) }).await?;
                }
                TransferMode::Compressed => {
                    let block = compress_block(&buf[..n])?;
                    with_deadline(write_chunk(writer, &block)).await?;
                }
            }

            sent += n as u64;
        }

        with_deadline(async { Ok(writer.flush().await?) }).await?;
        debug!(sent, %mode, "payload streamed");
        Ok(sent)
    }
}
