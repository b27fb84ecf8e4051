//! File streaming engines for peershare transfers.
//!
//! The server streams catalog files in fixed 64 KiB blocks ([`send`]); the
//! client consumes them ([`recv`]). Hashing, per-chunk compression, and
//! chunk framing live in their own modules so both engines share one
//! implementation.

pub mod codec;
pub mod frame;
pub mod hasher;
pub mod recv;
pub mod send;

pub use codec::{compress_block, decompress_block};
pub use hasher::{hash_bytes, hash_file, hash_file_prefix};
pub use recv::BlockReceiver;
pub use send::FileSender;

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

/// Deadline for any single read or write on the transfer path.
///
/// Generous on purpose: it reaps wedged peers, it does not police slow links.
pub const IO_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors produced on the transfer path.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("zero-length chunk frame")]
    EmptyFrame,

    #[error("chunk frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("unexpected EOF mid-transfer")]
    UnexpectedEof,

    #[error("transfer timed out")]
    Timeout,
}

/// Runs one transfer-path operation under [`IO_TIMEOUT`].
pub(crate) async fn with_deadline<F, T>(fut: F) -> Result<T, TransferError>
where
    F: Future<Output = Result<T, TransferError>>,
{
    match timeout(IO_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(TransferError::Timeout),
    }
}
