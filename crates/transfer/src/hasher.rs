//! SHA-256 digests for shared files.
//!
//! Digests are lowercase hex, computed in streaming fashion so arbitrarily
//! large files never sit in memory.

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use peershare_protocol::CHUNK_SIZE;

use crate::TransferError;

/// Hashes a byte slice.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hashes a whole file.
pub async fn hash_file(path: &Path) -> Result<String, TransferError> {
    hash_file_prefix(path, u64::MAX).await
}

/// Hashes at most the first `limit` bytes of a file.
///
/// Validates a partial download against the range it claims to hold; with a
/// `limit` at or past EOF this is exactly [`hash_file`].
pub async fn hash_file_prefix(path: &Path, limit: u64) -> Result<String, TransferError> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut remaining = limit;

    while remaining > 0 {
        let to_read = remaining.min(buf.len() as u64) as usize;
        let n = file.read(&mut buf[..to_read]).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        remaining -= n as u64;
    }

    Ok(hex::encode(hasher.finalize()))
}
