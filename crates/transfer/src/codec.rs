//! Per-chunk deflate compression.
//!
//! Each 64 KiB block is compressed independently (zlib framing) so the
//! receiver can decode chunks as they arrive without a stream-wide window.
//! Compression level is biased toward speed: the transfer path must never
//! be CPU-bound.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;

use crate::TransferError;

/// Compresses one block.
pub fn compress_block(data: &[u8]) -> Result<Vec<u8>, TransferError> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::fast());
    encoder
        .write_all(data)
        .map_err(|e| TransferError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| TransferError::Compression(e.to_string()))
}

/// Decompresses one block, rejecting output larger than `max`.
///
/// The uncompressed size is never carried on the wire — the protocol fixes
/// it at one chunk — so `max` is what stops a corrupt or hostile frame from
/// ballooning in memory.
pub fn decompress_block(data: &[u8], max: usize) -> Result<Vec<u8>, TransferError> {
    let mut out = Vec::with_capacity(max.min(data.len().saturating_mul(4)));
    let mut decoder = ZlibDecoder::new(data).take(max as u64 + 1);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| TransferError::Compression(e.to_string()))?;

    if out.len() > max {
        return Err(TransferError::Compression(format!(
            "block decompressed past {max} bytes"
        )));
    }
    Ok(out)
}
