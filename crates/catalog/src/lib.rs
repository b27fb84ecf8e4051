//! Registry of the files a peershare server offers for download.
//!
//! Each entry captures name, size, and SHA-256 digest at registration time;
//! nothing is re-validated afterwards. Re-register a file to refresh its
//! metadata.

mod store;

pub use store::{Catalog, CatalogEntry};

use std::path::PathBuf;

/// Errors from registering files.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("unusable file name: {0}")]
    InvalidName(String),

    #[error("hashing failed: {0}")]
    Hash(#[from] peershare_transfer::TransferError),
}
