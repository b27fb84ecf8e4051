//! The shared-file registry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use peershare_protocol::ListingEntry;
use peershare_transfer::hash_file;

use crate::CatalogError;

/// A shared file: catalog metadata plus where the bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Catalog key — the file-name component only, no separators.
    pub name: String,
    /// Absolute path of the backing file.
    pub path: PathBuf,
    /// Size in bytes at registration time.
    pub size: u64,
    /// SHA-256 of the content at registration time, lowercase hex.
    pub digest: String,
}

impl CatalogEntry {
    /// The `LIST` line advertising this entry.
    pub fn listing(&self) -> ListingEntry {
        ListingEntry {
            name: self.name.clone(),
            size: self.size,
            digest: self.digest.clone(),
        }
    }
}

/// Registry of shared files, keyed by name.
///
/// The lock protects only the map. Lookups clone the entry out, so an
/// in-flight transfer keeps working from its snapshot even if the entry is
/// removed or replaced mid-stream. Registering a name that already exists
/// replaces the old entry.
#[derive(Default)]
pub struct Catalog {
    entries: Mutex<HashMap<String, CatalogEntry>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies the entry for `name` out of the registry.
    pub async fn lookup(&self, name: &str) -> Option<CatalogEntry> {
        self.entries.lock().await.get(name).cloned()
    }

    /// Inserts or replaces an entry, returning the one it displaced.
    pub async fn upsert(&self, entry: CatalogEntry) -> Option<CatalogEntry> {
        self.entries.lock().await.insert(entry.name.clone(), entry)
    }

    /// Removes an entry by name.
    pub async fn remove(&self, name: &str) -> bool {
        self.entries.lock().await.remove(name).is_some()
    }

    /// All entries, sorted by name for stable listings.
    pub async fn snapshot(&self) -> Vec<CatalogEntry> {
        let mut entries: Vec<_> = self.entries.lock().await.values().cloned().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Registers one file: hashes it and upserts it under its file name.
    ///
    /// The hash runs without the lock held; only the final map insert
    /// serializes with other catalog users.
    pub async fn add_file(&self, path: &Path) -> Result<CatalogEntry, CatalogError> {
        let meta = tokio::fs::metadata(path).await?;
        if !meta.is_file() {
            return Err(CatalogError::NotAFile(path.to_path_buf()));
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| CatalogError::InvalidName(path.display().to_string()))?
            .to_string();

        let digest = hash_file(path).await?;
        let entry = CatalogEntry {
            name,
            path: tokio::fs::canonicalize(path).await?,
            size: meta.len(),
            digest,
        };

        debug!(name = %entry.name, size = entry.size, "file registered");
        self.upsert(entry.clone()).await;
        Ok(entry)
    }

    /// Recursively registers every regular file under `dir`.
    ///
    /// Per-file failures are logged and skipped: one unreadable file must
    /// not abort a whole folder. Returns how many files were registered.
    pub async fn add_dir(&self, dir: &Path) -> Result<usize, CatalogError> {
        let meta = tokio::fs::metadata(dir).await?;
        if !meta.is_dir() {
            return Err(CatalogError::NotADirectory(dir.to_path_buf()));
        }

        let mut pending = vec![dir.to_path_buf()];
        let mut added = 0usize;

        while let Some(current) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&current).await?;
            while let Some(dirent) = entries.next_entry().await? {
                let path = dirent.path();
                let kind = dirent.file_type().await?;
                if kind.is_dir() {
                    pending.push(path);
                } else if kind.is_file() {
                    match self.add_file(&path).await {
                        Ok(_) => added += 1,
                        Err(e) => warn!(path = %path.display(), "skipping file: {e}"),
                    }
                }
            }
        }

        Ok(added)
    }

    /// Registers a file or a whole directory tree.
    pub async fn add_path(&self, path: &Path) -> Result<usize, CatalogError> {
        let meta = tokio::fs::metadata(path).await?;
        if meta.is_dir() {
            self.add_dir(path).await
        } else {
            self.add_file(path).await.map(|_| 1)
        }
    }
}
