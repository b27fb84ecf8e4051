//! Persisted progress for interrupted raw downloads.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;

use crate::ClientError;

/// On-disk progress for one in-flight download.
///
/// Lives next to the partial file as `<dest>.resume`. The record is valid
/// only while the name and server it was written for match the request
/// being made *and* its byte count equals the partial file's actual size;
/// any mismatch means the partial bytes cannot be trusted and the download
/// restarts from zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRecord {
    /// Catalog name of the file being downloaded.
    pub filename: String,
    /// Digest advertised by the server when the download began; empty when
    /// none was captured.
    #[serde(default)]
    pub expected_digest: String,
    /// Full size of the remote file.
    pub total_size: u64,
    /// Bytes safely written to the partial file so far.
    pub bytes_downloaded: u64,
    /// Server the bytes came from.
    pub server_host: String,
    pub server_port: u16,
}

impl ResumeRecord {
    /// Where the record for a download destined at `dest` lives.
    pub fn path_for(dest: &Path) -> PathBuf {
        let mut path = dest.as_os_str().to_os_string();
        path.push(".resume");
        PathBuf::from(path)
    }

    /// Whether this record authorizes resuming `partial_len` bytes of
    /// `filename` from the given server.
    pub fn matches(&self, filename: &str, host: &str, port: u16, partial_len: u64) -> bool {
        self.filename == filename
            && self.server_host == host
            && self.server_port == port
            && self.bytes_downloaded == partial_len
    }

    /// The recorded digest, if one was captured.
    pub fn expected_digest(&self) -> Option<&str> {
        (!self.expected_digest.is_empty()).then_some(self.expected_digest.as_str())
    }

    /// Loads the record for `dest`. Missing or unreadable records are
    /// `None` — both force a fresh download, which is always safe.
    pub async fn load(dest: &Path) -> Option<Self> {
        let path = Self::path_for(dest);
        let content = fs::read_to_string(&path).await.ok()?;
        match serde_json::from_str(&content) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(path = %path.display(), "discarding unreadable resume record: {e}");
                None
            }
        }
    }

    /// Writes the record next to `dest`.
    pub async fn save(&self, dest: &Path) -> Result<(), ClientError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(Self::path_for(dest), json).await?;
        Ok(())
    }

    /// Removes the record for `dest` if one exists.
    pub async fn delete(dest: &Path) -> Result<(), ClientError> {
        match fs::remove_file(Self::path_for(dest)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
