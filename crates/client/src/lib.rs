//! Client side of peershare: listing, checksums, reachability probes, and
//! resumable downloads.
//!
//! The download path is a small state machine: negotiate a start offset
//! from any partial file plus its resume record, issue one `GET`, stream
//! blocks to disk, and gate the result on a SHA-256 comparison. Every
//! failure becomes a [`DownloadOutcome`] value — the caller decides whether
//! to call again, and a later call resumes raw downloads transparently.

mod config;
mod download;
mod record;
mod remote;

pub use config::ClientConfig;
pub use download::{DownloadOutcome, DownloadRequest, RECORD_FLUSH_INTERVAL};
pub use record::ResumeRecord;
pub use remote::{Client, PROBE_TIMEOUT, RemoteFile};

/// Errors on the client's side of the wire.
///
/// These are environmental failures (sockets, disk, malformed peers). The
/// per-download verdicts — complete, incomplete, corrupted, refused — are
/// [`DownloadOutcome`] values, not errors.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server unreachable: connect timed out")]
    ConnectTimeout,

    #[error("server sent no response within deadline")]
    ResponseTimeout,

    #[error("protocol error: {0}")]
    Protocol(#[from] peershare_protocol::ParseError),

    #[error("transfer error: {0}")]
    Transfer(#[from] peershare_transfer::TransferError),

    #[error("server refused: {0}")]
    Refused(String),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}
