//! The resumable download state machine.
//!
//! One call runs one attempt: negotiate a start offset from the partial
//! file and its resume record, issue `GET`, stream blocks to disk, verify
//! the digest. A rejected offset triggers a single automatic restart from
//! zero; every other failure is reported as an outcome and left for the
//! caller to retry — raw-mode retries resume transparently.

use std::path::PathBuf;

use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use peershare_protocol::response::ERR_INVALID_OFFSET;
use peershare_protocol::{Request, ResponseHead, TransferMode};
use peershare_transfer::{BlockReceiver, IO_TIMEOUT, hash_file};

use crate::ClientError;
use crate::record::ResumeRecord;
use crate::remote::Client;

/// How many received bytes may accumulate between resume-record writes.
///
/// Persisting after every socket read would double the disk traffic; once
/// per MiB bounds the re-download window to a MiB instead.
pub const RECORD_FLUSH_INTERVAL: u64 = 1024 * 1024;

/// One download to perform.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Catalog name on the server.
    pub name: String,
    /// Where the file lands locally.
    pub dest: PathBuf,
    /// Digest captured from the listing, if the caller has one. Verified
    /// case-insensitively after the last byte arrives.
    pub expected_digest: Option<String>,
    /// Ask the server for compressed chunks. Enabling this disables resume:
    /// compressed chunk boundaries do not align with arbitrary offsets.
    pub compress: bool,
    /// Resume from an existing partial file when its record checks out.
    pub resume: bool,
}

/// The verdict on one download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Every byte arrived and the digest (if known) matched.
    Complete { bytes: u64, digest: String },
    /// The stream ended early. In raw mode the partial file and its record
    /// are left in place and a later call resumes; in compressed mode the
    /// partial file is removed.
    Incomplete { bytes_downloaded: u64, reason: String },
    /// All bytes arrived but the digest did not match; the file and its
    /// record were deleted.
    Corrupted { expected: String, actual: String },
    /// The server answered with an `ERROR:` line.
    Refused { reason: String },
}

impl DownloadOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, DownloadOutcome::Complete { .. })
    }
}

enum Attempt {
    Done(DownloadOutcome),
    /// The server rejected the offset we negotiated from local state.
    BadOffset,
}

impl Client {
    /// Runs one download. `progress` receives cumulative byte counts
    /// (including any resumed prefix) as blocks land; send failures are
    /// ignored so a slow consumer cannot stall the transfer.
    pub async fn download(
        &self,
        request: &DownloadRequest,
        progress: Option<mpsc::Sender<u64>>,
    ) -> Result<DownloadOutcome, ClientError> {
        let (offset, expected) = self.negotiate_start(request).await?;

        match self.attempt(request, offset, expected, progress.clone()).await? {
            Attempt::Done(outcome) => Ok(outcome),
            Attempt::BadOffset => {
                // Local state promised bytes the server will not serve from.
                // Scrap it and retry once from zero.
                warn!(name = %request.name, offset, "server rejected offset, restarting from zero");
                discard_partial(request).await?;

                match self
                    .attempt(request, 0, request.expected_digest.clone(), progress)
                    .await?
                {
                    Attempt::Done(outcome) => Ok(outcome),
                    Attempt::BadOffset => Ok(DownloadOutcome::Refused {
                        reason: ERR_INVALID_OFFSET.into(),
                    }),
                }
            }
        }
    }

    /// Decides the start offset and the digest to verify against.
    ///
    /// Resume happens only when all of these hold: resume is on,
    /// compression is off, a partial file exists, and its resume record
    /// matches this request byte for byte. Anything less scraps the partial
    /// state and starts over.
    async fn negotiate_start(
        &self,
        request: &DownloadRequest,
    ) -> Result<(u64, Option<String>), ClientError> {
        let expected = request.expected_digest.clone();

        if request.compress || !request.resume {
            discard_partial(request).await?;
            return Ok((0, expected));
        }

        let partial_len = match fs::metadata(&request.dest).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => meta.len(),
            _ => {
                // No partial bytes; a stray record has nothing to resume.
                ResumeRecord::delete(&request.dest).await?;
                return Ok((0, expected));
            }
        };

        match ResumeRecord::load(&request.dest).await {
            Some(record)
                if record.matches(&request.name, self.host(), self.port(), partial_len) =>
            {
                info!(
                    name = %request.name,
                    offset = partial_len,
                    total = record.total_size,
                    "resuming partial download"
                );
                let expected =
                    expected.or_else(|| record.expected_digest().map(str::to_string));
                Ok((partial_len, expected))
            }
            _ => {
                debug!(name = %request.name, "partial file has no valid record, restarting");
                discard_partial(request).await?;
                Ok((0, expected))
            }
        }
    }

    async fn attempt(
        &self,
        request: &DownloadRequest,
        offset: u64,
        expected: Option<String>,
        progress: Option<mpsc::Sender<u64>>,
    ) -> Result<Attempt, ClientError> {
        let mut stream = self.connect().await?;
        let line = Request::Get {
            name: request.name.clone(),
            offset,
            compress: request.compress,
        }
        .to_line();
        stream.write_all(line.as_bytes()).await?;

        let mut reader = BufReader::new(stream);
        let mut header = String::new();
        match timeout(IO_TIMEOUT, reader.read_line(&mut header)).await {
            Ok(result) => {
                result?;
            }
            // A server that accepts and then goes quiet must not pin the
            // download forever. Nothing was written this attempt, so any
            // partial file and record stay valid for a later call.
            Err(_) => {
                warn!(name = %request.name, "no response header within deadline");
                return Ok(Attempt::Done(DownloadOutcome::Incomplete {
                    bytes_downloaded: offset,
                    reason: "server sent no response header within deadline".into(),
                }));
            }
        }

        let (remaining, mode) = match ResponseHead::parse(&header)? {
            ResponseHead::Error { reason } if reason == ERR_INVALID_OFFSET && offset > 0 => {
                return Ok(Attempt::BadOffset);
            }
            ResponseHead::Error { reason } => {
                info!(name = %request.name, %reason, "download refused");
                return Ok(Attempt::Done(DownloadOutcome::Refused { reason }));
            }
            ResponseHead::Ok { remaining, mode } => (remaining, mode),
        };

        let total = offset + remaining;
        info!(name = %request.name, offset, remaining, %mode, "download started");

        let mut file = if offset > 0 {
            OpenOptions::new().append(true).open(&request.dest).await?
        } else {
            File::create(&request.dest).await?
        };

        // Only raw downloads are resumable, so only they get a record.
        let mut record = match mode {
            TransferMode::Raw => {
                let record = ResumeRecord {
                    filename: request.name.clone(),
                    expected_digest: expected.clone().unwrap_or_default(),
                    total_size: total,
                    bytes_downloaded: offset,
                    server_host: self.host().to_string(),
                    server_port: self.port(),
                };
                record.save(&request.dest).await?;
                Some(record)
            }
            TransferMode::Compressed => None,
        };

        let mut receiver = BlockReceiver::new(reader, remaining, mode);
        let mut received = offset;
        let mut last_persisted = offset;

        loop {
            match receiver.next_block().await {
                Ok(Some(block)) => {
                    file.write_all(block).await?;
                    received += block.len() as u64;

                    if let Some(progress) = &progress {
                        let _ = progress.try_send(received);
                    }
                    if let Some(record) = &mut record
                        && received - last_persisted >= RECORD_FLUSH_INTERVAL
                    {
                        record.bytes_downloaded = received;
                        record.save(&request.dest).await?;
                        last_persisted = received;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    file.flush().await?;
                    drop(file);

                    return match &mut record {
                        Some(record) => {
                            record.bytes_downloaded = received;
                            record.save(&request.dest).await?;
                            warn!(
                                name = %request.name,
                                received, total,
                                "download interrupted, partial file kept: {e}"
                            );
                            Ok(Attempt::Done(DownloadOutcome::Incomplete {
                                bytes_downloaded: received,
                                reason: e.to_string(),
                            }))
                        }
                        // Compressed partials cannot be resumed; keeping
                        // the file would only poison a later raw attempt.
                        None => {
                            fs::remove_file(&request.dest).await?;
                            warn!(
                                name = %request.name,
                                "compressed download interrupted, partial file removed: {e}"
                            );
                            Ok(Attempt::Done(DownloadOutcome::Incomplete {
                                bytes_downloaded: 0,
                                reason: e.to_string(),
                            }))
                        }
                    };
                }
            }
        }

        file.flush().await?;
        drop(file);

        let digest = hash_file(&request.dest).await?;
        if let Some(expected) = &expected
            && !digest.eq_ignore_ascii_case(expected)
        {
            warn!(name = %request.name, %expected, actual = %digest, "digest mismatch");
            fs::remove_file(&request.dest).await?;
            ResumeRecord::delete(&request.dest).await?;
            return Ok(Attempt::Done(DownloadOutcome::Corrupted {
                expected: expected.clone(),
                actual: digest,
            }));
        }

        ResumeRecord::delete(&request.dest).await?;
        info!(name = %request.name, bytes = total, "download complete");
        Ok(Attempt::Done(DownloadOutcome::Complete {
            bytes: total,
            digest,
        }))
    }
}

/// Removes the partial file and its record, tolerating their absence.
async fn discard_partial(request: &DownloadRequest) -> Result<(), ClientError> {
    match fs::remove_file(&request.dest).await {
        Ok(()) => debug!(dest = %request.dest.display(), "partial file removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    ResumeRecord::delete(&request.dest).await
}
