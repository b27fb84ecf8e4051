//! One-shot requests against a peershare server.
//!
//! Every operation opens its own connection — the protocol serves exactly
//! one request per connection, so there is nothing to pool.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use peershare_protocol::{ChecksumReply, ListingEntry, Request};
use peershare_transfer::IO_TIMEOUT;

use crate::ClientError;

/// A shared file as advertised in a `LIST` response.
pub use peershare_protocol::ListingEntry as RemoteFile;

/// Connect deadline for [`Client::probe`] — short, because a probe exists
/// to answer "is anyone there" quickly.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Handle on one peershare server.
#[derive(Debug, Clone)]
pub struct Client {
    host: String,
    port: u16,
}

impl Client {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub(crate) async fn connect(&self) -> Result<TcpStream, ClientError> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        Ok(stream)
    }

    /// Checks that the server is reachable, within [`PROBE_TIMEOUT`].
    pub async fn probe(&self) -> Result<(), ClientError> {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        match timeout(PROBE_TIMEOUT, connect).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(ClientError::ConnectTimeout),
        }
    }

    /// Fetches the server's catalog listing.
    ///
    /// Blank and malformed lines (including the "no files" banner) are
    /// skipped rather than treated as fatal, so the listing degrades
    /// gracefully against a chattier server.
    pub async fn fetch_listing(&self) -> Result<Vec<RemoteFile>, ClientError> {
        let mut stream = self.connect().await?;
        stream.write_all(Request::List.to_line().as_bytes()).await?;

        let mut files = Vec::new();
        let mut lines = BufReader::new(stream).lines();
        while let Some(line) = timeout(IO_TIMEOUT, lines.next_line())
            .await
            .map_err(|_| ClientError::ResponseTimeout)??
        {
            match ListingEntry::parse(&line) {
                Ok(entry) => files.push(entry),
                Err(_) if line.trim().is_empty() => {}
                Err(e) => debug!("skipping listing line {line:?}: {e}"),
            }
        }
        Ok(files)
    }

    /// Asks the server for the advertised digest of `name`.
    pub async fn fetch_checksum(&self, name: &str) -> Result<String, ClientError> {
        let mut stream = self.connect().await?;
        let request = Request::Checksum { name: name.into() };
        stream.write_all(request.to_line().as_bytes()).await?;

        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        timeout(IO_TIMEOUT, reader.read_line(&mut line))
            .await
            .map_err(|_| ClientError::ResponseTimeout)??;

        match ChecksumReply::parse(&line)? {
            ChecksumReply::Digest(digest) => Ok(digest),
            ChecksumReply::Error(reason) => Err(ClientError::Refused(reason)),
        }
    }
}
