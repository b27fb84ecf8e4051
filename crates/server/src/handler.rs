//! Per-connection request handling.
//!
//! One bounded, newline-terminated request line in, one response out, then
//! the server closes the connection. The catalog lock is held only to copy
//! data out — never across file or socket I/O, so a slow client cannot
//! stall anyone else.

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use peershare_catalog::Catalog;
use peershare_protocol::response::{
    ChecksumReply, ERR_CANNOT_OPEN, ERR_INVALID_OFFSET, ERR_NOT_FOUND, ERR_UNKNOWN_REQUEST,
    NO_FILES_LINE,
};
use peershare_protocol::{MAX_REQUEST_LINE, Request, ResponseHead, TransferMode};
use peershare_transfer::FileSender;

use crate::{REQUEST_TIMEOUT, ServerError};

pub(crate) async fn handle_connection<S>(
    stream: S,
    peer: SocketAddr,
    catalog: &Catalog,
    compression_enabled: bool,
) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader).take(MAX_REQUEST_LINE as u64);

    let mut line = String::new();
    match timeout(REQUEST_TIMEOUT, reader.read_line(&mut line)).await {
        Ok(Ok(0)) => {
            debug!(%peer, "connection closed before a request");
            return Ok(());
        }
        Ok(Ok(_)) => {}
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            debug!(%peer, "no request within deadline, dropping connection");
            return Ok(());
        }
    }

    // Line cap hit without a newline: refuse rather than act on a
    // truncated request (a chopped OFFSET would serve the wrong bytes).
    if !line.ends_with('\n') && line.len() >= MAX_REQUEST_LINE {
        debug!(%peer, "request line exceeded cap");
        respond_error(&mut writer, ERR_UNKNOWN_REQUEST).await?;
        writer.shutdown().await?;
        return Ok(());
    }

    match Request::parse(&line) {
        Ok(Request::List) => handle_list(&mut writer, peer, catalog).await?,
        Ok(Request::Get {
            name,
            offset,
            compress,
        }) => handle_get(&mut writer, peer, catalog, compression_enabled, &name, offset, compress).await?,
        Ok(Request::Checksum { name }) => {
            handle_checksum(&mut writer, peer, catalog, &name).await?
        }
        Err(e) => {
            debug!(%peer, "unparseable request: {e}");
            respond_error(&mut writer, ERR_UNKNOWN_REQUEST).await?;
        }
    }

    writer.shutdown().await?;
    Ok(())
}

async fn handle_list<W: AsyncWrite + Unpin>(
    writer: &mut W,
    peer: SocketAddr,
    catalog: &Catalog,
) -> Result<(), ServerError> {
    let entries = catalog.snapshot().await;
    info!(%peer, files = entries.len(), "LIST");

    if entries.is_empty() {
        writer
            .write_all(format!("{NO_FILES_LINE}\n").as_bytes())
            .await?;
        return Ok(());
    }

    let mut listing = String::new();
    for entry in &entries {
        listing.push_str(&entry.listing().to_line());
    }
    writer.write_all(listing.as_bytes()).await?;
    Ok(())
}

async fn handle_get<W: AsyncWrite + Unpin>(
    writer: &mut W,
    peer: SocketAddr,
    catalog: &Catalog,
    compression_enabled: bool,
    name: &str,
    offset: u64,
    compress: bool,
) -> Result<(), ServerError> {
    let Some(entry) = catalog.lookup(name).await else {
        info!(%peer, name, "GET refused: not in catalog");
        return respond_error(writer, ERR_NOT_FOUND).await;
    };

    // Covers empty files too: offset 0 is not inside a 0-byte file.
    if offset >= entry.size {
        info!(%peer, name, offset, size = entry.size, "GET refused: bad offset");
        return respond_error(writer, ERR_INVALID_OFFSET).await;
    }

    // The request flag asks; the server setting decides.
    let mode = if compress && compression_enabled {
        TransferMode::Compressed
    } else {
        TransferMode::Raw
    };

    let sender = match FileSender::open(&entry.path, offset).await {
        Ok(sender) => sender,
        Err(e) => {
            warn!(%peer, name, "GET cannot open backing file: {e}");
            return respond_error(writer, ERR_CANNOT_OPEN).await;
        }
    };

    let remaining = entry.size - offset;
    let head = ResponseHead::Ok { remaining, mode };
    writer.write_all(head.to_line().as_bytes()).await?;

    info!(%peer, name, offset, remaining, %mode, "GET streaming");
    match sender.stream(writer, remaining, mode).await {
        Ok(sent) => info!(%peer, name, sent, "GET complete"),
        // Mid-stream failure: nothing sane can be written after payload
        // bytes, so just drop the connection. The client owns resume.
        Err(e) => warn!(%peer, name, "GET aborted mid-stream: {e}"),
    }
    Ok(())
}

async fn handle_checksum<W: AsyncWrite + Unpin>(
    writer: &mut W,
    peer: SocketAddr,
    catalog: &Catalog,
    name: &str,
) -> Result<(), ServerError> {
    let reply = match catalog.lookup(name).await {
        Some(entry) => {
            info!(%peer, name, "CHECKSUM");
            ChecksumReply::Digest(entry.digest)
        }
        None => {
            info!(%peer, name, "CHECKSUM refused: not in catalog");
            ChecksumReply::Error(ERR_NOT_FOUND.into())
        }
    };
    writer.write_all(reply.to_line().as_bytes()).await?;
    Ok(())
}

async fn respond_error<W: AsyncWrite + Unpin>(
    writer: &mut W,
    reason: &str,
) -> Result<(), ServerError> {
    writer
        .write_all(ResponseHead::error(reason).to_line().as_bytes())
        .await?;
    Ok(())
}
